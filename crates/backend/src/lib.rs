//! Commerce backend contract.
//!
//! Every remote call the checkout flow makes goes through [`CommerceBackend`].
//! Two implementations are provided:
//! - [`HttpCommerceBackend`] talks JSON over HTTP to `/api/payment/*`
//! - [`InMemoryCommerceBackend`] keeps entities in memory and records every
//!   call, for tests and local runs

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod requests;

pub use api::{CommerceBackend, Operation};
pub use config::BackendConfig;
pub use error::{BackendError, Result};
pub use http::HttpCommerceBackend;
pub use memory::{InMemoryCommerceBackend, RecordedCall};
pub use requests::{
    AddOrderLineRequest, CreateTransactionRequest, CreatedTransaction, DeleteOrderLineRequest,
    UpdateTransactionRequest,
};
