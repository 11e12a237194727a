//! Data model for the checkout pipeline.
//!
//! This crate provides:
//! - Catalog inputs (service, assets, billing profile, buyer)
//! - Transaction status state machine
//! - Estimate as a tagged draft/persisted variant
//! - Order and order line types, plus the desired-line projection of an estimate
//! - `PaymentState`, mutated only through [`PaymentState::apply`]

pub mod catalog;
pub mod error;
pub mod estimate;
pub mod order;
pub mod payment;
pub mod state;
pub mod transaction;

pub use catalog::{AssetEntity, BillingProfile, Buyer, Service};
pub use common::{AssetId, EstimateId, OrderId, OrganizationId, ServiceId, TransactionId, UserId};
pub use error::DomainError;
pub use estimate::{
    Estimate, EstimateBody, EstimateDetails, EstimateInput, EstimateItem, EstimateParty,
    EstimateService, EstimateStatus, EstimateUpdate,
};
pub use order::{DesiredLine, LineUpdate, Order, OrderInput, OrderLine, OrderLineInput};
pub use payment::PaymentInput;
pub use rust_decimal::Decimal;
pub use state::{PaymentAction, PaymentState};
pub use transaction::{Transaction, TransactionStatus};
