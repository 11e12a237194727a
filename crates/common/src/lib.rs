//! Identifier types shared by every checkout crate.

pub mod types;

pub use types::{AssetId, EstimateId, OrderId, OrganizationId, ServiceId, TransactionId, UserId};
