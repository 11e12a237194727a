//! Domain error types.

use common::AssetId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while assembling checkout inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// A selected asset has a zero quantity.
    #[error("Invalid quantity {quantity} for asset {asset_id}")]
    InvalidQuantity { asset_id: AssetId, quantity: u32 },

    /// A price is negative.
    #[error("Invalid price {price} for {item}")]
    InvalidPrice { item: String, price: Decimal },
}
