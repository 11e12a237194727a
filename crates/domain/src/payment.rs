//! Payment instruction handed to the payment provider via the backend.

use common::{OrderId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::Order;

/// The payment instruction for an order. `method` is an opaque provider handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

impl PaymentInput {
    /// Pays the full order total with `method`.
    pub fn for_order(order: &Order, method: impl Into<String>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            transaction_id: order.transaction_id.clone(),
            amount: order.total_price,
            currency: order.currency.clone(),
            method: method.into(),
            return_url: None,
        }
    }

    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }
}
