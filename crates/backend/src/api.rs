//! The backend trait and the operations it exposes.

use async_trait::async_trait;
use common::{AssetId, EstimateId, OrderId, TransactionId};
use domain::{
    EstimateDetails, EstimateInput, EstimateUpdate, LineUpdate, Order, OrderInput,
    OrderLineInput, PaymentInput, Transaction, TransactionStatus,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::requests::CreateTransactionRequest;

/// One backend endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateTransaction,
    UpdateTransaction,
    CreateEstimate,
    GetEstimate,
    UpdateEstimate,
    CreateOrder,
    AddOrderLine,
    UpdateOrderLine,
    DeleteOrderLine,
    SubmitPayment,
}

impl Operation {
    /// Returns the operation name, used as a log field and metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateTransaction => "create_transaction",
            Operation::UpdateTransaction => "update_transaction",
            Operation::CreateEstimate => "create_estimate",
            Operation::GetEstimate => "get_estimate",
            Operation::UpdateEstimate => "update_estimate",
            Operation::CreateOrder => "create_order",
            Operation::AddOrderLine => "add_order_line",
            Operation::UpdateOrderLine => "update_order_line",
            Operation::DeleteOrderLine => "delete_order_line",
            Operation::SubmitPayment => "submit_payment",
        }
    }

    /// Human-readable message surfaced when the operation fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::CreateTransaction => "Failed to create transaction",
            Operation::UpdateTransaction => "Failed to update transaction",
            Operation::CreateEstimate => "Failed to create estimate",
            Operation::GetEstimate => "Failed to fetch estimate",
            Operation::UpdateEstimate => "Failed to update estimate",
            Operation::CreateOrder => "Failed to create order",
            Operation::AddOrderLine => "Failed to add order line",
            Operation::UpdateOrderLine => "Failed to update order line",
            Operation::DeleteOrderLine => "Failed to delete order line",
            Operation::SubmitPayment => "Failed to submit payment",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remote persistence for transactions, estimates, orders and payments.
///
/// Estimates are returned as raw records; deciding whether a record is a
/// draft is the caller's job.
#[async_trait]
pub trait CommerceBackend: Send + Sync {
    /// `POST /api/payment/transaction`
    async fn create_transaction(&self, request: CreateTransactionRequest) -> Result<Transaction>;

    /// `PUT /api/payment/transaction`
    async fn update_transaction_status(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
    ) -> Result<()>;

    /// `POST /api/payment/estimate`
    async fn create_estimate(&self, input: EstimateInput) -> Result<EstimateDetails>;

    /// `GET /api/payment/estimate/:id`
    async fn get_estimate(&self, estimate_id: &EstimateId) -> Result<EstimateDetails>;

    /// `PUT /api/payment/estimate`
    async fn update_estimate(&self, update: EstimateUpdate) -> Result<EstimateDetails>;

    /// `POST /api/payment/order`
    async fn create_order(&self, input: OrderInput) -> Result<Order>;

    /// `PUT /api/payment/order` with `orderId` and `lineInput`.
    async fn add_order_line(&self, order_id: &OrderId, line: OrderLineInput) -> Result<()>;

    /// `PUT /api/payment/order/:orderId/lines/:assetId`
    async fn update_order_line(
        &self,
        order_id: &OrderId,
        asset_id: &AssetId,
        update: LineUpdate,
    ) -> Result<()>;

    /// `DELETE /api/payment/order` with `orderId` and `assetId`.
    async fn delete_order_line(&self, order_id: &OrderId, asset_id: &AssetId) -> Result<()>;

    /// `POST /api/payment/payment`. The provider handoff is opaque, so the
    /// response is returned untouched.
    async fn submit_payment(&self, input: PaymentInput) -> Result<serde_json::Value>;
}
