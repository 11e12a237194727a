//! Request and response bodies that exist only on the wire.

use common::{AssetId, OrderId, OrganizationId, ServiceId, TransactionId, UserId};
use domain::{OrderLineInput, Transaction, TransactionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/payment/transaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub service_id: ServiceId,
    pub seller_organization_id: Option<OrganizationId>,
    pub currency: String,
    pub buyer_user_id: UserId,
    pub buyer_organization_id: Option<OrganizationId>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Response of `POST /api/payment/transaction`. Only the id is required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTransaction {
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub status: TransactionStatus,
}

impl CreatedTransaction {
    pub fn into_transaction(self, service_id: ServiceId) -> Transaction {
        Transaction {
            transaction_id: self.transaction_id,
            service_id,
            status: self.status,
        }
    }
}

/// Body of `PUT /api/payment/transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionRequest {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
}

/// Body of `PUT /api/payment/order` when adding a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOrderLineRequest {
    pub order_id: OrderId,
    pub line_input: OrderLineInput,
}

/// Body of `DELETE /api/payment/order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOrderLineRequest {
    pub order_id: OrderId,
    pub asset_id: AssetId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_transaction_tolerates_extra_fields() {
        let created: CreatedTransaction = serde_json::from_value(serde_json::json!({
            "transactionId": "txn-9",
            "createdAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        let tx = created.into_transaction(ServiceId::new("svc-1"));
        assert_eq!(tx.transaction_id.as_str(), "txn-9");
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_update_body_shape() {
        let body = UpdateTransactionRequest {
            transaction_id: TransactionId::new("txn-1"),
            status: TransactionStatus::Completed,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"transactionId": "txn-1", "status": "COMPLETED"})
        );
    }
}
