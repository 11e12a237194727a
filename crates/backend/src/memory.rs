//! In-memory commerce backend for tests and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{AssetId, EstimateId, OrderId, TransactionId};
use domain::{
    EstimateDetails, EstimateInput, EstimateStatus, EstimateUpdate, LineUpdate, Order,
    OrderInput, OrderLine, OrderLineInput, PaymentInput, Transaction, TransactionStatus,
};
use rust_decimal::Decimal;

use crate::api::{CommerceBackend, Operation};
use crate::error::{BackendError, Result};
use crate::requests::CreateTransactionRequest;

/// A call received by the in-memory backend, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    CreateTransaction(CreateTransactionRequest),
    UpdateTransaction {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
    CreateEstimate(EstimateInput),
    GetEstimate(EstimateId),
    UpdateEstimate(EstimateUpdate),
    CreateOrder(OrderInput),
    AddOrderLine {
        order_id: OrderId,
        line: OrderLineInput,
    },
    UpdateOrderLine {
        order_id: OrderId,
        asset_id: AssetId,
        update: LineUpdate,
    },
    DeleteOrderLine {
        order_id: OrderId,
        asset_id: AssetId,
    },
    SubmitPayment(PaymentInput),
}

impl RecordedCall {
    pub fn operation(&self) -> Operation {
        match self {
            RecordedCall::CreateTransaction(_) => Operation::CreateTransaction,
            RecordedCall::UpdateTransaction { .. } => Operation::UpdateTransaction,
            RecordedCall::CreateEstimate(_) => Operation::CreateEstimate,
            RecordedCall::GetEstimate(_) => Operation::GetEstimate,
            RecordedCall::UpdateEstimate(_) => Operation::UpdateEstimate,
            RecordedCall::CreateOrder(_) => Operation::CreateOrder,
            RecordedCall::AddOrderLine { .. } => Operation::AddOrderLine,
            RecordedCall::UpdateOrderLine { .. } => Operation::UpdateOrderLine,
            RecordedCall::DeleteOrderLine { .. } => Operation::DeleteOrderLine,
            RecordedCall::SubmitPayment(_) => Operation::SubmitPayment,
        }
    }

    /// The asset a line call refers to, if any.
    fn asset_id(&self) -> Option<&AssetId> {
        match self {
            RecordedCall::AddOrderLine { line, .. } => Some(&line.asset_id),
            RecordedCall::UpdateOrderLine { asset_id, .. }
            | RecordedCall::DeleteOrderLine { asset_id, .. } => Some(asset_id),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryBackendState {
    calls: Vec<RecordedCall>,
    transactions: HashMap<TransactionId, Transaction>,
    estimates: HashMap<EstimateId, EstimateDetails>,
    orders: HashMap<OrderId, Order>,
    next_id: u32,
    failing: HashSet<Operation>,
    failing_assets: HashSet<AssetId>,
    draft_estimates: bool,
    latency: Option<Duration>,
}

impl InMemoryBackendState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory commerce backend.
///
/// Every call is recorded before it is processed, including calls configured
/// to fail, so tests can assert exactly which requests a flow issued.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommerceBackend {
    state: Arc<RwLock<InMemoryBackendState>>,
}

impl InMemoryCommerceBackend {
    /// Creates a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call to `operation` fail until reset.
    pub fn set_fail(&self, operation: Operation, fail: bool) {
        let mut state = self.write();
        if fail {
            state.failing.insert(operation);
        } else {
            state.failing.remove(&operation);
        }
    }

    /// Makes every line call for `asset_id` fail until reset.
    pub fn set_fail_for_asset(&self, asset_id: impl Into<AssetId>, fail: bool) {
        let asset_id = asset_id.into();
        let mut state = self.write();
        if fail {
            state.failing_assets.insert(asset_id);
        } else {
            state.failing_assets.remove(&asset_id);
        }
    }

    /// Makes created estimates come back with draft markers.
    pub fn set_draft_estimates(&self, draft: bool) {
        self.write().draft_estimates = draft;
    }

    /// Delays every call, so concurrent callers overlap.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.write().latency = latency;
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.read().calls.clone()
    }

    /// Returns the number of calls to `operation`.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.read()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forgets recorded calls but keeps stored entities.
    pub fn clear_calls(&self) {
        self.write().calls.clear();
    }

    pub fn transaction(&self, transaction_id: &TransactionId) -> Option<Transaction> {
        self.read().transactions.get(transaction_id).cloned()
    }

    pub fn estimate(&self, estimate_id: &EstimateId) -> Option<EstimateDetails> {
        self.read().estimates.get(estimate_id).cloned()
    }

    pub fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.read().orders.get(order_id).cloned()
    }

    /// Stores an estimate record as if another session had created it.
    pub fn insert_estimate(&self, details: EstimateDetails) {
        self.write()
            .estimates
            .insert(details.estimate_id.clone(), details);
    }

    /// Stores an order as if it had been created earlier.
    pub fn insert_order(&self, order: Order) {
        self.write().orders.insert(order.order_id.clone(), order);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryBackendState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryBackendState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call, waits out the configured latency, then checks failure switches.
    async fn receive(&self, call: RecordedCall) -> Result<()> {
        let operation = call.operation();
        let (latency, fails) = {
            let mut state = self.write();
            let fails = state.failing.contains(&operation)
                || call
                    .asset_id()
                    .is_some_and(|a| state.failing_assets.contains(a));
            state.calls.push(call);
            (state.latency, fails)
        };

        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        if fails {
            return Err(BackendError::Unavailable { operation });
        }
        Ok(())
    }
}

fn tax_for(details: &domain::EstimateBody) -> Decimal {
    let vat = details
        .services
        .first()
        .map(|s| s.legal_vat_percent)
        .unwrap_or_default();
    (details.sub_total * vat / Decimal::ONE_HUNDRED).round_dp(2)
}

#[async_trait]
impl CommerceBackend for InMemoryCommerceBackend {
    async fn create_transaction(&self, request: CreateTransactionRequest) -> Result<Transaction> {
        self.receive(RecordedCall::CreateTransaction(request.clone()))
            .await?;

        let mut state = self.write();
        let n = state.next_id();
        let transaction = Transaction {
            transaction_id: TransactionId::new(format!("txn-{n:04}")),
            service_id: request.service_id,
            status: TransactionStatus::Pending,
        };
        state
            .transactions
            .insert(transaction.transaction_id.clone(), transaction.clone());
        Ok(transaction)
    }

    async fn update_transaction_status(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
    ) -> Result<()> {
        self.receive(RecordedCall::UpdateTransaction {
            transaction_id: transaction_id.clone(),
            status,
        })
        .await?;

        let mut state = self.write();
        let transaction =
            state
                .transactions
                .get_mut(transaction_id)
                .ok_or_else(|| BackendError::NotFound {
                    resource: "transaction",
                    id: transaction_id.to_string(),
                })?;
        transaction.status = status;
        Ok(())
    }

    async fn create_estimate(&self, input: EstimateInput) -> Result<EstimateDetails> {
        self.receive(RecordedCall::CreateEstimate(input.clone()))
            .await?;

        let mut state = self.write();
        let n = state.next_id();
        let (id_prefix, number_prefix) = if state.draft_estimates {
            ("draft-", "TEMP-")
        } else {
            ("est-", "EST-")
        };

        let mut body = input.details;
        body.tax = tax_for(&body);
        body.total = body.sub_total + body.tax;
        body.status = EstimateStatus::Pending;

        let details = EstimateDetails {
            estimate_id: EstimateId::new(format!("{id_prefix}{n:04}")),
            estimate_number: format!("{number_prefix}{n:04}"),
            details: body,
            items: Vec::new(),
        };
        state
            .estimates
            .insert(details.estimate_id.clone(), details.clone());
        Ok(details)
    }

    async fn get_estimate(&self, estimate_id: &EstimateId) -> Result<EstimateDetails> {
        self.receive(RecordedCall::GetEstimate(estimate_id.clone()))
            .await?;

        self.read()
            .estimates
            .get(estimate_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                resource: "estimate",
                id: estimate_id.to_string(),
            })
    }

    async fn update_estimate(&self, update: EstimateUpdate) -> Result<EstimateDetails> {
        self.receive(RecordedCall::UpdateEstimate(update.clone()))
            .await?;

        let mut state = self.write();
        let details =
            state
                .estimates
                .get_mut(&update.estimate_id)
                .ok_or_else(|| BackendError::NotFound {
                    resource: "estimate",
                    id: update.estimate_id.to_string(),
                })?;

        if let Some(profile) = update.billing_profile {
            details.details.to = Some(profile);
        }
        if let Some(services) = update.services {
            let sub_total: Decimal = services
                .iter()
                .map(|s| {
                    s.items
                        .iter()
                        .fold(s.price * Decimal::from(s.quantity), |acc, i| {
                            acc + i.unit_price * Decimal::from(i.quantity)
                        })
                })
                .sum();
            details.details.services = services;
            details.details.sub_total = sub_total;
            details.details.tax = tax_for(&details.details);
            details.details.total = details.details.sub_total + details.details.tax;
        }
        if let Some(status) = update.status {
            details.details.status = status;
        }
        Ok(details.clone())
    }

    async fn create_order(&self, input: OrderInput) -> Result<Order> {
        self.receive(RecordedCall::CreateOrder(input.clone()))
            .await?;

        let mut state = self.write();
        if !state.estimates.contains_key(&input.quote_id) {
            return Err(BackendError::NotFound {
                resource: "estimate",
                id: input.quote_id.to_string(),
            });
        }

        let n = state.next_id();
        let order = Order {
            order_id: OrderId::new(format!("ord-{n:04}")),
            estimate_id: input.quote_id,
            transaction_id: input.transaction_id,
            service_id: input.service_id,
            seller_organization_id: input.seller_organization_id,
            total_price: input.total_price,
            currency: input.currency,
            lines: Vec::new(),
        };
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn add_order_line(&self, order_id: &OrderId, line: OrderLineInput) -> Result<()> {
        self.receive(RecordedCall::AddOrderLine {
            order_id: order_id.clone(),
            line: line.clone(),
        })
        .await?;

        let mut state = self.write();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BackendError::NotFound {
                resource: "order",
                id: order_id.to_string(),
            })?;
        order.upsert_line(OrderLine {
            total: line.unit_price * Decimal::from(line.quantity),
            asset_id: line.asset_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            description: Some(line.description),
            legal_vat_percent: line.legal_vat_percent,
        });
        Ok(())
    }

    async fn update_order_line(
        &self,
        order_id: &OrderId,
        asset_id: &AssetId,
        update: LineUpdate,
    ) -> Result<()> {
        self.receive(RecordedCall::UpdateOrderLine {
            order_id: order_id.clone(),
            asset_id: asset_id.clone(),
            update,
        })
        .await?;

        let mut state = self.write();
        let line = state
            .orders
            .get_mut(order_id)
            .and_then(|o| o.lines.iter_mut().find(|l| &l.asset_id == asset_id))
            .ok_or_else(|| BackendError::NotFound {
                resource: "order line",
                id: format!("{order_id}/{asset_id}"),
            })?;
        update.apply_to(line);
        Ok(())
    }

    async fn delete_order_line(&self, order_id: &OrderId, asset_id: &AssetId) -> Result<()> {
        self.receive(RecordedCall::DeleteOrderLine {
            order_id: order_id.clone(),
            asset_id: asset_id.clone(),
        })
        .await?;

        let mut state = self.write();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BackendError::NotFound {
                resource: "order",
                id: order_id.to_string(),
            })?;
        order.remove_line(asset_id);
        Ok(())
    }

    async fn submit_payment(&self, input: PaymentInput) -> Result<serde_json::Value> {
        self.receive(RecordedCall::SubmitPayment(input.clone()))
            .await?;

        let mut state = self.write();
        if !state.orders.contains_key(&input.order_id) {
            return Err(BackendError::NotFound {
                resource: "order",
                id: input.order_id.to_string(),
            });
        }

        let n = state.next_id();
        Ok(serde_json::json!({
            "paymentId": format!("PAY-{n:04}"),
            "orderId": input.order_id,
            "status": "REQUIRES_ACTION",
            "redirectUrl": format!("https://payments.invalid/checkout/PAY-{n:04}"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrganizationId, ServiceId, UserId};
    use domain::{AssetEntity, Service};
    use rust_decimal_macros::dec;

    fn service() -> Service {
        Service {
            id: "rec-1".to_string(),
            service_id: ServiceId::new("svc-1"),
            title: "Audit".to_string(),
            price: dec!(100),
            organization_id: Some(OrganizationId::new("org-1")),
            legal_vat_percent: dec!(21),
        }
    }

    fn transaction_request() -> CreateTransactionRequest {
        CreateTransactionRequest {
            service_id: ServiceId::new("svc-1"),
            seller_organization_id: Some(OrganizationId::new("org-1")),
            currency: "EUR".to_string(),
            buyer_user_id: UserId::new("user-1"),
            buyer_organization_id: None,
            total_amount: dec!(100),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_create_and_complete_transaction() {
        let backend = InMemoryCommerceBackend::new();
        let tx = backend
            .create_transaction(transaction_request())
            .await
            .unwrap();
        assert_eq!(tx.transaction_id.as_str(), "txn-0001");

        backend
            .update_transaction_status(&tx.transaction_id, TransactionStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            backend.transaction(&tx.transaction_id).unwrap().status,
            TransactionStatus::Completed
        );
        assert_eq!(backend.call_count(Operation::CreateTransaction), 1);
        assert_eq!(backend.call_count(Operation::UpdateTransaction), 1);
    }

    #[tokio::test]
    async fn test_failure_switch_still_records_call() {
        let backend = InMemoryCommerceBackend::new();
        backend.set_fail(Operation::CreateTransaction, true);

        let result = backend.create_transaction(transaction_request()).await;
        assert_eq!(
            result,
            Err(BackendError::Unavailable {
                operation: Operation::CreateTransaction
            })
        );
        assert_eq!(backend.call_count(Operation::CreateTransaction), 1);
    }

    #[tokio::test]
    async fn test_estimate_totals_include_tax() {
        let backend = InMemoryCommerceBackend::new();
        let input = EstimateInput::from_selection(
            &service(),
            &[AssetEntity::new("A", "Report", dec!(10), 2)],
            None,
        )
        .unwrap();

        let details = backend.create_estimate(input).await.unwrap();
        assert_eq!(details.details.sub_total, dec!(120));
        assert_eq!(details.details.tax, dec!(25.20));
        assert_eq!(details.details.total, dec!(145.20));
        assert!(!details.has_draft_marker());

        let fetched = backend.get_estimate(&details.estimate_id).await.unwrap();
        assert_eq!(fetched, details);
    }

    #[tokio::test]
    async fn test_draft_switch_marks_estimates() {
        let backend = InMemoryCommerceBackend::new();
        backend.set_draft_estimates(true);
        let input = EstimateInput::from_selection(&service(), &[], None).unwrap();

        let details = backend.create_estimate(input).await.unwrap();
        assert!(details.has_draft_marker());
    }

    #[tokio::test]
    async fn test_order_requires_known_estimate() {
        let backend = InMemoryCommerceBackend::new();
        let result = backend
            .create_order(OrderInput {
                quote_id: EstimateId::new("missing"),
                service_id: ServiceId::new("svc-1"),
                transaction_id: TransactionId::new("txn-1"),
                seller_organization_id: OrganizationId::new("org-1"),
                total_price: dec!(1),
                currency: "EUR".to_string(),
            })
            .await;
        assert!(matches!(result, Err(BackendError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_asset_failure_switch_only_hits_that_asset() {
        let backend = InMemoryCommerceBackend::new();
        backend.insert_order(Order {
            order_id: OrderId::new("ord-1"),
            estimate_id: EstimateId::new("est-1"),
            transaction_id: TransactionId::new("txn-1"),
            service_id: ServiceId::new("svc-1"),
            seller_organization_id: OrganizationId::new("org-1"),
            total_price: dec!(1),
            currency: "EUR".to_string(),
            lines: Vec::new(),
        });
        backend.set_fail_for_asset("B", true);

        let line = |id: &str| OrderLineInput {
            asset_id: AssetId::new(id),
            quantity: 1,
            unit_price: dec!(5),
            title: id.to_string(),
            description: id.to_string(),
            legal_vat_percent: dec!(21),
        };
        let order_id = OrderId::new("ord-1");

        assert!(backend.add_order_line(&order_id, line("A")).await.is_ok());
        assert!(backend.add_order_line(&order_id, line("B")).await.is_err());
        assert_eq!(backend.order(&order_id).unwrap().lines.len(), 1);
    }
}
