//! The single in-memory checkout state and its reducer.

use common::AssetId;
use serde::{Deserialize, Serialize};

use crate::catalog::{AssetEntity, BillingProfile, Service};
use crate::estimate::Estimate;
use crate::order::{Order, OrderLine};
use crate::transaction::{Transaction, TransactionStatus};

/// Everything the checkout flow knows about the current session.
///
/// Only [`PaymentState::apply`] mutates it; readers take clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentState {
    service: Option<Service>,
    assets: Vec<AssetEntity>,
    billing_profile: Option<BillingProfile>,
    transaction: Option<Transaction>,
    estimate: Option<Estimate>,
    order: Option<Order>,
}

/// State changes, applied in order by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentAction {
    /// A service was loaded. Selecting a different service drops the
    /// selection, estimate and order derived from the previous one.
    ServiceSelected(Service),
    AssetsSelected(Vec<AssetEntity>),
    /// A zero quantity removes the asset from the selection.
    AssetQuantityChanged { asset_id: AssetId, quantity: u32 },
    BillingProfileSet(BillingProfile),
    TransactionRecorded(Transaction),
    TransactionStatusChanged(TransactionStatus),
    EstimateRecorded(Estimate),
    OrderRecorded(Order),
    /// The order belongs to an abandoned transaction and must not be paid.
    OrderDiscarded,
    OrderLineUpserted(OrderLine),
    OrderLineRemoved(AssetId),
    Reset,
}

impl PaymentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one action.
    pub fn apply(&mut self, action: PaymentAction) {
        match action {
            PaymentAction::ServiceSelected(service) => {
                let changed = self
                    .service
                    .as_ref()
                    .is_some_and(|current| current.service_id != service.service_id);
                if changed {
                    self.assets.clear();
                    self.estimate = None;
                    self.order = None;
                }
                self.service = Some(service);
            }
            PaymentAction::AssetsSelected(assets) => {
                self.assets = assets;
            }
            PaymentAction::AssetQuantityChanged { asset_id, quantity } => {
                if quantity == 0 {
                    self.assets.retain(|a| a.asset_id != asset_id);
                } else if let Some(asset) = self.assets.iter_mut().find(|a| a.asset_id == asset_id) {
                    asset.quantity = quantity;
                } else {
                    tracing::debug!(%asset_id, "quantity change for unselected asset ignored");
                }
            }
            PaymentAction::BillingProfileSet(profile) => {
                self.billing_profile = Some(profile);
            }
            PaymentAction::TransactionRecorded(transaction) => {
                if let Some(current) = &self.transaction
                    && current.transaction_id == transaction.transaction_id
                    && current.status.is_terminal()
                {
                    tracing::warn!(
                        transaction_id = %current.transaction_id,
                        status = %current.status,
                        "refusing to reopen a terminal transaction"
                    );
                    return;
                }
                self.transaction = Some(transaction);
            }
            PaymentAction::TransactionStatusChanged(next) => match &mut self.transaction {
                Some(tx) if tx.status == next => {}
                Some(tx) if tx.status.can_transition_to(next) => {
                    tx.status = next;
                }
                Some(tx) => {
                    tracing::warn!(
                        transaction_id = %tx.transaction_id,
                        from = %tx.status,
                        to = %next,
                        "invalid transaction status transition ignored"
                    );
                }
                None => {
                    tracing::warn!(to = %next, "status change without a transaction ignored");
                }
            },
            PaymentAction::EstimateRecorded(estimate) => {
                self.estimate = Some(estimate);
            }
            PaymentAction::OrderRecorded(order) => {
                self.order = Some(order);
            }
            PaymentAction::OrderDiscarded => {
                self.order = None;
            }
            PaymentAction::OrderLineUpserted(line) => {
                if let Some(order) = &mut self.order {
                    order.upsert_line(line);
                }
            }
            PaymentAction::OrderLineRemoved(asset_id) => {
                if let Some(order) = &mut self.order {
                    order.remove_line(&asset_id);
                }
            }
            PaymentAction::Reset => {
                *self = Self::default();
            }
        }
    }
}

// Query methods
impl PaymentState {
    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    pub fn assets(&self) -> &[AssetEntity] {
        &self.assets
    }

    pub fn billing_profile(&self) -> Option<&BillingProfile> {
        self.billing_profile.as_ref()
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Returns the transaction only while it is pending or initiated.
    pub fn active_transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref().filter(|tx| tx.is_active())
    }

    pub fn estimate(&self) -> Option<&Estimate> {
        self.estimate.as_ref()
    }

    /// Returns the estimate only if it is persisted.
    pub fn persisted_estimate(&self) -> Option<&Estimate> {
        self.estimate.as_ref().filter(|e| !e.is_draft())
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }
}
