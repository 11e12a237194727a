//! The checkout flow: shared state plus the collaborators every step uses.

use std::sync::{Arc, PoisonError, RwLock};

use backend::CommerceBackend;
use common::AssetId;
use domain::{
    AssetEntity, BillingProfile, Buyer, Order, PaymentAction, PaymentInput, PaymentState, Service,
    Transaction,
};
use session_store::KeyValueStore;

use crate::error::{CheckoutError, Result};
use crate::events::{CheckoutEvent, EventSink, TracingEventSink};
use crate::guard::IdempotencyGuard;
use crate::reconcile::ReconcileReport;

/// Per-deployment checkout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// ISO currency code used for transactions and orders.
    pub currency: String,
    pub buyer: Buyer,
}

impl CheckoutSettings {
    pub fn new(currency: impl Into<String>, buyer: Buyer) -> Self {
        Self {
            currency: currency.into(),
            buyer,
        }
    }
}

/// Result of [`CheckoutFlow::run_checkout`].
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub transaction: Transaction,
    pub order: Order,
    pub reconcile: ReconcileReport,
    /// Raw payment provider handoff returned by the backend.
    pub payment: serde_json::Value,
}

/// Orchestrates one checkout session.
///
/// The flow owns the session's [`PaymentState`]; every step reads a snapshot
/// and records its results through the reducer. The state lock is never held
/// across a backend call.
pub struct CheckoutFlow<B, K, E = TracingEventSink> {
    pub(crate) backend: Arc<B>,
    pub(crate) guard: IdempotencyGuard<K>,
    state: RwLock<PaymentState>,
    pub(crate) events: E,
    pub(crate) settings: CheckoutSettings,
}

impl<B, K, E> CheckoutFlow<B, K, E>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    /// Creates a flow with empty state over `store`.
    pub fn new(backend: Arc<B>, store: K, events: E, settings: CheckoutSettings) -> Self {
        Self {
            backend,
            guard: IdempotencyGuard::new(store),
            state: RwLock::new(PaymentState::new()),
            events,
            settings,
        }
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> PaymentState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn guard(&self) -> &IdempotencyGuard<K> {
        &self.guard
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Applies `action` through the reducer.
    pub fn dispatch(&self, action: PaymentAction) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(action);
    }

    pub(crate) fn emit(&self, event: CheckoutEvent) {
        self.events.emit(event);
    }

    pub fn select_service(&self, service: Service) {
        self.dispatch(PaymentAction::ServiceSelected(service));
    }

    pub fn set_assets(&self, assets: Vec<AssetEntity>) {
        self.dispatch(PaymentAction::AssetsSelected(assets));
    }

    pub fn set_asset_quantity(&self, asset_id: impl Into<AssetId>, quantity: u32) {
        self.dispatch(PaymentAction::AssetQuantityChanged {
            asset_id: asset_id.into(),
            quantity,
        });
    }

    pub fn set_billing_profile(&self, profile: BillingProfile) {
        self.dispatch(PaymentAction::BillingProfileSet(profile));
    }

    /// Runs the whole pipeline up to the payment handoff.
    ///
    /// Each step is idempotent for the session, so calling this again after
    /// a failure resumes where the previous run stopped.
    #[tracing::instrument(skip(self))]
    pub async fn run_checkout(&self, payment_method: &str) -> Result<CheckoutOutcome> {
        let started = std::time::Instant::now();

        let transaction = self.initiate_transaction_flow().await?;
        self.create_estimate_only()
            .await?
            .ok_or(CheckoutError::NoService)?;
        self.ensure_order().await?;
        let reconcile = self.update_order_lines_flow().await;

        let order = self.state().order().cloned().ok_or(CheckoutError::NoOrder)?;
        let payment = self
            .ensure_payment(PaymentInput::for_order(&order, payment_method))
            .await?;

        metrics::histogram!("checkout_flow_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            transaction_id = %transaction.transaction_id,
            order_id = %order.order_id,
            "checkout handed off to payment"
        );

        let transaction = self.state().transaction().cloned().unwrap_or(transaction);
        Ok(CheckoutOutcome {
            transaction,
            order,
            reconcile,
            payment,
        })
    }
}
