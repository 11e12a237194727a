//! Command-line checkout driver.
//!
//! Wires the checkout flow to the HTTP backend and a file-backed session
//! store, so re-running a command after a crash resumes the same session.

pub mod cart;
pub mod config;
pub mod error;

use std::sync::Arc;

use backend::{CommerceBackend, HttpCommerceBackend};
use checkout::{CheckoutError, CheckoutFlow, CheckoutSettings, EventSink, TracingEventSink};
use session_store::{FileKeyValueStore, KeyValueStore};

pub use cart::Cart;
pub use config::{Config, LogFormat};
pub use error::{CliError, Result};

/// The flow the binary runs: HTTP backend, file session, log-based events.
pub type HttpCheckoutFlow = CheckoutFlow<HttpCommerceBackend, FileKeyValueStore, TracingEventSink>;

/// Builds the flow described by `config`.
pub fn build_flow(config: &Config) -> Result<HttpCheckoutFlow> {
    let backend = HttpCommerceBackend::new(config.backend.clone())?;
    let store = FileKeyValueStore::open(&config.session_file)?;
    let settings = CheckoutSettings::new(config.currency.clone(), config.buyer()?);

    tracing::debug!(
        base_url = %config.backend.base_url,
        session_file = %config.session_file.display(),
        "checkout flow ready"
    );
    Ok(CheckoutFlow::new(Arc::new(backend), store, TracingEventSink, settings))
}

/// Loads the cart's selection into the flow's state.
pub fn load_cart<B, K, E>(flow: &CheckoutFlow<B, K, E>, cart: &Cart)
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    flow.select_service(cart.service.clone());
    flow.set_assets(cart.assets.clone());
    if let Some(profile) = &cart.billing_profile {
        flow.set_billing_profile(profile.clone());
    }
}

/// Runs the checkout up to the payment handoff.
pub async fn pay<B, K, E>(flow: &CheckoutFlow<B, K, E>, cart: &Cart) -> Result<serde_json::Value>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    load_cart(flow, cart);
    let outcome = flow.run_checkout(&cart.payment_method).await?;

    Ok(serde_json::json!({
        "transactionId": outcome.transaction.transaction_id,
        "orderId": outcome.order.order_id,
        "payment": outcome.payment,
        "reconcile": {
            "deleted": outcome.reconcile.deleted,
            "updated": outcome.reconcile.updated,
            "added": outcome.reconcile.added,
            "failed": outcome.reconcile.failed.len(),
        },
        "state": serde_json::to_value(flow.state())?,
    }))
}

/// Completes the session's transaction after the provider confirmed payment.
pub async fn finalize<B, K, E>(flow: &CheckoutFlow<B, K, E>, cart: &Cart) -> Result<serde_json::Value>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    load_cart(flow, cart);
    resume(flow, cart).await?;
    let transaction = flow.finalize_transaction_flow().await?;

    Ok(serde_json::to_value(transaction)?)
}

/// Gives up on the session's transaction.
pub async fn abandon<B, K, E>(
    flow: &CheckoutFlow<B, K, E>,
    cart: &Cart,
    reason: &str,
) -> Result<serde_json::Value>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    load_cart(flow, cart);
    resume(flow, cart).await?;
    let transaction = flow.abandon_transaction_flow(reason).await?;

    Ok(serde_json::to_value(transaction)?)
}

/// Recovers the stored transaction, estimate and order without creating any.
async fn resume<B, K, E>(flow: &CheckoutFlow<B, K, E>, cart: &Cart) -> Result<()>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    if flow.state().active_transaction().is_none() {
        flow.recover_transaction(&cart.service)?
            .ok_or(CheckoutError::NoTransaction)?;
    }
    if flow.state().persisted_estimate().is_none() {
        flow.recover_estimate(Some(&cart.service.service_id)).await?;
    }
    if flow.state().order().is_none() {
        flow.recover_order()?;
    }
    Ok(())
}
