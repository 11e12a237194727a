//! Order creation from a persisted estimate.
//!
//! The created order is kept as a session record, so a restarted process
//! resumes it instead of ordering the same estimate twice.

use backend::CommerceBackend;
use domain::{Estimate, Order, OrderInput, PaymentAction};
use session_store::KeyValueStore;

use crate::coordinator::CheckoutFlow;
use crate::error::{CheckoutError, Result};
use crate::events::{CheckoutEvent, EventSink};
use crate::guard::Resource;

impl<B, K, E> CheckoutFlow<B, K, E>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    /// Creates an order committing to the session's persisted estimate.
    ///
    /// Preconditions are checked in a fixed order and each fails before any
    /// backend call. Not guarded against duplicates; use
    /// [`CheckoutFlow::ensure_order`] to reuse an existing order.
    #[tracing::instrument(skip(self))]
    pub async fn create_order_from_estimate_flow(&self) -> Result<Order> {
        let estimate = match self.state().estimate().cloned() {
            Some(estimate) => estimate,
            None => self
                .recover_estimate(None)
                .await?
                .ok_or(CheckoutError::NoEstimate)?,
        };

        let state = self.state();
        let transaction = state.transaction().ok_or(CheckoutError::NoTransactionId)?;
        let service = state.service().ok_or(CheckoutError::NoService)?;
        let seller_organization_id = service
            .organization_id
            .clone()
            .ok_or(CheckoutError::NoSellerOrganization)?;

        let details = match estimate {
            Estimate::Persisted(details) => details,
            Estimate::Draft(draft) => {
                tracing::warn!(estimate_id = %draft.estimate_id, "refusing to order a draft estimate");
                return Err(CheckoutError::DraftEstimate);
            }
        };

        let input = OrderInput {
            quote_id: details.estimate_id.clone(),
            service_id: service.service_id.clone(),
            transaction_id: transaction.transaction_id.clone(),
            seller_organization_id,
            total_price: details.details.total,
            currency: self.settings.currency.clone(),
        };

        let order = self.backend.create_order(input).await?;
        self.guard.set_record(Resource::Order, &order)?;
        self.dispatch(PaymentAction::OrderRecorded(order.clone()));

        metrics::counter!("checkout_orders_created_total").increment(1);
        tracing::info!(order_id = %order.order_id, estimate_id = %details.estimate_id, "order created");
        self.emit(CheckoutEvent::OrderCreated {
            order_id: order.order_id.clone(),
            estimate_id: details.estimate_id,
        });

        Ok(order)
    }

    /// Returns the session's order: the one in state, else the one stored
    /// for this session, else a newly created one.
    pub async fn ensure_order(&self) -> Result<Order> {
        if let Some(order) = self.state().order() {
            return Ok(order.clone());
        }
        if let Some(order) = self.recover_order()? {
            return Ok(order);
        }
        self.create_order_from_estimate_flow().await
    }

    /// Restores the order stored for this session, without a backend call.
    ///
    /// A record made for another transaction or estimate than the ones in
    /// state is stale; it is cleared and `None` is returned.
    pub fn recover_order(&self) -> Result<Option<Order>> {
        let Some(order) = self.guard.get_record::<Order>(Resource::Order)? else {
            return Ok(None);
        };

        let state = self.state();
        let other_transaction = state
            .transaction()
            .is_some_and(|tx| tx.transaction_id != order.transaction_id);
        let other_estimate = state
            .persisted_estimate()
            .is_some_and(|estimate| estimate.id() != &order.estimate_id);
        if other_transaction || other_estimate {
            tracing::info!(order_id = %order.order_id, "stored order belongs to another transaction or estimate");
            self.guard.clear(Resource::Order)?;
            return Ok(None);
        }

        self.dispatch(PaymentAction::OrderRecorded(order.clone()));

        metrics::counter!("checkout_orders_recovered_total").increment(1);
        tracing::info!(order_id = %order.order_id, lines = order.lines.len(), "order recovered from session");
        self.emit(CheckoutEvent::OrderRecovered {
            order_id: order.order_id.clone(),
        });
        Ok(Some(order))
    }

    /// Writes the order in state back to the session record.
    pub(crate) fn persist_order(&self) -> Result<()> {
        match self.state().order() {
            Some(order) => self.guard.set_record(Resource::Order, order),
            None => Ok(()),
        }
    }
}
