//! Payment handoff and the end of a transaction's life.

use backend::CommerceBackend;
use domain::{
    EstimateStatus, EstimateUpdate, OrderId, PaymentAction, PaymentInput, Transaction,
    TransactionStatus,
};
use serde::{Deserialize, Serialize};
use session_store::KeyValueStore;

use crate::coordinator::CheckoutFlow;
use crate::error::{CheckoutError, Result};
use crate::events::{CheckoutEvent, EventSink};
use crate::guard::Resource;

/// Provider handoff kept in session storage once a payment is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedPayment {
    pub order_id: OrderId,
    pub response: serde_json::Value,
}

impl<B, K, E> CheckoutFlow<B, K, E>
where
    B: CommerceBackend + 'static,
    K: KeyValueStore,
    E: EventSink,
{
    /// Submits the payment instruction and returns the provider handoff
    /// untouched. The local transaction moves to `INITIATED`.
    ///
    /// `input` must name the order held in state.
    #[tracing::instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn initiate_payment_flow(&self, input: PaymentInput) -> Result<serde_json::Value> {
        let order_id = self.held_order_id(&input)?;

        let response = self.backend.submit_payment(input).await?;

        let submitted = SubmittedPayment {
            order_id: order_id.clone(),
            response,
        };
        if let Err(err) = self.guard.set_record(Resource::Payment, &submitted) {
            self.emit(CheckoutEvent::non_critical("persist_payment", err.to_string()));
        }
        self.dispatch(PaymentAction::TransactionStatusChanged(TransactionStatus::Initiated));

        metrics::counter!("checkout_payments_submitted_total").increment(1);
        tracing::info!(%order_id, "payment submitted");
        self.emit(CheckoutEvent::PaymentSubmitted { order_id });

        Ok(submitted.response)
    }

    /// Returns the handoff already stored for the order in `input`, or
    /// submits the payment if none was.
    #[tracing::instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn ensure_payment(&self, input: PaymentInput) -> Result<serde_json::Value> {
        let order_id = self.held_order_id(&input)?;

        match self.guard.get_record::<SubmittedPayment>(Resource::Payment)? {
            Some(stored) if stored.order_id == order_id => {
                self.dispatch(PaymentAction::TransactionStatusChanged(
                    TransactionStatus::Initiated,
                ));
                tracing::info!(%order_id, "payment handoff recovered from session");
                self.emit(CheckoutEvent::PaymentRecovered { order_id });
                Ok(stored.response)
            }
            Some(stored) => {
                tracing::info!(stale_order_id = %stored.order_id, "dropping payment stored for another order");
                self.guard.clear(Resource::Payment)?;
                self.initiate_payment_flow(input).await
            }
            None => self.initiate_payment_flow(input).await,
        }
    }

    fn held_order_id(&self, input: &PaymentInput) -> Result<OrderId> {
        let held = self
            .state()
            .order()
            .map(|order| order.order_id.clone())
            .ok_or(CheckoutError::NoOrder)?;
        if held != input.order_id {
            return Err(CheckoutError::OrderMismatch {
                requested: input.order_id.clone(),
                held,
            });
        }
        Ok(held)
    }

    /// Marks the transaction completed and closes the session.
    ///
    /// After the backend accepts the completion, every session key is
    /// removed and the estimate is marked paid on a best-effort basis. If the
    /// backend rejects the completion, the local transaction becomes
    /// `FAILED` and the error is returned.
    #[tracing::instrument(skip(self))]
    pub async fn finalize_transaction_flow(&self) -> Result<Transaction> {
        let state = self.state();
        let transaction = state.transaction().cloned().ok_or(CheckoutError::NoTransaction)?;
        if transaction.status.is_terminal() {
            return Err(CheckoutError::TransactionClosed {
                transaction_id: transaction.transaction_id,
                status: transaction.status,
            });
        }

        if let Err(err) = self
            .backend
            .update_transaction_status(&transaction.transaction_id, TransactionStatus::Completed)
            .await
        {
            tracing::error!(
                transaction_id = %transaction.transaction_id,
                error = %err,
                "failed to complete transaction"
            );
            self.dispatch(PaymentAction::TransactionStatusChanged(TransactionStatus::Failed));
            return Err(err.into());
        }

        if let Err(err) = self.guard.clear_session() {
            self.emit(CheckoutEvent::non_critical("clear_session", err.to_string()));
        }
        self.dispatch(PaymentAction::TransactionStatusChanged(TransactionStatus::Completed));

        if let Some(estimate_id) = state.persisted_estimate().and_then(|e| e.persisted_id()) {
            let update = EstimateUpdate::status(estimate_id.clone(), EstimateStatus::Paid);
            if let Err(err) = self.backend.update_estimate(update).await {
                self.emit(CheckoutEvent::non_critical("mark_estimate_paid", err.to_string()));
            }
        }

        metrics::counter!("checkout_finalized_total").increment(1);
        tracing::info!(transaction_id = %transaction.transaction_id, "transaction completed");
        self.emit(CheckoutEvent::TransactionFinalized {
            transaction_id: transaction.transaction_id.clone(),
        });

        Ok(self.state().transaction().cloned().unwrap_or(Transaction {
            status: TransactionStatus::Completed,
            ..transaction
        }))
    }

    /// Gives up on the current transaction so the next initiation starts a
    /// fresh one. The order and payment recorded for it are dropped; the
    /// estimate is kept. The backend status update is best-effort.
    #[tracing::instrument(skip(self))]
    pub async fn abandon_transaction_flow(&self, reason: &str) -> Result<Transaction> {
        let transaction = self
            .state()
            .active_transaction()
            .cloned()
            .ok_or(CheckoutError::NoTransaction)?;

        if let Err(err) = self
            .backend
            .update_transaction_status(&transaction.transaction_id, TransactionStatus::Failed)
            .await
        {
            self.emit(CheckoutEvent::non_critical("abandon_transaction", err.to_string()));
        }

        self.dispatch(PaymentAction::TransactionStatusChanged(TransactionStatus::Failed));
        self.dispatch(PaymentAction::OrderDiscarded);
        for resource in [Resource::Transaction, Resource::Order, Resource::Payment] {
            self.guard.clear(resource)?;
        }

        tracing::info!(transaction_id = %transaction.transaction_id, reason, "transaction abandoned");
        self.emit(CheckoutEvent::TransactionAbandoned {
            transaction_id: transaction.transaction_id.clone(),
            reason: reason.to_string(),
        });

        Ok(Transaction {
            status: TransactionStatus::Failed,
            ..transaction
        })
    }
}
