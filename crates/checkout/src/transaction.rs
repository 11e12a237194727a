//! Transaction initiation: one transaction per checkout session.

use std::sync::Arc;

use backend::{CommerceBackend, CreateTransactionRequest};
use common::TransactionId;
use domain::{PaymentAction, Service, Transaction};
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
    /// Returns the session's transaction, creating it only if needed.
    ///
    /// In order: an active transaction already in state is returned as is;
    /// an id stored for this session is trusted and rebuilt as pending
    /// without a backend call; otherwise the transaction is created. Callers
    /// arriving while the creation is in flight share its result.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_transaction_flow(&self) -> Result<Transaction> {
        let state = self.state();
        if let Some(transaction) = state.active_transaction() {
            tracing::debug!(transaction_id = %transaction.transaction_id, "transaction already active");
            return Ok(transaction.clone());
        }

        let service = state.service().cloned().ok_or(CheckoutError::NoService)?;

        if let Some(transaction) = self.recover_transaction(&service)? {
            return Ok(transaction);
        }

        let request = CreateTransactionRequest {
            service_id: service.service_id.clone(),
            seller_organization_id: service.organization_id.clone(),
            currency: self.settings.currency.clone(),
            buyer_user_id: self.settings.buyer.user_id.clone(),
            buyer_organization_id: self.settings.buyer.organization_id.clone(),
            total_amount: service.indicative_total(state.assets()),
            metadata: serde_json::json!({
                "sessionId": self.guard.session_id()?,
                "serviceTitle": service.title,
                "assetCount": state.assets().len(),
            }),
        };

        let backend = Arc::clone(&self.backend);
        let (transaction, role) = self
            .guard
            .transaction_flight()
            .run(move || async move { Ok(backend.create_transaction(request).await?) })
            .await?;

        // Both writes are idempotent; only the caller that sent the request
        // counts and announces it.
        self.guard
            .set(Resource::Transaction, transaction.transaction_id.as_str())?;
        self.dispatch(PaymentAction::TransactionRecorded(transaction.clone()));

        if role.is_leader() {
            metrics::counter!("checkout_transactions_created_total").increment(1);
            tracing::info!(transaction_id = %transaction.transaction_id, "transaction created");
            self.emit(CheckoutEvent::TransactionCreated {
                transaction_id: transaction.transaction_id.clone(),
            });
        }

        Ok(transaction)
    }

    /// Rebuilds the transaction whose id is stored for this session, as
    /// pending and without a backend call.
    ///
    /// A stored id that matches a transaction this flow already saw close is
    /// stale; it is cleared and `None` is returned.
    pub fn recover_transaction(&self, service: &Service) -> Result<Option<Transaction>> {
        let Some(stored) = self.guard.get(Resource::Transaction)? else {
            return Ok(None);
        };

        let closed = self
            .state()
            .transaction()
            .is_some_and(|tx| tx.transaction_id.as_str() == stored && tx.status.is_terminal());
        if closed {
            tracing::info!(transaction_id = %stored, "stored transaction is closed; starting a new one");
            self.guard.clear(Resource::Transaction)?;
            return Ok(None);
        }

        let transaction = Transaction::recovered(TransactionId::new(stored), service.service_id.clone());
        self.dispatch(PaymentAction::TransactionRecorded(transaction.clone()));

        metrics::counter!("checkout_transactions_recovered_total").increment(1);
        tracing::info!(transaction_id = %transaction.transaction_id, "transaction recovered from session");
        self.emit(CheckoutEvent::TransactionRecovered {
            transaction_id: transaction.transaction_id.clone(),
        });
        Ok(Some(transaction))
    }
}
