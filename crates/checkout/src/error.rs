//! Checkout error types.

use backend::BackendError;
use common::{EstimateId, OrderId, TransactionId};
use domain::{DomainError, TransactionStatus};
use session_store::SessionStoreError;
use thiserror::Error;

/// Errors returned by checkout flows.
///
/// The error is `Clone` because one in-flight creation can resolve several
/// waiting callers with the same outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckoutError {
    /// No service has been selected.
    #[error("No service selected")]
    NoService,

    /// An order needs an active transaction.
    #[error("No transaction id available for order creation")]
    NoTransactionId,

    /// The selected service has no seller organization.
    #[error("Service has no seller organization id")]
    NoSellerOrganization,

    /// Neither state nor session storage holds an estimate.
    #[error("No estimate to create order from")]
    NoEstimate,

    /// Orders are only built from persisted estimates.
    #[error("Cannot create order from draft estimate")]
    DraftEstimate,

    /// An estimate update needs a persisted estimate.
    #[error("No persisted estimate to update")]
    NoPersistedEstimate,

    /// Payment needs an order.
    #[error("No order to pay for")]
    NoOrder,

    /// The payment instruction names an order this session does not hold.
    #[error("Payment is for order {requested} but the session holds order {held}")]
    OrderMismatch { requested: OrderId, held: OrderId },

    /// Finalization needs a transaction.
    #[error("No transaction to finalize")]
    NoTransaction,

    /// The transaction already reached a terminal state.
    #[error("Transaction {transaction_id} is already {status}")]
    TransactionClosed {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },

    /// The backend answered a create/update with a draft record.
    #[error("Backend returned draft estimate {0}")]
    UnexpectedDraft(EstimateId),

    /// The buyer's selection is invalid.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Session storage could not be read or written.
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl CheckoutError {
    /// Returns true for errors raised before any network call because the
    /// flow was invoked out of sequence. These must not be retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CheckoutError::NoService
                | CheckoutError::NoTransactionId
                | CheckoutError::NoSellerOrganization
                | CheckoutError::NoEstimate
                | CheckoutError::DraftEstimate
                | CheckoutError::NoPersistedEstimate
                | CheckoutError::NoOrder
                | CheckoutError::OrderMismatch { .. }
                | CheckoutError::NoTransaction
                | CheckoutError::TransactionClosed { .. }
        )
    }
}

impl From<SessionStoreError> for CheckoutError {
    fn from(err: SessionStoreError) -> Self {
        CheckoutError::Storage(err.to_string())
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;
    use backend::Operation;

    #[test]
    fn test_fixed_messages() {
        assert_eq!(
            CheckoutError::DraftEstimate.to_string(),
            "Cannot create order from draft estimate"
        );
        assert_eq!(
            CheckoutError::NoEstimate.to_string(),
            "No estimate to create order from"
        );
    }

    #[test]
    fn test_backend_errors_are_not_preconditions() {
        let err = CheckoutError::from(BackendError::Unavailable {
            operation: Operation::CreateOrder,
        });
        assert!(!err.is_precondition());
        assert_eq!(err.to_string(), "Failed to create order: backend unavailable");
        assert!(CheckoutError::NoOrder.is_precondition());
    }
}
