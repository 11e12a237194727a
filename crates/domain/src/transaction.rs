//! Checkout transaction and its status state machine.

use common::{ServiceId, TransactionId};
use serde::{Deserialize, Serialize};

/// The status of a checkout transaction.
///
/// State transitions:
/// ```text
/// Pending ──► Initiated ──┬──► Completed
///    │                    │
///    └────────────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Created, no payment submitted yet.
    #[default]
    Pending,

    /// Payment instruction submitted to the provider.
    Initiated,

    /// Payment confirmed and the session closed (terminal state).
    Completed,

    /// Abandoned or failed to finalize (terminal state).
    Failed,
}

impl TransactionStatus {
    /// Returns true while the transaction can still be paid.
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Initiated)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        match (self, next) {
            (TransactionStatus::Pending, TransactionStatus::Initiated) => true,
            (from, TransactionStatus::Completed | TransactionStatus::Failed) => from.is_active(),
            _ => false,
        }
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Initiated => "INITIATED",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The commerce transaction tying a buyer, a service and the payment together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub service_id: ServiceId,
    #[serde(default)]
    pub status: TransactionStatus,
}

impl Transaction {
    /// Rebuilds a pending transaction from an id recovered out of session storage.
    pub fn recovered(transaction_id: TransactionId, service_id: ServiceId) -> Self {
        Self {
            transaction_id,
            service_id,
            status: TransactionStatus::Pending,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransactionStatus; 4] = [
        TransactionStatus::Pending,
        TransactionStatus::Initiated,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
    }

    #[test]
    fn test_active_and_terminal_are_disjoint() {
        for status in ALL {
            assert_ne!(status.is_active(), status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn test_terminal_states_never_transition() {
        for from in [TransactionStatus::Completed, TransactionStatus::Failed] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_allowed_transitions() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Initiated));
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Initiated.can_transition_to(Completed));
        assert!(Initiated.can_transition_to(Failed));
        assert!(!Initiated.can_transition_to(Pending));
        assert!(!Initiated.can_transition_to(Initiated));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&TransactionStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");

        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "transactionId": "txn-1",
            "serviceId": "svc-1"
        }))
        .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.is_active());
    }
}
