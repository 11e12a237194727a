//! Checkout lifecycle events and the sinks that receive them.
//!
//! Non-critical failures (a reconciliation line that could not be written,
//! the best-effort estimate status update after finalization) do not fail
//! the flow that caused them. They are emitted here instead, so they stay
//! observable.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use common::{AssetId, EstimateId, OrderId, TransactionId};

/// Something that happened during a checkout session.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEvent {
    TransactionCreated { transaction_id: TransactionId },
    TransactionRecovered { transaction_id: TransactionId },
    EstimateCreated { estimate_id: EstimateId },
    EstimateRecovered { estimate_id: EstimateId },
    EstimateUpdated { estimate_id: EstimateId },
    OrderCreated { order_id: OrderId, estimate_id: EstimateId },
    OrderRecovered { order_id: OrderId },
    LinesReconciled {
        order_id: OrderId,
        deleted: usize,
        updated: usize,
        added: usize,
        failed: usize,
    },
    PaymentSubmitted { order_id: OrderId },
    /// A payment handoff stored for this session was reused instead of
    /// submitting the order again.
    PaymentRecovered { order_id: OrderId },
    TransactionFinalized { transaction_id: TransactionId },
    TransactionAbandoned {
        transaction_id: TransactionId,
        reason: String,
    },
    /// A secondary side effect failed; the primary operation still succeeded.
    NonCriticalFailure {
        operation: &'static str,
        asset_id: Option<AssetId>,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

impl CheckoutEvent {
    pub fn non_critical(operation: &'static str, reason: impl Into<String>) -> Self {
        CheckoutEvent::NonCriticalFailure {
            operation,
            asset_id: None,
            reason: reason.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn line_failure(operation: &'static str, asset_id: AssetId, reason: impl Into<String>) -> Self {
        CheckoutEvent::NonCriticalFailure {
            operation,
            asset_id: Some(asset_id),
            reason: reason.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Returns the event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::TransactionCreated { .. } => "TransactionCreated",
            CheckoutEvent::TransactionRecovered { .. } => "TransactionRecovered",
            CheckoutEvent::EstimateCreated { .. } => "EstimateCreated",
            CheckoutEvent::EstimateRecovered { .. } => "EstimateRecovered",
            CheckoutEvent::EstimateUpdated { .. } => "EstimateUpdated",
            CheckoutEvent::OrderCreated { .. } => "OrderCreated",
            CheckoutEvent::OrderRecovered { .. } => "OrderRecovered",
            CheckoutEvent::LinesReconciled { .. } => "LinesReconciled",
            CheckoutEvent::PaymentSubmitted { .. } => "PaymentSubmitted",
            CheckoutEvent::PaymentRecovered { .. } => "PaymentRecovered",
            CheckoutEvent::TransactionFinalized { .. } => "TransactionFinalized",
            CheckoutEvent::TransactionAbandoned { .. } => "TransactionAbandoned",
            CheckoutEvent::NonCriticalFailure { .. } => "NonCriticalFailure",
        }
    }

    pub fn is_non_critical_failure(&self) -> bool {
        matches!(self, CheckoutEvent::NonCriticalFailure { .. })
    }
}

/// Receives checkout events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CheckoutEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: CheckoutEvent) {
        (**self).emit(event);
    }
}

/// Default sink: structured logs plus a failure counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: CheckoutEvent) {
        match &event {
            CheckoutEvent::NonCriticalFailure {
                operation,
                asset_id,
                reason,
                ..
            } => {
                metrics::counter!("checkout_non_critical_failures_total", "operation" => *operation)
                    .increment(1);
                tracing::warn!(
                    operation,
                    asset_id = asset_id.as_ref().map(|a| a.as_str()),
                    reason = %reason,
                    "non-critical checkout failure"
                );
            }
            other => {
                tracing::info!(event = other.event_type(), detail = ?other, "checkout event");
            }
        }
    }
}

/// Sink that keeps every event in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<CheckoutEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event emitted so far.
    pub fn events(&self) -> Vec<CheckoutEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns only the non-critical failures.
    pub fn failures(&self) -> Vec<CheckoutEvent> {
        self.events()
            .into_iter()
            .filter(CheckoutEvent::is_non_critical_failure)
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: CheckoutEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_filters_failures() {
        let sink = RecordingEventSink::new();
        sink.emit(CheckoutEvent::TransactionCreated {
            transaction_id: TransactionId::new("txn-1"),
        });
        sink.emit(CheckoutEvent::non_critical("mark_estimate_paid", "timeout"));

        assert_eq!(sink.events().len(), 2);
        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].event_type(), "NonCriticalFailure");
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let sink = TracingEventSink;
        sink.emit(CheckoutEvent::line_failure(
            "add_order_line",
            AssetId::new("A"),
            "boom",
        ));
        sink.emit(CheckoutEvent::PaymentSubmitted {
            order_id: OrderId::new("ord-1"),
        });
    }
}
