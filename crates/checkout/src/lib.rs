//! Checkout orchestration.
//!
//! This crate drives one checkout session through the backend:
//! 1. Initiate (or recover) the session's transaction
//! 2. Create (or recover) a persisted estimate for the selected service
//! 3. Create an order from that estimate
//! 4. Reconcile the order's lines whenever the estimate changes
//! 5. Submit the payment instruction
//! 6. Finalize the transaction and clear the session
//!
//! Creation steps are idempotent per session: ids, the order and the
//! payment handoff are kept in session storage through [`IdempotencyGuard`],
//! and concurrent callers share a single in-flight request instead of racing
//! to create duplicates.

pub mod coordinator;
pub mod error;
pub mod estimate;
pub mod events;
pub mod guard;
pub mod order;
pub mod payment;
pub mod reconcile;
pub mod transaction;

pub use coordinator::{CheckoutFlow, CheckoutOutcome, CheckoutSettings};
pub use error::{CheckoutError, Result};
pub use events::{CheckoutEvent, EventSink, RecordingEventSink, TracingEventSink};
pub use guard::{IdempotencyGuard, Resource, Role, SESSION_ID_KEY, SingleFlight};
pub use payment::SubmittedPayment;
pub use reconcile::{LineFailure, LinePlan, ReconcileReport, plan_line_changes};
