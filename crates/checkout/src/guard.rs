//! Session-scoped idempotency guard.
//!
//! Two mechanisms keep a session from creating duplicate backend records:
//! - ids of created records are written to session storage under
//!   `{resource}-{sessionId}`, so a restarted process recovers them; the
//!   order and the payment handoff are kept as JSON records
//! - a [`SingleFlight`] per resource holds the in-flight creation itself;
//!   concurrent callers await that same future instead of starting another

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use domain::{EstimateDetails, Transaction};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use session_store::KeyValueStore;

use crate::error::{CheckoutError, Result};

/// Storage key of the current session id.
pub const SESSION_ID_KEY: &str = "payment-session-id";

/// A record kind the guard deduplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Transaction,
    Estimate,
    Order,
    Payment,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Transaction,
        Resource::Estimate,
        Resource::Order,
        Resource::Payment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Transaction => "transaction",
            Resource::Estimate => "estimate",
            Resource::Order => "order",
            Resource::Payment => "payment",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type SharedFlight<T> = Shared<BoxFuture<'static, Result<T>>>;

/// How a caller took part in a [`SingleFlight`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Started the operation.
    Leader,
    /// Joined an operation already in flight.
    Follower,
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader)
    }
}

/// Memoizes one in-flight async operation.
///
/// The first caller of [`SingleFlight::run`] starts the operation; callers
/// arriving while it is pending await the same future and get the same
/// result. The slot empties once the operation resolves, so a failed
/// creation can be retried by the next call. Each caller also learns its
/// [`Role`], so one-off side effects run once per operation.
pub struct SingleFlight<T> {
    slot: Mutex<Option<SharedFlight<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while an operation is pending.
    pub fn is_in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Runs `start()` unless an operation is already in flight, in which case
    /// the pending operation's result is awaited instead.
    pub async fn run<F, Fut>(&self, start: F) -> Result<(T, Role)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (flight, role) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("joining in-flight operation");
                    (pending.clone(), Role::Follower)
                }
                None => {
                    let flight = start().boxed().shared();
                    *slot = Some(flight.clone());
                    (flight, Role::Leader)
                }
            }
        };

        let result = flight.clone().await;

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&flight)) {
            *slot = None;
        }
        result.map(|value| (value, role))
    }
}

/// Session-scoped idempotency keys plus per-resource in-flight memoization.
pub struct IdempotencyGuard<K> {
    store: K,
    transactions: SingleFlight<Transaction>,
    estimates: SingleFlight<EstimateDetails>,
}

impl<K: KeyValueStore> IdempotencyGuard<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            transactions: SingleFlight::new(),
            estimates: SingleFlight::new(),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &K {
        &self.store
    }

    /// Returns the current session id, starting a new session if none exists.
    ///
    /// New ids are the current time in epoch milliseconds.
    pub fn session_id(&self) -> Result<String> {
        if let Some(existing) = self.store.get(SESSION_ID_KEY)? {
            return Ok(existing);
        }

        let session_id = Utc::now().timestamp_millis().to_string();
        self.store.set(SESSION_ID_KEY, &session_id)?;
        tracing::debug!(%session_id, "started checkout session");
        Ok(session_id)
    }

    /// Returns the storage key of `resource` for the current session.
    pub fn key(&self, resource: Resource) -> Result<String> {
        Ok(format!("{}-{}", resource.as_str(), self.session_id()?))
    }

    pub fn get(&self, resource: Resource) -> Result<Option<String>> {
        Ok(self.store.get(&self.key(resource)?)?)
    }

    pub fn set(&self, resource: Resource, value: &str) -> Result<()> {
        Ok(self.store.set(&self.key(resource)?, value)?)
    }

    pub fn clear(&self, resource: Resource) -> Result<()> {
        Ok(self.store.remove(&self.key(resource)?)?)
    }

    /// Reads a JSON record stored under `resource`.
    ///
    /// A record that no longer parses is an error rather than `None`, since
    /// treating it as absent would recreate what it describes.
    pub fn get_record<T: DeserializeOwned>(&self, resource: Resource) -> Result<Option<T>> {
        let Some(raw) = self.get(resource)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            CheckoutError::Storage(format!("unreadable {resource} record: {e}"))
        })
    }

    /// Stores `record` as JSON under `resource`.
    pub fn set_record<T: Serialize>(&self, resource: Resource, record: &T) -> Result<()> {
        let raw = serde_json::to_string(record)
            .map_err(|e| CheckoutError::Storage(format!("cannot encode {resource} record: {e}")))?;
        self.set(resource, &raw)
    }

    /// Removes the session id and every resource key of the session.
    ///
    /// The next call to [`IdempotencyGuard::session_id`] starts a new session.
    pub fn clear_session(&self) -> Result<()> {
        let Some(session_id) = self.store.get(SESSION_ID_KEY)? else {
            return Ok(());
        };
        for resource in Resource::ALL {
            self.store
                .remove(&format!("{}-{session_id}", resource.as_str()))?;
        }
        self.store.remove(SESSION_ID_KEY)?;
        Ok(())
    }

    /// Returns true while a creation of `resource` is pending.
    pub fn is_in_flight(&self, resource: Resource) -> bool {
        match resource {
            Resource::Transaction => self.transactions.is_in_flight(),
            Resource::Estimate => self.estimates.is_in_flight(),
            Resource::Order | Resource::Payment => false,
        }
    }

    pub(crate) fn transaction_flight(&self) -> &SingleFlight<Transaction> {
        &self.transactions
    }

    pub(crate) fn estimate_flight(&self) -> &SingleFlight<EstimateDetails> {
        &self.estimates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_store::InMemoryKeyValueStore;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_session_id_is_generated_once() {
        let store = InMemoryKeyValueStore::new();
        let guard = IdempotencyGuard::new(store.clone());

        let first = guard.session_id().unwrap();
        let second = guard.session_id().unwrap();

        assert_eq!(first, second);
        assert!(first.parse::<i64>().is_ok());
        assert_eq!(store.get(SESSION_ID_KEY).unwrap(), Some(first));
    }

    #[test]
    fn test_keys_are_scoped_to_session() {
        let store = InMemoryKeyValueStore::new();
        store.set(SESSION_ID_KEY, "1700000000000").unwrap();
        let guard = IdempotencyGuard::new(store.clone());

        guard.set(Resource::Transaction, "txn-1").unwrap();
        guard.set(Resource::Estimate, "est-1").unwrap();

        assert_eq!(
            store.get("transaction-1700000000000").unwrap().as_deref(),
            Some("txn-1")
        );
        assert_eq!(
            guard.get(Resource::Estimate).unwrap().as_deref(),
            Some("est-1")
        );

        guard.clear(Resource::Estimate).unwrap();
        assert_eq!(guard.get(Resource::Estimate).unwrap(), None);
        assert!(guard.get(Resource::Transaction).unwrap().is_some());
    }

    #[test]
    fn test_clear_session_removes_all_keys() {
        let store = InMemoryKeyValueStore::new();
        store.set(SESSION_ID_KEY, "42").unwrap();
        store.set("unrelated", "keep").unwrap();
        let guard = IdempotencyGuard::new(store.clone());
        guard.set(Resource::Transaction, "txn-1").unwrap();
        guard.set(Resource::Estimate, "est-1").unwrap();
        guard.set(Resource::Order, "{}").unwrap();
        guard.set(Resource::Payment, "{}").unwrap();

        guard.clear_session().unwrap();

        assert!(!store.contains_key(SESSION_ID_KEY));
        assert!(!store.contains_key("order-42"));
        assert!(!store.contains_key("payment-42"));
        assert!(!store.contains_key("transaction-42"));
        assert!(!store.contains_key("estimate-42"));
        assert!(store.contains_key("unrelated"));
    }

    #[test]
    fn test_clear_session_without_session_is_noop() {
        let store = InMemoryKeyValueStore::new();
        let guard = IdempotencyGuard::new(store.clone());
        guard.clear_session().unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_single_flight_shares_pending_result() {
        let flight: SingleFlight<u32> = SingleFlight::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let start = |starts: Arc<AtomicUsize>| {
            move || async move {
                starts.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(7)
            }
        };

        let (a, b) = tokio::join!(
            flight.run(start(starts.clone())),
            flight.run(start(starts.clone()))
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.0, 7);
        assert_eq!(b.0, 7);
        assert_eq!([a.1, b.1].iter().filter(|r| r.is_leader()).count(), 1);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(!flight.is_in_flight());
    }

    #[tokio::test]
    async fn test_single_flight_retries_after_failure() {
        let flight: SingleFlight<u32> = SingleFlight::new();

        let failed = flight
            .run(|| async { Err(CheckoutError::NoService) })
            .await;
        assert_eq!(failed, Err(CheckoutError::NoService));
        assert!(!flight.is_in_flight());

        let ok = flight.run(|| async { Ok(1) }).await;
        assert_eq!(ok, Ok((1, Role::Leader)));
    }

    #[test]
    fn test_records_round_trip_and_reject_garbage() {
        let store = InMemoryKeyValueStore::new();
        store.set(SESSION_ID_KEY, "7").unwrap();
        let guard = IdempotencyGuard::new(store.clone());

        assert_eq!(guard.get_record::<serde_json::Value>(Resource::Payment).unwrap(), None);

        guard
            .set_record(Resource::Payment, &serde_json::json!({"paymentId": "PAY-1"}))
            .unwrap();
        let record: serde_json::Value = guard.get_record(Resource::Payment).unwrap().unwrap();
        assert_eq!(record["paymentId"], "PAY-1");

        store.set("order-7", "{not json").unwrap();
        let err = guard.get_record::<serde_json::Value>(Resource::Order).unwrap_err();
        assert!(matches!(err, CheckoutError::Storage(_)));
    }
}
