//! Session-scoped key-value storage.
//!
//! The checkout flow keeps its idempotency keys in storage that outlives a
//! single flow invocation. In a browser this was tab-scoped session storage;
//! here it is any [`KeyValueStore`] implementation, so the flow can be tested
//! in memory and persisted to disk by the CLI.

pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::{Result, SessionStoreError};
pub use file::FileKeyValueStore;
pub use memory::InMemoryKeyValueStore;
pub use store::KeyValueStore;
