//! Backend error types.

use thiserror::Error;

use crate::api::Operation;

/// Errors returned by a [`CommerceBackend`](crate::CommerceBackend).
///
/// Payloads are plain strings so the error is `Clone`: a single in-flight
/// creation may hand the same failure to several waiting callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend answered with a non-success status.
    #[error("{} (HTTP {status})", .operation.failure_message())]
    Http { operation: Operation, status: u16 },

    /// The request never produced a response.
    #[error("{}: {message}", .operation.failure_message())]
    Transport { operation: Operation, message: String },

    /// The response body was not the expected JSON.
    #[error("{}: unreadable response ({message})", .operation.failure_message())]
    Decode { operation: Operation, message: String },

    /// The referenced entity does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The backend refused the call without a status (in-memory failure injection).
    #[error("{}: backend unavailable", .operation.failure_message())]
    Unavailable { operation: Operation },

    /// The client could not be built from its configuration.
    #[error("Invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Returns the operation that failed, when known.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            BackendError::Http { operation, .. }
            | BackendError::Transport { operation, .. }
            | BackendError::Decode { operation, .. }
            | BackendError::Unavailable { operation } => Some(*operation),
            BackendError::NotFound { .. } | BackendError::Config(_) => None,
        }
    }
}

/// Convenience type alias for backend results.
pub type Result<T> = std::result::Result<T, BackendError>;
