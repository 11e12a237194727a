use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when reading or writing session storage.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// The backing file could not be read or written.
    #[error("I/O error on session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file does not contain a JSON object of strings.
    #[error("Corrupt session file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory snapshot could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for session storage operations.
pub type Result<T> = std::result::Result<T, SessionStoreError>;
