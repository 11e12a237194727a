//! CLI error types.

use std::path::PathBuf;

use backend::BackendError;
use checkout::CheckoutError;
use session_store::SessionStoreError;
use thiserror::Error;

/// Errors that end a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read cart file {path}: {source}")]
    CartRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cart file {path}: {source}")]
    CartFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] SessionStoreError),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Convenience type alias for CLI results.
pub type Result<T> = std::result::Result<T, CliError>;
