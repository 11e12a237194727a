//! CLI configuration loaded from environment variables.

use std::path::PathBuf;

use backend::BackendConfig;
use domain::Buyer;

use crate::error::{CliError, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// CLI configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CHECKOUT_API_BASE_URL`, `CHECKOUT_API_TOKEN`, `CHECKOUT_HTTP_TIMEOUT_MS` — see [`BackendConfig`]
/// - `CHECKOUT_CURRENCY` — ISO currency code (default: `"EUR"`)
/// - `CHECKOUT_BUYER_USER_ID` — buyer on whose behalf the checkout runs (required)
/// - `CHECKOUT_BUYER_ORG_ID` — buyer organization (default: none)
/// - `CHECKOUT_SESSION_FILE` — session storage file (default: `".checkout-session.json"`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `"json"` for JSON logs (default: plain text)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendConfig,
    pub currency: String,
    pub buyer_user_id: Option<String>,
    pub buyer_organization_id: Option<String>,
    pub session_file: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            backend: BackendConfig::from_lookup(&lookup),
            currency: non_empty("CHECKOUT_CURRENCY").unwrap_or(defaults.currency),
            buyer_user_id: non_empty("CHECKOUT_BUYER_USER_ID"),
            buyer_organization_id: non_empty("CHECKOUT_BUYER_ORG_ID"),
            session_file: non_empty("CHECKOUT_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
        }
    }

    /// Returns the buyer, failing if no user id is configured.
    pub fn buyer(&self) -> Result<Buyer> {
        let user_id = self
            .buyer_user_id
            .as_deref()
            .ok_or_else(|| CliError::Config("CHECKOUT_BUYER_USER_ID is not set".to_string()))?;

        let buyer = Buyer::new(user_id);
        Ok(match &self.buyer_organization_id {
            Some(org) => buyer.with_organization(org.as_str()),
            None => buyer,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            currency: "EUR".to_string(),
            buyer_user_id: None,
            buyer_organization_id: None,
            session_file: PathBuf::from(".checkout-session.json"),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
