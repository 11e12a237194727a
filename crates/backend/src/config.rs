//! Backend client configuration loaded from environment variables.

use std::time::Duration;

/// HTTP client configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CHECKOUT_API_BASE_URL` — backend origin (default: `"http://localhost:3000"`)
/// - `CHECKOUT_API_TOKEN` — bearer token passed through on every request (default: none)
/// - `CHECKOUT_HTTP_TIMEOUT_MS` — per-request timeout (default: none)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Option<Duration>,
}

impl BackendConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: lookup("CHECKOUT_API_BASE_URL").unwrap_or(defaults.base_url),
            api_token: lookup("CHECKOUT_API_TOKEN").filter(|t| !t.is_empty()),
            timeout: lookup("CHECKOUT_HTTP_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_token: None,
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_values() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.api_token, None);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CHECKOUT_API_BASE_URL", "https://shop.example.com"),
            ("CHECKOUT_API_TOKEN", "secret"),
            ("CHECKOUT_HTTP_TIMEOUT_MS", "2500"),
        ]);
        let config = BackendConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://shop.example.com");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_invalid_timeout_and_empty_token_are_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CHECKOUT_API_TOKEN", ""),
            ("CHECKOUT_HTTP_TIMEOUT_MS", "soon"),
        ]);
        let config = BackendConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_token, None);
        assert_eq!(config.timeout, None);
    }
}
