//! Client configuration for the tax-validation API and the explainer.
//!
//! Defaults point at a locally running tax-validation stub. Override via
//! environment variables or explicit construction for staging/testing.

use std::time::Duration;

use url::Url;

/// Default tax-validation API base URL.
pub const DEFAULT_TAX_API_URL: &str = "http://localhost:8080/api/gst";

/// Configuration for the tax-validation API.
///
/// Custom `Debug` implementation redacts the `api_key` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct TaxApiConfig {
    /// Base URL; endpoint names are appended as path segments.
    pub base_url: Url,
    /// Sent as `X-API-Key` on every request.
    pub api_key: String,
    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the initial attempt when the server answers 429.
    pub max_retries: u32,
    /// Upper bound on a single server-requested wait, in seconds.
    pub max_retry_wait_secs: u64,
    /// Lifetime of a cached response, in seconds.
    pub cache_ttl_secs: u64,
}

impl std::fmt::Debug for TaxApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_retry_wait_secs", &self.max_retry_wait_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .finish()
    }
}

impl TaxApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ICX_TAX_API_URL` (default: `http://localhost:8080/api/gst`)
    /// - `ICX_TAX_API_KEY` (required)
    /// - `ICX_TAX_API_TIMEOUT_SECS` (default: 5)
    /// - `ICX_TAX_API_MAX_RETRIES` (default: 3)
    /// - `ICX_TAX_API_MAX_RETRY_WAIT_SECS` (default: 30)
    /// - `ICX_TAX_API_CACHE_TTL_SECS` (default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ICX_TAX_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        Ok(Self {
            base_url: env_url("ICX_TAX_API_URL", DEFAULT_TAX_API_URL)?,
            api_key,
            timeout_secs: env_number("ICX_TAX_API_TIMEOUT_SECS", 5)?,
            max_retries: env_number("ICX_TAX_API_MAX_RETRIES", 3)?,
            max_retry_wait_secs: env_number("ICX_TAX_API_MAX_RETRY_WAIT_SECS", 30)?,
            cache_ttl_secs: env_number("ICX_TAX_API_CACHE_TTL_SECS", 3600)?,
        })
    }

    /// Create a configuration pointing to a local stub (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the localhost URL cannot be parsed.
    pub fn local_mock(port: u16, api_key: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&format!("http://127.0.0.1:{port}/api/gst"))
            .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))?;
        Ok(Self::with_base_url(base_url, api_key))
    }

    /// Default settings against an explicit base URL.
    pub fn with_base_url(base_url: Url, api_key: &str) -> Self {
        Self {
            base_url,
            api_key: api_key.to_string(),
            timeout_secs: 5,
            max_retries: 3,
            max_retry_wait_secs: 30,
            cache_ttl_secs: 3600,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn max_retry_wait(&self) -> Duration {
        Duration::from_secs(self.max_retry_wait_secs)
    }
}

/// Configuration for the natural-language explainer.
#[derive(Debug, Clone)]
pub struct ExplainerConfig {
    pub base_url: Url,
    pub model: String,
    pub timeout_secs: u64,
    /// Transport-failure retries after the initial attempt.
    pub max_retries: u32,
}

impl ExplainerConfig {
    /// Load from the environment. Returns `Ok(None)` when
    /// `ICX_EXPLAINER_URL` is unset, which disables explanations.
    ///
    /// Variables:
    /// - `ICX_EXPLAINER_URL` (optional)
    /// - `ICX_EXPLAINER_MODEL` (default: `llama3`)
    /// - `ICX_EXPLAINER_TIMEOUT_SECS` (default: 30)
    /// - `ICX_EXPLAINER_MAX_RETRIES` (default: 5)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(raw) = std::env::var("ICX_EXPLAINER_URL") else {
            return Ok(None);
        };
        let base_url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl("ICX_EXPLAINER_URL".to_string(), e.to_string()))?;
        Ok(Some(Self {
            base_url,
            model: std::env::var("ICX_EXPLAINER_MODEL").unwrap_or_else(|_| "llama3".to_string()),
            timeout_secs: env_number("ICX_EXPLAINER_TIMEOUT_SECS", 30)?,
            max_retries: env_number("ICX_EXPLAINER_MAX_RETRIES", 5)?,
        }))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_number<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ICX_TAX_API_KEY environment variable is required")]
    MissingApiKey,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {var}: {value:?}")]
    InvalidNumber { var: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = TaxApiConfig::local_mock(9000, "test-key").unwrap();
        assert_eq!(cfg.api_key, "test-key");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/api/gst");
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = TaxApiConfig::local_mock(9000, "super-secret").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("ICX_NONEXISTENT_VAR_12345", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn env_number_rejects_garbage() {
        std::env::set_var("ICX_TEST_BAD_NUMBER", "five");
        let result: Result<u64, _> = env_number("ICX_TEST_BAD_NUMBER", 5);
        std::env::remove_var("ICX_TEST_BAD_NUMBER");
        assert!(matches!(result, Err(ConfigError::InvalidNumber { .. })));
    }

    #[test]
    fn env_number_uses_default_when_absent() {
        let n: u32 = env_number("ICX_NONEXISTENT_NUMBER_98765", 3).unwrap();
        assert_eq!(n, 3);
    }
}
