//! Error types for the tax-validation and explainer clients.

/// Errors from the tax-validation API client.
///
/// Ordinary non-2xx responses are *not* errors: they are returned as an
/// [`crate::ApiResponse`] for the caller to interpret. Transport failures
/// are folded into a status-500 response by the public lookup methods.
/// What remains here is the failure classes a caller must be able to tell
/// apart from data.
#[derive(Debug, thiserror::Error)]
pub enum TaxApiError {
    /// Connection, TLS or body-read failure talking to the API.
    #[error("tax API request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The per-attempt timeout elapsed.
    #[error("tax API request to {endpoint} timed out after {timeout_secs}s")]
    Timeout { endpoint: String, timeout_secs: u64 },

    /// The server kept answering 429 after every permitted retry.
    #[error("tax API rate limit exceeded for {endpoint} after {attempts} attempts")]
    RateLimited { endpoint: String, attempts: u32 },

    /// The client could not be constructed.
    #[error("tax API client configuration error: {0}")]
    Config(String),
}

impl TaxApiError {
    /// Whether the error is a rate-limit exhaustion rather than a
    /// transport problem.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Errors from the explainer client.
#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("explainer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("explainer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("explainer response missing the `response` field")]
    MissingResponse,

    #[error("explainer client configuration error: {0}")]
    Config(String),
}

/// Failure to load a vendor registry file.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read vendor registry {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse vendor registry: {0}")]
    Json(#[from] serde_json::Error),
}
