//! Retry logic for outbound HTTP calls.
//!
//! Two policies live here:
//!
//! - [`send_honoring_rate_limit`] retries only on HTTP 429, sleeping for the
//!   server's `Retry-After` hint. Transport failures and timeouts are
//!   returned immediately; they are not retry triggers.
//! - [`retry_send`] retries only on transport failures with exponential
//!   backoff. Used by the explainer, whose budget is the only bound on its
//!   latency.

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::TaxApiError;

/// Wait applied when a 429 carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Base delay between transport retries (doubles each attempt: 200ms, 400ms, 800ms, ...).
const BASE_DELAY_MS: u64 = 200;

/// Bounds for [`send_honoring_rate_limit`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Cap on any single server-requested wait.
    pub max_wait: Duration,
    /// Per-attempt timeout, reported in [`TaxApiError::Timeout`].
    pub timeout: Duration,
}

/// Send a request, retrying on HTTP 429 up to `policy.max_retries` times.
///
/// The closure `f` is called at most `max_retries + 1` times. Any non-429
/// response is returned as-is for the caller to interpret. A transport
/// failure ends the loop immediately.
pub(crate) async fn send_honoring_rate_limit<F, Fut>(
    endpoint: &str,
    policy: RateLimitPolicy,
    f: F,
) -> Result<reqwest::Response, TaxApiError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let attempts = policy.max_retries + 1;
    for attempt in 1..=attempts {
        let resp = f().await.map_err(|e| transport_error(endpoint, policy.timeout, e))?;
        if resp.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(resp);
        }
        if attempt == attempts {
            break;
        }
        let wait = retry_after(resp.headers()).min(policy.max_wait);
        tracing::warn!(
            endpoint,
            attempt,
            max_retries = policy.max_retries,
            "tax API rate limited, retrying in {wait:?}"
        );
        tokio::time::sleep(wait).await;
    }
    Err(TaxApiError::RateLimited {
        endpoint: endpoint.to_string(),
        attempts,
    })
}

/// Send an HTTP request with exponential backoff retry on transport errors.
///
/// The closure `f` is called up to `max_retries + 1` times. Only
/// [`reqwest::Error`] transport failures trigger a retry; the caller is
/// responsible for inspecting the response status code.
pub(crate) async fn retry_send<F, Fut>(
    max_retries: u32,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..max_retries {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt.min(16)));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    "explainer request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    // Final attempt, no more retries.
    f().await
}

/// Parse `Retry-After` as whole seconds. Missing or unparseable values
/// (including the HTTP-date form) fall back to [`DEFAULT_RETRY_AFTER`].
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn transport_error(endpoint: &str, timeout: Duration, e: reqwest::Error) -> TaxApiError {
    if e.is_timeout() {
        TaxApiError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_secs: timeout.as_secs(),
        }
    } else {
        TaxApiError::Transport {
            endpoint: endpoint.to_string(),
            source: e,
        }
    }
}
