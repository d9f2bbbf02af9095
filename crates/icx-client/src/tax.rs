//! HTTP client for the tax-validation API.
//!
//! ## Endpoints
//!
//! | Method | Path                  | Operation                |
//! |--------|-----------------------|--------------------------|
//! | POST   | `validate-gstin`      | [`TaxApiClient::validate_tax_id`] |
//! | POST   | `validate-irn`        | [`TaxApiClient::validate_reference`] |
//! | GET    | `hsn-rate?code=&date=`| [`TaxApiClient::tariff_rate`] |
//! | POST   | `e-invoice-required`  | [`TaxApiClient::e_invoice_required`] |
//! | POST   | `verify-206ab`        | [`TaxApiClient::special_withholding`] |
//!
//! Paths are relative to the configured base URL.
//!
//! ## Failure encoding
//!
//! Non-2xx answers are returned untouched. A body that is not JSON becomes
//! `{"error": "Invalid JSON response", "valid": false}`. Transport failures
//! and per-attempt timeouts become status 500 with an `error` message plus
//! the operation's default fields. Only an exhausted 429 budget surfaces as
//! `Err(TaxApiError::RateLimited)`.
//!
//! Every `Ok` answer is cached under a key built from all call parameters.
//! Concurrent identical lookups share one request: the first caller sends,
//! the rest wait on its answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use icx_core::Amount;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::authority::TaxAuthority;
use crate::cache::TtlCache;
use crate::config::TaxApiConfig;
use crate::error::TaxApiError;
use crate::retry::{send_honoring_rate_limit, RateLimitPolicy};
use crate::types::ApiResponse;

const VALIDATE_GSTIN: &str = "validate-gstin";
const VALIDATE_IRN: &str = "validate-irn";
const HSN_RATE: &str = "hsn-rate";
const E_INVOICE_REQUIRED: &str = "e-invoice-required";
const VERIFY_206AB: &str = "verify-206ab";

/// Cache keys. Each includes every parameter that distinguishes a call.
pub mod cache_key {
    use chrono::NaiveDate;
    use icx_core::Amount;

    pub fn tax_id(tax_id: &str) -> String {
        format!("gstin:{tax_id}")
    }

    pub fn reference(reference: &str) -> String {
        format!("irn:{reference}")
    }

    pub fn tariff_rate(code: &str, date: NaiveDate) -> String {
        format!("hsn:{code}:{date}")
    }

    pub fn e_invoice(tax_id: &str, date: NaiveDate, value: &Amount) -> String {
        format!("einv:{tax_id}:{date}:{}", value.canonical_string())
    }

    pub fn special_withholding(taxpayer_id: &str) -> String {
        format!("206ab:{taxpayer_id}")
    }
}

/// Client for the tax-validation API. Owns its response cache.
///
/// Share one instance across workers via `Arc`.
#[derive(Debug)]
pub struct TaxApiClient {
    http: reqwest::Client,
    base_url: String,
    policy: RateLimitPolicy,
    cache: TtlCache,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<ApiResponse>>>>,
}

impl TaxApiClient {
    /// Create a new client from configuration.
    pub fn new(config: &TaxApiConfig) -> Result<Self, TaxApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-API-Key",
            HeaderValue::from_str(&config.api_key)
                .map_err(|_| TaxApiError::Config("invalid API key characters".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| TaxApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            policy: RateLimitPolicy {
                max_retries: config.max_retries,
                max_wait: config.max_retry_wait(),
                timeout: config.timeout(),
            },
            cache: TtlCache::new(config.cache_ttl()),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// The response cache, for inspection.
    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Per-attempt request timeout.
    pub fn timeout(&self) -> Duration {
        self.policy.timeout
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    pub async fn validate_tax_id(&self, tax_id: &str) -> Result<ApiResponse, TaxApiError> {
        let url = self.url(VALIDATE_GSTIN);
        let payload = json!({"gstin": tax_id});
        self.cached(
            cache_key::tax_id(tax_id),
            VALIDATE_GSTIN,
            json!({"valid": false}),
            || self.http.post(&url).json(&payload).send(),
        )
        .await
    }

    pub async fn validate_reference(&self, reference: &str) -> Result<ApiResponse, TaxApiError> {
        let url = self.url(VALIDATE_IRN);
        let payload = json!({"irn": reference});
        self.cached(
            cache_key::reference(reference),
            VALIDATE_IRN,
            json!({"valid": false}),
            || self.http.post(&url).json(&payload).send(),
        )
        .await
    }

    pub async fn tariff_rate(&self, code: &str, date: NaiveDate) -> Result<ApiResponse, TaxApiError> {
        let url = self.url(HSN_RATE);
        let date_text = date.to_string();
        self.cached(
            cache_key::tariff_rate(code, date),
            HSN_RATE,
            json!({"rate": {}}),
            || {
                self.http
                    .get(&url)
                    .query(&[("code", code), ("date", date_text.as_str())])
                    .send()
            },
        )
        .await
    }

    pub async fn e_invoice_required(
        &self,
        tax_id: &str,
        date: NaiveDate,
        value: &Amount,
    ) -> Result<ApiResponse, TaxApiError> {
        let url = self.url(E_INVOICE_REQUIRED);
        let payload = json!({
            "seller_gstin": tax_id,
            "invoice_date": date.to_string(),
            "invoice_value": value.to_json_number(),
        });
        self.cached(
            cache_key::e_invoice(tax_id, date, value),
            E_INVOICE_REQUIRED,
            json!({"required": false}),
            || self.http.post(&url).json(&payload).send(),
        )
        .await
    }

    pub async fn special_withholding(&self, taxpayer_id: &str) -> Result<ApiResponse, TaxApiError> {
        let url = self.url(VERIFY_206AB);
        let payload = json!({"pan": taxpayer_id});
        self.cached(
            cache_key::special_withholding(taxpayer_id),
            VERIFY_206AB,
            json!({"section_206ab_applicable": false}),
            || self.http.post(&url).json(&payload).send(),
        )
        .await
    }

    /// Serve from cache, or join the in-flight request for `key`, or send.
    ///
    /// The in-flight map lock is never held across an `.await`.
    async fn cached<F, Fut>(
        &self,
        key: String,
        endpoint: &'static str,
        defaults: Value,
        send: F,
    ) -> Result<ApiResponse, TaxApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, status = hit.status, "tax API cache hit");
            return Ok(hit);
        }

        let flight = Arc::clone(self.in_flight.lock().entry(key.clone()).or_default());
        let result = flight
            .get_or_try_init(|| self.fetch(&key, endpoint, &defaults, send))
            .await
            .cloned();

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&key).is_some_and(|f| Arc::ptr_eq(f, &flight)) {
            in_flight.remove(&key);
        }
        result
    }

    /// Send, encode and cache one answer. A rate-limit failure is not cached.
    async fn fetch<F, Fut>(
        &self,
        key: &str,
        endpoint: &'static str,
        defaults: &Value,
        send: F,
    ) -> Result<ApiResponse, TaxApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        // A flight that finished between our miss and our join has cached.
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit);
        }

        let resp = match send_honoring_rate_limit(endpoint, self.policy, send).await {
            Ok(resp) => read_response(resp, defaults).await,
            Err(e @ TaxApiError::RateLimited { .. }) => {
                tracing::warn!(endpoint, "{e}");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(endpoint, "tax API transport failure: {e}");
                ApiResponse::transport_failure(e.to_string(), defaults)
            }
        };

        self.cache.insert(key.to_string(), resp.clone());
        Ok(resp)
    }
}

/// Decode a response body, tolerating non-JSON answers.
async fn read_response(resp: reqwest::Response, defaults: &Value) -> ApiResponse {
    let status = resp.status().as_u16();
    match resp.text().await {
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Ok(body) => ApiResponse::new(status, body),
            Err(_) => ApiResponse::new(
                status,
                json!({"error": "Invalid JSON response", "valid": false}),
            ),
        },
        Err(e) => ApiResponse::transport_failure(format!("failed to read response body: {e}"), defaults),
    }
}

#[async_trait]
impl TaxAuthority for TaxApiClient {
    async fn validate_tax_id(&self, tax_id: &str) -> Result<ApiResponse, TaxApiError> {
        TaxApiClient::validate_tax_id(self, tax_id).await
    }

    async fn validate_reference(&self, reference: &str) -> Result<ApiResponse, TaxApiError> {
        TaxApiClient::validate_reference(self, reference).await
    }

    async fn tariff_rate(&self, code: &str, date: NaiveDate) -> Result<ApiResponse, TaxApiError> {
        TaxApiClient::tariff_rate(self, code, date).await
    }

    async fn e_invoice_required(
        &self,
        tax_id: &str,
        date: NaiveDate,
        value: &Amount,
    ) -> Result<ApiResponse, TaxApiError> {
        TaxApiClient::e_invoice_required(self, tax_id, date, value).await
    }

    async fn special_withholding(&self, taxpayer_id: &str) -> Result<ApiResponse, TaxApiError> {
        TaxApiClient::special_withholding(self, taxpayer_id).await
    }
}
