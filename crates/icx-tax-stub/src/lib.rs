//! Tax-validation API stub server.
//!
//! Serves the five endpoints that `icx_client::TaxApiClient` calls, answered
//! by a [`StaticTaxAuthority`] loaded from a vendor registry. Response
//! bodies are exactly what the in-process authority returns, so an engine
//! run against this server and one run with `--offline` decide alike.
//!
//! Storage is in-memory with no persistence.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use icx_client::{ApiResponse, StaticTaxAuthority};
use icx_core::Amount;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

/// Shared router state.
#[derive(Debug, Clone)]
pub struct AppState {
    authority: Arc<StaticTaxAuthority>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    /// State answering from `authority`. With `api_key` set, every
    /// `/api/gst` request must carry it in `X-API-Key`.
    pub fn new(authority: StaticTaxAuthority, api_key: Option<String>) -> Self {
        Self {
            authority: Arc::new(authority),
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }

    pub fn vendor_count(&self) -> usize {
        self.authority.vendor_count()
    }
}

/// Build the complete router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/validate-gstin", post(validate_gstin))
        .route("/validate-irn", post(validate_irn))
        .route("/hsn-rate", get(hsn_rate))
        .route("/e-invoice-required", post(e_invoice_required))
        .route("/verify-206ab", post(verify_206ab))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .nest("/api/gst", api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Middleware ──────────────────────────────────────────────────────

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.api_key {
        let presented = request.headers().get("x-api-key").and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_ref()) {
            tracing::warn!(path = %request.uri().path(), "rejected request without valid API key");
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "UNAUTHORIZED"}))).into_response();
        }
    }
    next.run(request).await
}

// ── Handlers ────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "vendors": state.vendor_count()}))
}

#[derive(Debug, Deserialize)]
struct GstinRequest {
    #[serde(default)]
    gstin: String,
}

async fn validate_gstin(State(state): State<AppState>, Json(req): Json<GstinRequest>) -> Response {
    reply(state.authority.lookup_tax_id(&req.gstin))
}

#[derive(Debug, Deserialize)]
struct IrnRequest {
    #[serde(default)]
    irn: String,
}

async fn validate_irn(State(state): State<AppState>, Json(req): Json<IrnRequest>) -> Response {
    reply(state.authority.lookup_reference(&req.irn))
}

#[derive(Debug, Deserialize)]
struct HsnQuery {
    code: String,
    date: NaiveDate,
}

async fn hsn_rate(State(state): State<AppState>, Query(q): Query<HsnQuery>) -> Response {
    reply(state.authority.lookup_tariff_rate(&q.code, &q.date.to_string()))
}

/// Only the value decides; seller and date are accepted and ignored.
#[derive(Debug, Deserialize)]
struct EInvoiceRequest {
    invoice_value: Amount,
}

async fn e_invoice_required(State(state): State<AppState>, Json(req): Json<EInvoiceRequest>) -> Response {
    reply(state.authority.lookup_e_invoice(&req.invoice_value))
}

#[derive(Debug, Deserialize)]
struct PanRequest {
    #[serde(default)]
    pan: String,
}

async fn verify_206ab(State(state): State<AppState>, Json(req): Json<PanRequest>) -> Response {
    reply(state.authority.lookup_special_withholding(&req.pan))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "NOT_FOUND"}))).into_response()
}

fn reply(resp: ApiResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(resp.body)).into_response()
}
