//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use icx_client::{ApiResponse, ExplainContext, ExplainError, Explainer, StaticTaxAuthority, TaxApiError, TaxAuthority, VendorRegistry};
use icx_core::{Amount, CounterpartyType, InvoiceContext, LineItem, TaxType};
use parking_lot::Mutex;
use serde_json::json;

pub const SELLER: &str = "27AAPFU0939F1ZV";

fn amt(s: &str) -> Option<Amount> {
    Some(Amount::parse(s).unwrap())
}

/// An intra-state invoice on which every check passes or skips.
pub fn clean_invoice(id: &str) -> InvoiceContext {
    let mut inv = InvoiceContext::new(id);
    inv.invoice_date = NaiveDate::from_ymd_opt(2024, 6, 15);
    inv.seller_tax_id = Some(SELLER.into());
    inv.buyer_tax_id = Some("27AAACB1234C1Z5".into());
    inv.seller_state_code = Some("27".into());
    inv.buyer_state_code = Some("27".into());
    inv.tax_type = Some(TaxType::CgstSgst);
    inv.invoice_value = amt("118000");
    inv.subtotal = amt("100000");
    inv.taxable_amount = amt("100000");
    inv.tax_amount = amt("18000");
    inv.line_items = vec![LineItem {
        description: Some("Consulting".into()),
        quantity: amt("10"),
        unit_rate: amt("10000"),
        amount: amt("100000"),
        tariff_code: Some("998311".into()),
        cgst_rate: amt("9"),
        sgst_rate: amt("9"),
        ..LineItem::default()
    }];
    inv.vendor_taxpayer_id = Some("AAPFU0939F".into());
    inv.vendor_type = Some(CounterpartyType::Individual);
    inv.deductor_id = Some("MUMA12345B".into());
    inv.vendor_approved = Some(true);
    inv.approver_limit = amt("200000");
    inv.metadata.source_file = Some(format!("{id}.json"));
    inv
}

/// How a scripted lookup should answer instead of the static registry.
#[derive(Clone)]
pub enum Script {
    Respond(ApiResponse),
    RateLimited,
    Panic,
    Stall(Duration),
}

/// Static authority with per-operation overrides and call counters.
pub struct ScriptedAuthority {
    inner: StaticTaxAuthority,
    tax_id: Mutex<HashMap<String, Script>>,
    pub tax_id_calls: AtomicUsize,
    pub tariff_calls: AtomicUsize,
    pub e_invoice_calls: AtomicUsize,
    pub special_calls: AtomicUsize,
}

impl ScriptedAuthority {
    pub fn new() -> Self {
        let inner = StaticTaxAuthority::new(VendorRegistry::default()).with_vendor(SELLER, "Acme Consulting LLP", "27");
        Self {
            inner,
            tax_id: Mutex::new(HashMap::new()),
            tax_id_calls: AtomicUsize::new(0),
            tariff_calls: AtomicUsize::new(0),
            e_invoice_calls: AtomicUsize::new(0),
            special_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_inner(mut self, inner: StaticTaxAuthority) -> Self {
        self.inner = inner;
        self
    }

    pub fn script_tax_id(self, tax_id: &str, script: Script) -> Self {
        self.tax_id.lock().insert(tax_id.to_string(), script);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl TaxAuthority for ScriptedAuthority {
    async fn validate_tax_id(&self, tax_id: &str) -> Result<ApiResponse, TaxApiError> {
        self.tax_id_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.tax_id.lock().get(tax_id).cloned();
        match script {
            None => self.inner.validate_tax_id(tax_id).await,
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::RateLimited) => Err(TaxApiError::RateLimited {
                endpoint: "/validate-gstin".into(),
                attempts: 4,
            }),
            Some(Script::Panic) => panic!("scripted authority failure for {tax_id}"),
            Some(Script::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                self.inner.validate_tax_id(tax_id).await
            }
        }
    }

    async fn validate_reference(&self, reference: &str) -> Result<ApiResponse, TaxApiError> {
        self.inner.validate_reference(reference).await
    }

    async fn tariff_rate(&self, code: &str, date: NaiveDate) -> Result<ApiResponse, TaxApiError> {
        self.tariff_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.tariff_rate(code, date).await
    }

    async fn e_invoice_required(&self, tax_id: &str, date: NaiveDate, value: &Amount) -> Result<ApiResponse, TaxApiError> {
        self.e_invoice_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.e_invoice_required(tax_id, date, value).await
    }

    async fn special_withholding(&self, taxpayer_id: &str) -> Result<ApiResponse, TaxApiError> {
        self.special_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.special_withholding(taxpayer_id).await
    }
}

pub fn not_found() -> Script {
    Script::Respond(ApiResponse::new(
        404,
        json!({"valid": false, "error": "NOT_FOUND", "message": "GSTIN not registered"}),
    ))
}

pub fn server_error() -> Script {
    Script::Respond(ApiResponse::transport_failure("connection refused", &json!({"valid": false})))
}

/// Explainer that records every request.
#[derive(Default)]
pub struct RecordingExplainer {
    pub requests: Mutex<Vec<(ExplainContext, Vec<String>)>>,
    pub fail: bool,
}

#[async_trait]
impl Explainer for RecordingExplainer {
    async fn explain(&self, context: &ExplainContext, conflicts: &[String]) -> Result<String, ExplainError> {
        self.requests.lock().push((context.clone(), conflicts.to_vec()));
        if self.fail {
            return Err(ExplainError::MissingResponse);
        }
        Ok("- The registration lookup failed\n- Both readings are possible".into())
    }
}
