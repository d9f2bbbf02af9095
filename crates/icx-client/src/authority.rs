//! # Tax Authority Adapter
//!
//! The [`TaxAuthority`] trait is the seam between the compliance engine and
//! whatever answers the five tax lookups. Implementations:
//!
//! - [`crate::TaxApiClient`]: the real HTTP client (retry, timeout, cache).
//! - [`StaticTaxAuthority`]: deterministic, in-process answers from a
//!   vendor registry. Backs the offline CLI mode, the stub server and tests.
//!
//! The trait is object-safe (`Arc<dyn TaxAuthority>`) and `Send + Sync` so
//! a single instance is shared by every worker of a batch.
//!
//! Every method returns `Ok` for anything the server said, including 4xx
//! and 5xx answers and transport failures (encoded as status 500). `Err`
//! is reserved for failures the caller must distinguish from data, such
//! as an exhausted rate-limit budget.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use icx_core::Amount;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{RegistryError, TaxApiError};
use crate::types::ApiResponse;

/// Invoice value above which the static authority reports an e-invoice
/// obligation.
pub const E_INVOICE_THRESHOLD: i64 = 500_000;

/// Tax-authority lookups used by the compliance engine.
#[async_trait]
pub trait TaxAuthority: Send + Sync {
    /// Registration status of a tax id.
    async fn validate_tax_id(&self, tax_id: &str) -> Result<ApiResponse, TaxApiError>;

    /// Whether an electronic invoice reference is registered and active.
    async fn validate_reference(&self, reference: &str) -> Result<ApiResponse, TaxApiError>;

    /// Statutory rates for a tariff code as of a date. The body carries
    /// `rate.igst` / `rate.cgst` / `rate.sgst`.
    async fn tariff_rate(&self, code: &str, date: NaiveDate) -> Result<ApiResponse, TaxApiError>;

    /// Whether an electronic reference is mandatory for this seller, date
    /// and declared value. The body carries `required`.
    async fn e_invoice_required(
        &self,
        tax_id: &str,
        date: NaiveDate,
        value: &Amount,
    ) -> Result<ApiResponse, TaxApiError>;

    /// Whether the special (higher) withholding rate applies to a
    /// taxpayer. The body carries `section_206ab_applicable`.
    async fn special_withholding(&self, taxpayer_id: &str) -> Result<ApiResponse, TaxApiError>;
}

// ---------------------------------------------------------------------------
// Vendor registry
// ---------------------------------------------------------------------------

/// One registered vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRecord {
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub legal_name: String,
    /// Registration status, e.g. `ACTIVE`, `SUSPENDED`, `CANCELLED`.
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub state_code: String,
    #[serde(default)]
    pub gst_filing_status: Option<String>,
}

fn default_status() -> String {
    "ACTIVE".to_string()
}

/// Registry file layout: `{"vendors": [...], "special_withholding": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorRegistry {
    #[serde(default)]
    pub vendors: Vec<VendorRecord>,
    /// Taxpayer ids subject to the special withholding rate.
    #[serde(default)]
    pub special_withholding: Vec<String>,
}

impl VendorRegistry {
    pub fn from_json_str(text: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

// ---------------------------------------------------------------------------
// StaticTaxAuthority
// ---------------------------------------------------------------------------

/// Deterministic in-process tax authority.
///
/// - Tax ids must be 15 ASCII alphanumerics (400 `INVALID_FORMAT`) and
///   registered (404 `NOT_FOUND`).
/// - References shorter than 10 characters are unknown (404).
/// - Every tariff code maps to 9 % + 9 % intra-state or 18 % inter-state.
/// - E-invoicing is required above [`E_INVOICE_THRESHOLD`].
/// - Special withholding applies only to listed taxpayer ids.
#[derive(Debug, Clone, Default)]
pub struct StaticTaxAuthority {
    vendors: HashMap<String, VendorRecord>,
    special_withholding: HashSet<String>,
}

impl StaticTaxAuthority {
    pub fn new(registry: VendorRegistry) -> Self {
        let vendors = registry
            .vendors
            .into_iter()
            .filter_map(|v| {
                let key = v.gstin.as_deref()?.trim().to_ascii_uppercase();
                (!key.is_empty()).then_some((key, v))
            })
            .collect();
        let special_withholding = registry
            .special_withholding
            .into_iter()
            .map(|id| id.trim().to_ascii_uppercase())
            .collect();
        Self {
            vendors,
            special_withholding,
        }
    }

    /// Register one active vendor.
    pub fn with_vendor(mut self, gstin: &str, legal_name: &str, state_code: &str) -> Self {
        self.insert_vendor(gstin, legal_name, state_code, "ACTIVE");
        self
    }

    /// Register one vendor with an explicit registration status.
    pub fn with_vendor_status(mut self, gstin: &str, status: &str) -> Self {
        let state_code = gstin.get(..2).unwrap_or_default().to_string();
        self.insert_vendor(gstin, "", &state_code, status);
        self
    }

    /// Mark a taxpayer id as subject to special withholding.
    pub fn with_special_withholding(mut self, taxpayer_id: &str) -> Self {
        self.special_withholding
            .insert(taxpayer_id.trim().to_ascii_uppercase());
        self
    }

    pub fn vendor_count(&self) -> usize {
        self.vendors.len()
    }

    fn insert_vendor(&mut self, gstin: &str, legal_name: &str, state_code: &str, status: &str) {
        let key = gstin.trim().to_ascii_uppercase();
        self.vendors.insert(
            key.clone(),
            VendorRecord {
                gstin: Some(key),
                legal_name: legal_name.to_string(),
                status: status.to_string(),
                state_code: state_code.to_string(),
                gst_filing_status: None,
            },
        );
    }

    /// Answer a registration lookup. Shared with the stub server.
    pub fn lookup_tax_id(&self, tax_id: &str) -> ApiResponse {
        let gstin = tax_id.trim().to_ascii_uppercase();
        if gstin.len() != 15 || !gstin.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return ApiResponse::new(
                400,
                json!({
                    "valid": false,
                    "error": "INVALID_FORMAT",
                    "message": "GSTIN must be 15 characters alphanumeric",
                }),
            );
        }
        match self.vendors.get(&gstin) {
            None => ApiResponse::new(
                404,
                json!({
                    "valid": false,
                    "error": "NOT_FOUND",
                    "message": "GSTIN not registered",
                }),
            ),
            Some(vendor) => ApiResponse::new(
                200,
                json!({
                    "valid": true,
                    "gstin": gstin,
                    "legal_name": vendor.legal_name,
                    "status": vendor.status,
                    "state_code": vendor.state_code,
                    "taxpayer_type": vendor.gst_filing_status.as_deref().unwrap_or("Regular"),
                }),
            ),
        }
    }

    pub fn lookup_reference(&self, reference: &str) -> ApiResponse {
        if reference.chars().count() < 10 {
            return ApiResponse::new(404, json!({"valid": false, "error": "IRN_NOT_FOUND"}));
        }
        ApiResponse::new(200, json!({"valid": true, "status": "ACTIVE"}))
    }

    pub fn lookup_tariff_rate(&self, code: &str, date: &str) -> ApiResponse {
        ApiResponse::new(
            200,
            json!({
                "hsn_sac": code,
                "rate": {"cgst": 9, "sgst": 9, "igst": 18},
                "effective_from": "2017-07-01",
                "requested_date": date,
            }),
        )
    }

    pub fn lookup_e_invoice(&self, value: &Amount) -> ApiResponse {
        ApiResponse::new(
            200,
            json!({
                "required": *value > Amount::from_int(E_INVOICE_THRESHOLD),
                "threshold": E_INVOICE_THRESHOLD,
            }),
        )
    }

    pub fn lookup_special_withholding(&self, taxpayer_id: &str) -> ApiResponse {
        let applicable = self
            .special_withholding
            .contains(&taxpayer_id.trim().to_ascii_uppercase());
        ApiResponse::new(200, json!({"section_206ab_applicable": applicable}))
    }
}

#[async_trait]
impl TaxAuthority for StaticTaxAuthority {
    async fn validate_tax_id(&self, tax_id: &str) -> Result<ApiResponse, TaxApiError> {
        Ok(self.lookup_tax_id(tax_id))
    }

    async fn validate_reference(&self, reference: &str) -> Result<ApiResponse, TaxApiError> {
        Ok(self.lookup_reference(reference))
    }

    async fn tariff_rate(&self, code: &str, date: NaiveDate) -> Result<ApiResponse, TaxApiError> {
        Ok(self.lookup_tariff_rate(code, &date.to_string()))
    }

    async fn e_invoice_required(
        &self,
        _tax_id: &str,
        _date: NaiveDate,
        value: &Amount,
    ) -> Result<ApiResponse, TaxApiError> {
        Ok(self.lookup_e_invoice(value))
    }

    async fn special_withholding(&self, taxpayer_id: &str) -> Result<ApiResponse, TaxApiError> {
        Ok(self.lookup_special_withholding(taxpayer_id))
    }
}
