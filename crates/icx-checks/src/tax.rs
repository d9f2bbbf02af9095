//! Stateless tax-compliance rules.
//!
//! These run after the authority lookups in the fail-fast chain. They read
//! only the invoice and never call out.

use icx_core::check_ids;
use icx_core::{Amount, CheckCategory, InvoiceContext, TaxRules, TaxType, ValidationResult};
use serde_json::json;

use crate::{missing_data, CheckError, RuleCheck};

const CATEGORY: CheckCategory = CheckCategory::TaxCompliance;

/// Whether `id` has the 15-character registration layout:
/// 2 digits, 5 letters, 4 digits, 1 letter, 1 entity code (`1-9A-Z`), a
/// literal `Z`, and a check character (`0-9A-Z`).
pub fn is_valid_tax_id(id: &str) -> bool {
    let b = id.as_bytes();
    if b.len() != 15 {
        return false;
    }
    let digit = |c: u8| c.is_ascii_digit();
    let upper = |c: u8| c.is_ascii_uppercase();
    b[..2].iter().all(|&c| digit(c))
        && b[2..7].iter().all(|&c| upper(c))
        && b[7..11].iter().all(|&c| digit(c))
        && upper(b[11])
        && (upper(b[12]) || (b'1'..=b'9').contains(&b[12]))
        && b[13] == b'Z'
        && (upper(b[14]) || digit(b[14]))
}

/// Seller tax id is present and well formed. Absence is a FAIL: the id is
/// mandatory for document integrity.
#[derive(Debug, Default)]
pub struct TaxIdFormat;

impl RuleCheck for TaxIdFormat {
    fn id(&self) -> &'static str {
        check_ids::TAX_ID_FORMAT
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Seller tax id format"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        match invoice.seller_tax_id() {
            Some(id) if is_valid_tax_id(id) => Ok(ValidationResult::pass(self.id(), CATEGORY)),
            _ => Ok(ValidationResult::fail(self.id(), CATEGORY, "Invalid GSTIN format", 0.10)),
        }
    }
}

/// The tax id's two-digit prefix names the seller's state.
#[derive(Debug)]
pub struct StateCodeMatch {
    missing_impact: f64,
}

impl StateCodeMatch {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for StateCodeMatch {
    fn id(&self) -> &'static str {
        check_ids::TAX_STATE_CODE
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Tax id state code matches seller state"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let state = invoice.seller_state_code.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let (Some(id), Some(state)) = (invoice.seller_tax_id(), state) else {
            return Ok(missing_data(self, self.missing_impact, "seller state data"));
        };
        if id.get(..2) != Some(state) {
            return Ok(ValidationResult::fail(
                self.id(),
                CATEGORY,
                "GSTIN state code mismatch with address",
                0.15,
            )
            .with_metadata("tax_id_prefix", json!(id.get(..2)))
            .with_metadata("seller_state_code", json!(state)));
        }
        Ok(ValidationResult::pass(self.id(), CATEGORY))
    }
}

/// Inter-state supply must use IGST; intra-state supply must not.
#[derive(Debug)]
pub struct SupplyType {
    missing_impact: f64,
}

impl SupplyType {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for SupplyType {
    fn id(&self) -> &'static str {
        check_ids::TAX_SUPPLY_TYPE
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Inter/intra-state tax type correctness"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let (Some(seller), Some(buyer), Some(tax_type)) = (
            invoice.seller_state_code.as_deref(),
            invoice.buyer_state_code.as_deref(),
            invoice.tax_type,
        ) else {
            return Ok(missing_data(self, self.missing_impact, "seller state, buyer state or tax type"));
        };
        let inter_state = seller.trim() != buyer.trim();
        match (inter_state, tax_type) {
            (true, TaxType::CgstSgst) => Ok(ValidationResult::fail(
                self.id(),
                CATEGORY,
                "Inter-state supply without IGST",
                0.10,
            )),
            (false, TaxType::Igst) => Ok(ValidationResult::fail(
                self.id(),
                CATEGORY,
                "Intra-state supply with IGST",
                0.10,
            )),
            _ => Ok(ValidationResult::pass(self.id(), CATEGORY)),
        }
    }
}

/// High-value invoice without an electronic reference needs review.
#[derive(Debug)]
pub struct EInvoiceThreshold {
    threshold: Amount,
    missing_impact: f64,
}

impl EInvoiceThreshold {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            threshold: rules.e_invoice_threshold.clone(),
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for EInvoiceThreshold {
    fn id(&self) -> &'static str {
        check_ids::TAX_E_INVOICE_THRESHOLD
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Invoice value threshold for e-invoicing"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let Some(value) = &invoice.invoice_value else {
            return Ok(missing_data(self, self.missing_impact, "invoice value"));
        };
        if *value >= self.threshold && invoice.reference_number().is_none() {
            return Ok(ValidationResult::review(
                self.id(),
                CATEGORY,
                "Invoice value above threshold but IRN missing",
                0.10,
            )
            .with_metadata("threshold", json!(self.threshold)));
        }
        Ok(ValidationResult::pass(self.id(), CATEGORY))
    }
}
