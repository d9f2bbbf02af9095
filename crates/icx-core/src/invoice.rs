//! # Normalised Invoice
//!
//! [`InvoiceContext`] is the already-extracted, already-normalised view of
//! one invoice. The engine only reads it; extraction is someone else's job.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Declared tax regime for the supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxType {
    /// Integrated tax, levied on inter-state supply.
    #[serde(rename = "IGST", alias = "igst")]
    Igst,
    /// Central + state tax, levied on intra-state supply.
    #[serde(rename = "CGST_SGST", alias = "CGST+SGST", alias = "cgst_sgst")]
    CgstSgst,
}

/// Legal form of the counterparty, as it bears on withholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyType {
    Individual,
    Proprietor,
    Company,
    Partnership,
    Trust,
    Government,
    #[serde(other)]
    Other,
}

impl CounterpartyType {
    /// Whether the simplified withholding treatment applies.
    pub fn is_individual_or_proprietor(self) -> bool {
        matches!(self, Self::Individual | Self::Proprietor)
    }
}

/// One line of an invoice. Every field may be missing after extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub description: Option<String>,
    pub quantity: Option<Amount>,
    pub unit_rate: Option<Amount>,
    pub amount: Option<Amount>,
    /// Tariff (HSN/SAC-equivalent) classification code.
    pub tariff_code: Option<String>,
    pub igst_rate: Option<Amount>,
    pub cgst_rate: Option<Amount>,
    pub sgst_rate: Option<Amount>,
}

/// Provenance of the extracted invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceMetadata {
    pub source_file: Option<String>,
    /// Creation date of the source file, used for date consistency.
    pub file_created_date: Option<NaiveDate>,
    pub processing_time_ms: Option<u64>,
    /// Anything else the extractor chose to attach.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A normalised invoice ready for compliance evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceContext {
    /// Invoice number. Also the deduplication key within a batch.
    pub invoice_id: String,
    pub invoice_date: Option<NaiveDate>,

    pub seller_tax_id: Option<String>,
    pub buyer_tax_id: Option<String>,
    pub seller_state_code: Option<String>,
    pub buyer_state_code: Option<String>,
    pub tax_type: Option<TaxType>,
    /// Electronic registration reference (IRN-equivalent).
    pub reference_number: Option<String>,

    pub invoice_value: Option<Amount>,
    pub subtotal: Option<Amount>,
    pub taxable_amount: Option<Amount>,
    pub tax_amount: Option<Amount>,
    pub line_items: Vec<LineItem>,

    // Withholding inputs.
    pub vendor_taxpayer_id: Option<String>,
    pub vendor_type: Option<CounterpartyType>,
    pub deductor_id: Option<String>,
    pub withholding_on_tax_component: bool,

    // Policy inputs.
    pub purchase_order_amount: Option<Amount>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub vendor_approved: Option<bool>,
    pub approver_limit: Option<Amount>,

    pub metadata: InvoiceMetadata,
}

impl InvoiceContext {
    /// Minimal invoice with just an identifier; everything else absent.
    pub fn new(invoice_id: impl Into<String>) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            ..Self::default()
        }
    }

    /// Seller tax id, treating an empty or whitespace-only string as absent.
    pub fn seller_tax_id(&self) -> Option<&str> {
        non_blank(self.seller_tax_id.as_deref())
    }

    /// Reference number, treating an empty string as absent.
    pub fn reference_number(&self) -> Option<&str> {
        non_blank(self.reference_number.as_deref())
    }

    /// Vendor taxpayer id, treating an empty string as absent.
    pub fn vendor_taxpayer_id(&self) -> Option<&str> {
        non_blank(self.vendor_taxpayer_id.as_deref())
    }

    /// The counterparty shown to the explainer: seller tax id, else vendor
    /// taxpayer id.
    pub fn counterparty_id(&self) -> Option<&str> {
        self.seller_tax_id().or_else(|| self.vendor_taxpayer_id())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_sparse_invoice() {
        let json = r#"{
            "invoice_id": "INV-2024-001",
            "invoice_date": "2024-03-15",
            "seller_tax_id": "27AAPFU0939F1ZV",
            "tax_type": "IGST",
            "invoice_value": "118000.00",
            "line_items": [{"quantity": 2, "unit_rate": "50000", "amount": 100000, "tariff_code": "8471"}],
            "vendor_type": "proprietor",
            "metadata": {"source_file": "inv1.pdf", "ocr_engine": "none"}
        }"#;
        let inv: InvoiceContext = serde_json::from_str(json).unwrap();
        assert_eq!(inv.invoice_id, "INV-2024-001");
        assert_eq!(inv.tax_type, Some(TaxType::Igst));
        assert_eq!(inv.line_items.len(), 1);
        assert_eq!(inv.line_items[0].quantity, Some(Amount::from_int(2)));
        assert_eq!(inv.vendor_type, Some(CounterpartyType::Proprietor));
        assert_eq!(inv.metadata.source_file.as_deref(), Some("inv1.pdf"));
        assert_eq!(inv.metadata.extra["ocr_engine"], "none");
        assert!(inv.reference_number.is_none());
    }

    #[test]
    fn unknown_counterparty_type_maps_to_other() {
        let t: CounterpartyType = serde_json::from_str("\"huf\"").unwrap();
        assert_eq!(t, CounterpartyType::Other);
        assert!(!t.is_individual_or_proprietor());
    }

    #[test]
    fn blank_identifiers_are_absent() {
        let mut inv = InvoiceContext::new("X");
        inv.seller_tax_id = Some("  ".into());
        inv.vendor_taxpayer_id = Some("AAAPL1234C".into());
        assert!(inv.seller_tax_id().is_none());
        assert_eq!(inv.counterparty_id(), Some("AAAPL1234C"));
    }

    #[test]
    fn tax_type_accepts_plus_spelling() {
        let t: TaxType = serde_json::from_str("\"CGST+SGST\"").unwrap();
        assert_eq!(t, TaxType::CgstSgst);
    }
}
