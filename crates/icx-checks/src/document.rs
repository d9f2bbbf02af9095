//! Document-authenticity checks.
//!
//! [`DuplicateInvoice`] and [`InvoiceSequence`] settle their verdicts in
//! [`RuleCheck::prepare`] and keep them behind a `parking_lot::Mutex` until
//! each invoice is evaluated. The lock is held only for the map access.

use std::cmp::Ordering;
use std::collections::HashMap;

use icx_core::check_ids;
use icx_core::{CheckCategory, InvoiceContext, TaxRules, ValidationResult};
use parking_lot::Mutex;
use serde_json::json;

use crate::{missing_data, BatchView, CheckError, RuleCheck};

const NOT_PREPARED: &str = "Invoice not part of the prepared batch";

const CATEGORY: CheckCategory = CheckCategory::DocumentAuthenticity;

// ---------------------------------------------------------------------------
// Reference format
// ---------------------------------------------------------------------------

/// Invoice number consists only of `A-Z`, `0-9`, `-` and `/`.
#[derive(Debug, Default)]
pub struct InvoiceNumberFormat;

impl InvoiceNumberFormat {
    fn is_well_formed(number: &str) -> bool {
        !number.is_empty()
            && number
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'/')
    }
}

impl RuleCheck for InvoiceNumberFormat {
    fn id(&self) -> &'static str {
        check_ids::DOCUMENT_REFERENCE_FORMAT
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Invoice number format"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        if Self::is_well_formed(&invoice.invoice_id) {
            return Ok(ValidationResult::pass(self.id(), CATEGORY));
        }
        Ok(ValidationResult::fail(self.id(), CATEGORY, "Invalid invoice number format", 0.10)
            .with_metadata("invoice_number", json!(invoice.invoice_id)))
    }
}

// ---------------------------------------------------------------------------
// Duplicate detection
// ---------------------------------------------------------------------------

/// FAIL when an earlier run already recorded a decision for this invoice.
///
/// Repeats inside one batch never reach the checks; the engine keeps the
/// first occurrence of each identifier. REVIEW when the decision history
/// could not be read.
#[derive(Debug)]
pub struct DuplicateInvoice {
    history: Mutex<HashMap<String, History>>,
    missing_impact: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum History {
    New,
    Decided,
    Unavailable,
}

impl DuplicateInvoice {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for DuplicateInvoice {
    fn id(&self) -> &'static str {
        check_ids::DOCUMENT_DUPLICATE
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Duplicate invoice detection"
    }

    fn prepare(&self, batch: &BatchView<'_>) {
        let history = batch
            .invoices
            .iter()
            .map(|invoice| {
                let seen = match batch.previously_decided {
                    None => History::Unavailable,
                    Some(decided) if decided.contains(&invoice.invoice_id) => History::Decided,
                    Some(_) => History::New,
                };
                (invoice.invoice_id.clone(), seen)
            })
            .collect();
        *self.history.lock() = history;
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let seen = self.history.lock().get(&invoice.invoice_id).copied();
        match seen {
            Some(History::New) => Ok(ValidationResult::pass(self.id(), CATEGORY)),
            Some(History::Decided) => {
                tracing::debug!(invoice_id = %invoice.invoice_id, "invoice decided by an earlier run");
                Ok(ValidationResult::fail(self.id(), CATEGORY, "Duplicate invoice detected", 0.30)
                    .with_metadata("previously_decided", json!(true)))
            }
            Some(History::Unavailable) => Ok(missing_data(self, self.missing_impact, "decision history")),
            None => Ok(ValidationResult::skip(self.id(), CATEGORY, NOT_PREPARED)),
        }
    }
}

// ---------------------------------------------------------------------------
// Monotonic sequence
// ---------------------------------------------------------------------------

/// FAIL when an invoice number is lower than the highest one submitted
/// before it for the same seller.
///
/// When both numbers end in a run of digits, those runs are compared
/// numerically (`INV-10` follows `INV-9`); otherwise the whole strings are
/// compared lexicographically. A FAIL does not move the high-water mark.
/// Verdicts follow submission order, whatever order invoices are evaluated in.
#[derive(Debug, Default)]
pub struct InvoiceSequence {
    /// Invoice id to the number it fell behind, if any.
    verdicts: Mutex<HashMap<String, Option<String>>>,
}

impl InvoiceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    fn trailing_number(s: &str) -> Option<u128> {
        let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        s[s.len() - digits..].parse().ok()
    }

    fn compare(current: &str, last: &str) -> Ordering {
        match (Self::trailing_number(current), Self::trailing_number(last)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => current.cmp(last),
        }
    }
}

impl RuleCheck for InvoiceSequence {
    fn id(&self) -> &'static str {
        check_ids::DOCUMENT_SEQUENCE
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Invoice number sequence"
    }

    fn prepare(&self, batch: &BatchView<'_>) {
        let mut high_water: HashMap<String, &str> = HashMap::new();
        let mut verdicts = HashMap::with_capacity(batch.invoices.len());
        for invoice in batch.invoices {
            let seller = invoice.seller_tax_id().unwrap_or_default().to_ascii_uppercase();
            let current = invoice.invoice_id.as_str();
            let behind = high_water
                .get(&seller)
                .filter(|last| Self::compare(current, last) == Ordering::Less)
                .map(|last| last.to_string());
            if behind.is_none() {
                high_water.insert(seller, current);
            }
            verdicts.insert(invoice.invoice_id.clone(), behind);
        }
        *self.verdicts.lock() = verdicts;
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let verdict = self.verdicts.lock().get(&invoice.invoice_id).cloned();
        match verdict {
            Some(None) => Ok(ValidationResult::pass(self.id(), CATEGORY)),
            Some(Some(previous)) => {
                tracing::debug!(invoice_id = %invoice.invoice_id, %previous, "invoice number went backwards");
                Ok(
                    ValidationResult::fail(self.id(), CATEGORY, "Invoice sequence anomaly", 0.20)
                        .with_metadata("previous_invoice", json!(previous)),
                )
            }
            None => Ok(ValidationResult::skip(self.id(), CATEGORY, NOT_PREPARED)),
        }
    }
}

// ---------------------------------------------------------------------------
// Date vs file metadata
// ---------------------------------------------------------------------------

/// FAIL when the invoice is dated after its source file was created.
#[derive(Debug, Default)]
pub struct DateVsMetadata;

impl RuleCheck for DateVsMetadata {
    fn id(&self) -> &'static str {
        check_ids::DOCUMENT_DATE_VS_METADATA
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Invoice date consistent with file metadata"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let (Some(invoice_date), Some(created)) = (invoice.invoice_date, invoice.metadata.file_created_date)
        else {
            return Ok(ValidationResult::skip(
                self.id(),
                CATEGORY,
                "Invoice date or file creation date unavailable",
            ));
        };
        if invoice_date > created {
            return Ok(ValidationResult::fail(
                self.id(),
                CATEGORY,
                "Invoice date later than file creation",
                0.10,
            )
            .with_metadata("invoice_date", json!(invoice_date))
            .with_metadata("file_created_date", json!(created)));
        }
        Ok(ValidationResult::pass(self.id(), CATEGORY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use icx_core::CheckStatus;
    use std::collections::HashSet;

    fn invoice(number: &str, seller: &str) -> InvoiceContext {
        let mut inv = InvoiceContext::new(number);
        inv.seller_tax_id = Some(seller.to_string());
        inv
    }

    #[test]
    fn number_format() {
        let check = InvoiceNumberFormat;
        for ok in ["INV-2024/001", "A1", "2024"] {
            assert_eq!(check.evaluate(&InvoiceContext::new(ok)).unwrap().status, CheckStatus::Pass, "{ok}");
        }
        for bad in ["", "inv-1", "INV 1", "INV_1"] {
            let r = check.evaluate(&InvoiceContext::new(bad)).unwrap();
            assert_eq!(r.status, CheckStatus::Fail, "{bad}");
            assert_eq!(r.confidence_impact, 0.10);
        }
    }

    fn prepared<C: RuleCheck>(check: C, batch: &[InvoiceContext], decided: Option<&HashSet<String>>) -> C {
        check.prepare(&BatchView {
            invoices: batch,
            previously_decided: decided,
        });
        check
    }

    #[test]
    fn duplicate_fails_only_for_previously_decided_invoices() {
        let batch = [invoice("INV-1", "A"), invoice("INV-2", "A")];
        let decided: HashSet<String> = ["INV-1".to_string()].into();
        let check = prepared(DuplicateInvoice::new(&TaxRules::default()), &batch, Some(&decided));

        let dup = check.evaluate(&batch[0]).unwrap();
        assert_eq!(dup.status, CheckStatus::Fail);
        assert_eq!(dup.confidence_impact, 0.30);
        assert_eq!(check.evaluate(&batch[1]).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn duplicate_without_history_needs_review() {
        let rules = TaxRules::default();
        let batch = [invoice("INV-1", "A")];
        let check = prepared(DuplicateInvoice::new(&rules), &batch, None);
        let r = check.evaluate(&batch[0]).unwrap();
        assert_eq!(r.status, CheckStatus::Review);
        assert_eq!(r.confidence_impact, rules.missing_data_impact);
    }

    #[test]
    fn unprepared_invoices_are_skipped() {
        let inv = invoice("INV-1", "A");
        let dup = DuplicateInvoice::new(&TaxRules::default());
        assert_eq!(dup.evaluate(&inv).unwrap().status, CheckStatus::Skip);
        assert_eq!(InvoiceSequence::new().evaluate(&inv).unwrap().status, CheckStatus::Skip);
    }

    #[test]
    fn sequence_compares_trailing_numbers() {
        let batch = [
            invoice("INV-9", "A"),
            invoice("INV-10", "A"),
            invoice("INV-8", "A"),
            invoice("INV-9B", "A"),
        ];
        let check = prepared(InvoiceSequence::new(), &batch, None);
        assert!(!check.evaluate(&batch[0]).unwrap().is_fail());
        assert!(!check.evaluate(&batch[1]).unwrap().is_fail());
        let back = check.evaluate(&batch[2]).unwrap();
        assert!(back.is_fail());
        assert_eq!(back.metadata["previous_invoice"], "INV-10");
        // High-water mark unchanged by the failure.
        assert_eq!(check.evaluate(&batch[3]).unwrap().metadata["previous_invoice"], "INV-10");
    }

    #[test]
    fn sequence_follows_submission_order_not_evaluation_order() {
        let batch: Vec<_> = (1..=8).map(|i| invoice(&format!("INV-{i:03}"), "A")).collect();
        let check = prepared(InvoiceSequence::new(), &batch, None);
        for inv in batch.iter().rev() {
            assert_eq!(check.evaluate(inv).unwrap().status, CheckStatus::Pass, "{}", inv.invoice_id);
        }
    }

    #[test]
    fn sequence_is_tracked_per_seller() {
        let batch = [invoice("INV-100", "A"), invoice("INV-5", "B")];
        let check = prepared(InvoiceSequence::new(), &batch, None);
        assert!(!check.evaluate(&batch[1]).unwrap().is_fail());
    }

    #[test]
    fn sequence_falls_back_to_lexicographic() {
        let batch = [invoice("INV-B", "A"), invoice("INV-A", "A")];
        let check = prepared(InvoiceSequence::new(), &batch, None);
        assert!(!check.evaluate(&batch[0]).unwrap().is_fail());
        assert!(check.evaluate(&batch[1]).unwrap().is_fail());
    }

    #[test]
    fn date_vs_metadata() {
        let check = DateVsMetadata;
        let mut inv = InvoiceContext::new("INV-1");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Skip);

        inv.invoice_date = NaiveDate::from_ymd_opt(2024, 3, 10);
        inv.metadata.file_created_date = NaiveDate::from_ymd_opt(2024, 3, 12);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);

        inv.invoice_date = NaiveDate::from_ymd_opt(2024, 3, 13);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Fail);
    }
}
