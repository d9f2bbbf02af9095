//! Per-invoice report rows. Plain serde data; rendering happens elsewhere.

use icx_client::normalize_explanation;
use icx_core::check_ids;
use icx_core::{Decision, InvoiceContext, Resolution, ValidationPayload, ValidationResult};
use serde::{Deserialize, Serialize};

/// One report row per invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReport {
    pub invoice_id: String,
    pub decision: Decision,
    /// Display label for `decision`.
    pub decision_label: String,
    /// Rounded to three places.
    pub final_confidence: f64,
    pub primary_reason: String,
    /// Reason of the first FAIL, else of the first REVIEW.
    pub first_finding: Option<String>,
    pub failed_checks: Vec<String>,
    pub review_flags: Vec<String>,
    pub conflicts: Vec<String>,
    pub escalation_required: bool,
    pub deviated_from_history: bool,
    /// Explanation text split into points; empty when none was produced.
    pub explanation: Vec<String>,
    pub source_file: Option<String>,
    pub results: Vec<ValidationResult>,
}

impl InvoiceReport {
    pub fn new(invoice: &InvoiceContext, payload: ValidationPayload, resolution: Resolution) -> Self {
        let first_finding = first_reason(&payload.results);
        Self {
            invoice_id: resolution.invoice_id,
            decision: resolution.decision,
            decision_label: resolution.decision.label().to_string(),
            final_confidence: round3(resolution.final_confidence),
            primary_reason: resolution.primary_reason,
            first_finding,
            failed_checks: resolution.failed_checks,
            review_flags: resolution.review_flags,
            conflicts: resolution.conflicts,
            escalation_required: resolution.decision == Decision::Escalate,
            deviated_from_history: resolution.deviated_from_history,
            explanation: resolution
                .explanation
                .as_deref()
                .map(normalize_explanation)
                .unwrap_or_default(),
            source_file: invoice.metadata.source_file.clone(),
            results: payload.results,
        }
    }

    /// Row for an invoice whose evaluation failed outright.
    pub fn system_error(invoice_id: &str, source_file: Option<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            invoice_id: invoice_id.to_string(),
            decision: Decision::Escalate,
            decision_label: Decision::Escalate.label().to_string(),
            final_confidence: 0.0,
            primary_reason: message.clone(),
            first_finding: Some(message),
            failed_checks: vec![check_ids::SYSTEM_ERROR.to_string()],
            review_flags: Vec::new(),
            conflicts: Vec::new(),
            escalation_required: true,
            deviated_from_history: false,
            explanation: Vec::new(),
            source_file,
            results: Vec::new(),
        }
    }

    pub fn is_system_error(&self) -> bool {
        self.failed_checks.iter().any(|id| id == check_ids::SYSTEM_ERROR)
    }
}

fn first_reason(results: &[ValidationResult]) -> Option<String> {
    let describe = |r: &ValidationResult| r.reason.clone().unwrap_or_else(|| r.check_id.clone());
    results
        .iter()
        .find(|r| r.is_fail())
        .or_else(|| results.iter().find(|r| r.is_review()))
        .map(describe)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
