//! # Check Results
//!
//! The closed result type every rule check produces, and the per-invoice
//! aggregate built from a list of them.
//!
//! A [`ValidationResult`] is built once by a check and moved into the
//! invoice's result list. Builders consume `self`, so there is no API for
//! mutating a result after it has been pushed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Review,
    Skip,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Review => "REVIEW",
            Self::Skip => "SKIP",
        }
    }

    /// PASS and SKIP never carry a confidence penalty.
    pub fn is_penalised(self) -> bool {
        matches!(self, Self::Fail | Self::Review)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed enumeration of rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    DocumentAuthenticity,
    TaxCompliance,
    WithholdingTax,
    Arithmetic,
    Policy,
}

impl CheckCategory {
    /// All categories, in evaluation order.
    pub const ALL: [CheckCategory; 5] = [
        Self::DocumentAuthenticity,
        Self::TaxCompliance,
        Self::WithholdingTax,
        Self::Arithmetic,
        Self::Policy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentAuthenticity => "document_authenticity",
            Self::TaxCompliance => "tax_compliance",
            Self::WithholdingTax => "withholding_tax",
            Self::Arithmetic => "arithmetic",
            Self::Policy => "policy",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One check's outcome.
///
/// `confidence_impact` is always finite and non-negative, and is exactly
/// zero for PASS and SKIP. The constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub check_id: String,
    pub category: CheckCategory,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub confidence_impact: f64,
    /// Raw response body from the tax authority, when one was consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ValidationResult {
    /// General constructor. Normalises the impact for the given status.
    pub fn new(
        check_id: impl Into<String>,
        category: CheckCategory,
        status: CheckStatus,
        reason: Option<String>,
        confidence_impact: f64,
    ) -> Self {
        let confidence_impact = if !status.is_penalised() || !confidence_impact.is_finite() {
            0.0
        } else {
            confidence_impact.max(0.0)
        };
        Self {
            check_id: check_id.into(),
            category,
            status,
            reason,
            confidence_impact,
            evidence: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn pass(check_id: impl Into<String>, category: CheckCategory) -> Self {
        Self::new(check_id, category, CheckStatus::Pass, None, 0.0)
    }

    pub fn fail(
        check_id: impl Into<String>,
        category: CheckCategory,
        reason: impl Into<String>,
        impact: f64,
    ) -> Self {
        Self::new(check_id, category, CheckStatus::Fail, Some(reason.into()), impact)
    }

    pub fn review(
        check_id: impl Into<String>,
        category: CheckCategory,
        reason: impl Into<String>,
        impact: f64,
    ) -> Self {
        Self::new(check_id, category, CheckStatus::Review, Some(reason.into()), impact)
    }

    pub fn skip(
        check_id: impl Into<String>,
        category: CheckCategory,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(check_id, category, CheckStatus::Skip, Some(reason.into()), 0.0)
    }

    /// Attach the tax authority's response body.
    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_fail(&self) -> bool {
        self.status == CheckStatus::Fail
    }

    pub fn is_review(&self) -> bool {
        self.status == CheckStatus::Review
    }
}

/// One invoice's evaluation: results, derived confidence and conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPayload {
    pub results: Vec<ValidationResult>,
    pub final_confidence: f64,
    pub conflicts: Vec<String>,
}

impl ValidationPayload {
    /// Whether any result is a FAIL.
    pub fn has_fail(&self) -> bool {
        self.results.iter().any(ValidationResult::is_fail)
    }

    /// Whether any result of `category` has `status`.
    pub fn has(&self, category: CheckCategory, status: CheckStatus) -> bool {
        self.results
            .iter()
            .any(|r| r.category == category && r.status == status)
    }

    /// Identifiers of FAIL results, in result order, without repeats.
    pub fn failed_check_ids(&self) -> Vec<String> {
        self.ids_with(CheckStatus::Fail)
    }

    /// Identifiers of REVIEW results, in result order, without repeats.
    pub fn review_check_ids(&self) -> Vec<String> {
        self.ids_with(CheckStatus::Review)
    }

    fn ids_with(&self, status: CheckStatus) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for r in self.results.iter().filter(|r| r.status == status) {
            if !ids.iter().any(|id| id == &r.check_id) {
                ids.push(r.check_id.clone());
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_and_skip_carry_no_impact() {
        let r = ValidationResult::new("x", CheckCategory::Policy, CheckStatus::Pass, None, 0.5);
        assert_eq!(r.confidence_impact, 0.0);
        let s = ValidationResult::new("x", CheckCategory::Policy, CheckStatus::Skip, None, 0.5);
        assert_eq!(s.confidence_impact, 0.0);
    }

    #[test]
    fn negative_and_nan_impacts_clamp_to_zero() {
        let r = ValidationResult::fail("x", CheckCategory::Policy, "bad", -1.0);
        assert_eq!(r.confidence_impact, 0.0);
        let r = ValidationResult::review("x", CheckCategory::Policy, "bad", f64::NAN);
        assert_eq!(r.confidence_impact, 0.0);
    }

    #[test]
    fn status_and_category_wire_names() {
        let r = ValidationResult::review("tax.state_code", CheckCategory::TaxCompliance, "r", 0.15)
            .with_metadata("line", serde_json::json!(2));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "REVIEW");
        assert_eq!(v["category"], "tax_compliance");
        assert_eq!(v["metadata"]["line"], 2);
        assert!(v.get("evidence").is_none());
    }

    #[test]
    fn payload_ids_are_deduplicated_in_order() {
        let payload = ValidationPayload {
            results: vec![
                ValidationResult::fail("b", CheckCategory::TaxCompliance, "x", 0.1),
                ValidationResult::review("c", CheckCategory::Policy, "x", 0.1),
                ValidationResult::fail("a", CheckCategory::Arithmetic, "x", 0.1),
                ValidationResult::fail("b", CheckCategory::TaxCompliance, "y", 0.1),
            ],
            final_confidence: 0.5,
            conflicts: vec![],
        };
        assert_eq!(payload.failed_check_ids(), vec!["b", "a"]);
        assert_eq!(payload.review_check_ids(), vec!["c"]);
        assert!(payload.has(CheckCategory::Policy, CheckStatus::Review));
        assert!(!payload.has(CheckCategory::Policy, CheckStatus::Fail));
    }
}
