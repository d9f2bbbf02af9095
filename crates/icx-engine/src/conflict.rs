//! Conflict detection over one invoice's results.

use icx_core::{CheckCategory, CheckStatus, ValidationResult};

pub const MIXED_OUTCOMES: &str = "Mixed FAIL and REVIEW outcomes across compliance categories";

pub const JOINT_VIOLATION: &str = "Tax-compliance and withholding rules jointly violated";

/// Emitted for a tax-compliance FAIL when nothing else was flagged, so a
/// lone severe failure is never treated as conflict-free.
pub const CRITICAL_TAX_FAILURE: &str = "Critical tax-compliance failure requires escalation";

/// Added by the resolver when a prior APPROVE meets a current FAIL.
pub const HISTORICAL_DEVIATION: &str = "Deviation from historical approval pattern";

/// Human-readable conflicts, in a fixed order.
pub fn detect(results: &[ValidationResult]) -> Vec<String> {
    let has = |status: CheckStatus| results.iter().any(|r| r.status == status);
    let failed_in = |category: CheckCategory| {
        results
            .iter()
            .any(|r| r.status == CheckStatus::Fail && r.category == category)
    };

    let mut conflicts = Vec::new();
    if has(CheckStatus::Fail) && has(CheckStatus::Review) {
        conflicts.push(MIXED_OUTCOMES.to_string());
    }

    let tax_fail = failed_in(CheckCategory::TaxCompliance);
    if tax_fail && failed_in(CheckCategory::WithholdingTax) {
        conflicts.push(JOINT_VIOLATION.to_string());
    }
    if tax_fail && conflicts.is_empty() {
        conflicts.push(CRITICAL_TAX_FAILURE.to_string());
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(category: CheckCategory) -> ValidationResult {
        ValidationResult::fail("x", category, "bad", 0.1)
    }

    fn review(category: CheckCategory) -> ValidationResult {
        ValidationResult::review("y", category, "unsure", 0.1)
    }

    #[test]
    fn clean_results_have_no_conflict() {
        assert!(detect(&[]).is_empty());
        assert!(detect(&[ValidationResult::pass("a", CheckCategory::Policy)]).is_empty());
        assert!(detect(&[review(CheckCategory::TaxCompliance)]).is_empty());
    }

    #[test]
    fn lone_tax_fail_is_critical() {
        assert_eq!(detect(&[fail(CheckCategory::TaxCompliance)]), vec![CRITICAL_TAX_FAILURE]);
    }

    #[test]
    fn lone_policy_fail_is_not_a_conflict() {
        assert!(detect(&[fail(CheckCategory::Policy)]).is_empty());
    }

    #[test]
    fn mixed_and_joint() {
        let results = [
            fail(CheckCategory::TaxCompliance),
            fail(CheckCategory::WithholdingTax),
            review(CheckCategory::Arithmetic),
        ];
        assert_eq!(detect(&results), vec![MIXED_OUTCOMES, JOINT_VIOLATION]);
    }

    #[test]
    fn mixed_suppresses_critical() {
        let results = [fail(CheckCategory::TaxCompliance), review(CheckCategory::Policy)];
        assert_eq!(detect(&results), vec![MIXED_OUTCOMES]);
    }
}
