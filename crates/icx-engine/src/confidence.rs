//! # Confidence Aggregation
//!
//! A coarse, monotone penalty over the result list:
//!
//! ```text
//! confidence = max(0, 1 − (fails × 0.3 + reviews × 0.15) / total)
//! ```
//!
//! and `1.0` for an empty list. It orders invoices by apparent risk; it is
//! not a calibrated probability. Per-result `confidence_impact` values are
//! carried for audit and do not enter this formula.

use icx_core::{CheckStatus, ValidationResult};

/// Penalty weight of one FAIL.
pub const FAIL_WEIGHT: f64 = 0.3;

/// Penalty weight of one REVIEW.
pub const REVIEW_WEIGHT: f64 = 0.15;

/// Aggregate confidence for one invoice's results, in `[0, 1]`.
pub fn aggregate(results: &[ValidationResult]) -> f64 {
    let (fails, reviews) = results.iter().fold((0usize, 0usize), |(f, r), result| match result.status {
        CheckStatus::Fail => (f + 1, r),
        CheckStatus::Review => (f, r + 1),
        CheckStatus::Pass | CheckStatus::Skip => (f, r),
    });
    score(fails, reviews, results.len())
}

/// The formula over raw counts.
pub fn score(fails: usize, reviews: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    let penalty = (fails as f64 * FAIL_WEIGHT + reviews as f64 * REVIEW_WEIGHT) / total as f64;
    (1.0 - penalty).clamp(0.0, 1.0)
}
