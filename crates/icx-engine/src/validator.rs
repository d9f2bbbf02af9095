//! # Validator
//!
//! Runs the tax chain first. A tax-compliance FAIL ends evaluation with
//! only the chain's results; otherwise the document, arithmetic and policy
//! checks run and append. The Validator never returns an error: every
//! check outcome passes through [`normalize_outcome`], the single place a
//! check error or panic becomes a REVIEW.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use icx_checks::{CheckError, CheckRegistry, RuleCheck};
use icx_client::TaxAuthority;
use icx_core::{CheckCategory, CheckStatus, InvoiceContext, TaxRules, ValidationPayload, ValidationResult};

use crate::tax_chain::TaxChain;
use crate::{confidence, conflict};

/// Impact of a check that could not produce a verdict.
pub const CHECK_ERROR_IMPACT: f64 = 0.10;

/// Categories evaluated after a clean tax chain, in order.
const LATER_CATEGORIES: [CheckCategory; 3] = [
    CheckCategory::DocumentAuthenticity,
    CheckCategory::Arithmetic,
    CheckCategory::Policy,
];

/// Outcome of calling a check: its own result, or the panic it raised.
pub type CheckOutcome = std::thread::Result<Result<ValidationResult, CheckError>>;

/// Map any check outcome to exactly one result.
pub fn normalize_outcome(check: &dyn RuleCheck, outcome: CheckOutcome) -> ValidationResult {
    let reason = match outcome {
        Ok(Ok(result)) => return result,
        Ok(Err(e)) => format!("Rule execution error: {e}"),
        Err(payload) => format!("Rule execution error: panic: {}", panic_message(payload.as_ref())),
    };
    tracing::warn!(check_id = check.id(), "{reason}");
    ValidationResult::review(check.id(), check.category(), reason, CHECK_ERROR_IMPACT)
}

/// Evaluate one check in isolation.
pub fn run_check(check: &dyn RuleCheck, invoice: &InvoiceContext) -> ValidationResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| check.evaluate(invoice)));
    normalize_outcome(check, outcome)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Top-level validator for one run.
#[derive(Debug)]
pub struct Validator {
    chain: TaxChain,
    registry: CheckRegistry,
}

impl Validator {
    pub fn new(authority: Arc<dyn TaxAuthority>, registry: CheckRegistry, rules: &TaxRules) -> Self {
        Self {
            chain: TaxChain::new(authority, &registry, rules),
            registry,
        }
    }

    /// Evaluate one invoice.
    pub async fn validate(&self, invoice: &InvoiceContext) -> ValidationPayload {
        let mut results = self.chain.run(invoice).await;

        let tax_failed = results
            .iter()
            .any(|r| r.category == CheckCategory::TaxCompliance && r.status == CheckStatus::Fail);
        if tax_failed {
            tracing::debug!(invoice_id = %invoice.invoice_id, "Tax chain failed; later categories skipped");
        } else {
            for category in LATER_CATEGORIES {
                for check in self.registry.category(category) {
                    results.push(run_check(check.as_ref(), invoice));
                }
            }
        }

        ValidationPayload {
            final_confidence: confidence::aggregate(&results),
            conflicts: conflict::detect(&results),
            results,
        }
    }
}
