//! # Resolver
//!
//! Turns one invoice's validation payload into a [`Resolution`], persists
//! it, and attaches an advisory explanation when one is warranted.
//!
//! ## Precedence
//!
//! Evaluated in order, first match wins:
//!
//! | # | Signal                                   | Decision              |
//! |---|------------------------------------------|-----------------------|
//! | 1 | any FAIL                                 | `ESCALATE`            |
//! | 2 | confidence below threshold               | `APPROVE_WITH_REVIEW` |
//! | 3 | tax-compliance REVIEW (blocking review)  | `APPROVE_WITH_REVIEW` |
//! | 4 | deviation from a prior APPROVE           | `APPROVE_WITH_REVIEW` |
//! | 5 | otherwise                                | `APPROVE`             |
//!
//! Deviation is only ever raised together with a FAIL, so row 4 is shadowed
//! by row 1 in practice. The flag is still computed first and reported on
//! the resolution, and it is added to the conflicts the explainer sees.
//! The explanation never feeds back into the decision.

use std::sync::Arc;

use icx_client::{ExplainContext, Explainer};
use icx_core::{CheckCategory, CheckStatus, Decision, InvoiceContext, Resolution, ValidationPayload};
use icx_store::DecisionStore;

use crate::conflict;
use crate::error::EngineError;

pub const REASON_FAILED: &str = "critical compliance check failed";
pub const REASON_LOW_CONFIDENCE: &str = "confidence below threshold";
pub const REASON_BLOCKING_REVIEW: &str = "tax compliance requires human review";
pub const REASON_DEVIATION: &str = "deviation from historical approval pattern";
pub const REASON_APPROVED: &str = "all critical compliance checks passed";

/// The four inputs of the decision table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionSignals {
    pub has_fail: bool,
    pub below_threshold: bool,
    pub blocking_review: bool,
    pub deviated_from_history: bool,
}

impl DecisionSignals {
    /// Signals for `payload` against `threshold`. Deviation is supplied by
    /// the caller since it needs the store.
    pub fn from_payload(payload: &ValidationPayload, threshold: f64, deviated_from_history: bool) -> Self {
        Self {
            has_fail: payload.has_fail(),
            below_threshold: payload.final_confidence < threshold,
            blocking_review: payload.has(CheckCategory::TaxCompliance, CheckStatus::Review),
            deviated_from_history,
        }
    }
}

/// The decision table. Total over every signal combination.
pub fn decide(signals: DecisionSignals) -> (Decision, &'static str) {
    if signals.has_fail {
        (Decision::Escalate, REASON_FAILED)
    } else if signals.below_threshold {
        (Decision::ApproveWithReview, REASON_LOW_CONFIDENCE)
    } else if signals.blocking_review {
        (Decision::ApproveWithReview, REASON_BLOCKING_REVIEW)
    } else if signals.deviated_from_history {
        (Decision::ApproveWithReview, REASON_DEVIATION)
    } else {
        (Decision::Approve, REASON_APPROVED)
    }
}

/// Decision state machine backed by the decision store.
pub struct Resolver {
    store: Arc<DecisionStore>,
    explainer: Option<Arc<dyn Explainer>>,
    threshold: f64,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("threshold", &self.threshold)
            .field("explainer", &self.explainer.is_some())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(store: Arc<DecisionStore>, threshold: f64) -> Self {
        Self {
            store,
            explainer: None,
            threshold,
        }
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide, explain if warranted, persist, and return the resolution.
    ///
    /// Fails only when the store cannot be read or written; explainer
    /// problems leave the explanation empty.
    pub async fn resolve(
        &self,
        invoice: &InvoiceContext,
        payload: &ValidationPayload,
        run_id: Option<&str>,
    ) -> Result<Resolution, EngineError> {
        let invoice_id = invoice.invoice_id.as_str();

        let deviated = payload.has_fail() && self.store.has_decision(invoice_id, Decision::Approve).await?;
        let signals = DecisionSignals::from_payload(payload, self.threshold, deviated);
        let (decision, reason) = decide(signals);

        let mut resolution = Resolution::new(invoice_id, decision, payload.final_confidence, reason);
        resolution.failed_checks = payload.failed_check_ids();
        resolution.review_flags = payload.review_check_ids();
        resolution.conflicts = payload.conflicts.clone();
        resolution.deviated_from_history = deviated;
        if deviated {
            resolution.conflicts.push(conflict::HISTORICAL_DEVIATION.to_string());
        }

        if !resolution.conflicts.is_empty() || decision == Decision::Escalate {
            resolution.explanation = self.explain(invoice, &resolution.conflicts).await;
        }

        self.store
            .append(invoice_id, decision, payload.final_confidence, run_id)
            .await?;

        tracing::info!(
            invoice_id,
            decision = %decision,
            confidence = payload.final_confidence,
            failed = resolution.failed_checks.len(),
            review = resolution.review_flags.len(),
            conflicts = resolution.conflicts.len(),
            "Invoice resolved"
        );
        Ok(resolution)
    }

    async fn explain(&self, invoice: &InvoiceContext, conflicts: &[String]) -> Option<String> {
        let explainer = self.explainer.as_ref()?;
        let context = ExplainContext {
            invoice_id: invoice.invoice_id.clone(),
            counterparty_id: invoice.counterparty_id().map(str::to_string),
            amount: invoice.invoice_value.clone(),
        };
        match explainer.explain(&context, conflicts).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(invoice_id = %invoice.invoice_id, "Explainer failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_signals() -> impl Iterator<Item = DecisionSignals> {
        (0u8..16).map(|bits| DecisionSignals {
            has_fail: bits & 1 != 0,
            below_threshold: bits & 2 != 0,
            blocking_review: bits & 4 != 0,
            deviated_from_history: bits & 8 != 0,
        })
    }

    #[test]
    fn every_combination_maps_by_precedence() {
        for s in all_signals() {
            let (decision, reason) = decide(s);
            let expected = if s.has_fail {
                Decision::Escalate
            } else if s.below_threshold || s.blocking_review || s.deviated_from_history {
                Decision::ApproveWithReview
            } else {
                Decision::Approve
            };
            assert_eq!(decision, expected, "{s:?}");
            assert!(!reason.is_empty());
        }
    }

    #[test]
    fn reasons_follow_first_matching_row() {
        let low = DecisionSignals {
            below_threshold: true,
            blocking_review: true,
            ..Default::default()
        };
        assert_eq!(decide(low).1, REASON_LOW_CONFIDENCE);

        let blocking = DecisionSignals {
            blocking_review: true,
            deviated_from_history: true,
            ..Default::default()
        };
        assert_eq!(decide(blocking).1, REASON_BLOCKING_REVIEW);

        let deviated = DecisionSignals {
            deviated_from_history: true,
            ..Default::default()
        };
        assert_eq!(decide(deviated), (Decision::ApproveWithReview, REASON_DEVIATION));
        assert_eq!(decide(DecisionSignals::default()), (Decision::Approve, REASON_APPROVED));
    }

    #[test]
    fn signals_from_payload() {
        use icx_core::ValidationResult;
        let payload = ValidationPayload {
            results: vec![ValidationResult::review("tax.state_code", CheckCategory::TaxCompliance, "x", 0.05)],
            final_confidence: 0.85,
            conflicts: vec![],
        };
        let s = DecisionSignals::from_payload(&payload, 0.7, false);
        assert!(s.blocking_review);
        assert!(!s.below_threshold);
        assert!(!s.has_fail);
        assert!(DecisionSignals::from_payload(&payload, 0.9, false).below_threshold);
    }
}
