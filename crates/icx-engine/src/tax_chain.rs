//! # Tax Validation Chain
//!
//! Authority lookups run in a fixed order and stop at the first
//! tax-compliance FAIL:
//!
//! 1. seller registration
//! 2. reference registration (when a reference is declared)
//! 3. tariff rate, per line item with a tariff code
//! 4. e-invoice obligation
//! 5. special withholding rate (advisory, REVIEW at most)
//! 6. the stateless tax-compliance and withholding rule checks
//!
//! Lookup errors (5xx, transport failure, exhausted rate limit) downgrade
//! the step to REVIEW and the chain continues. A tax-compliance failure is
//! statutory non-compliance and nothing later can override it, so no
//! further step runs once one is recorded.

use std::sync::Arc;

use icx_checks::{CheckRegistry, RuleCheck};
use icx_client::{ApiResponse, TaxApiError, TaxAuthority};
use icx_core::check_ids;
use icx_core::{Amount, CheckCategory, InvoiceContext, LineItem, TaxRules, ValidationResult};
use serde_json::json;

use crate::validator::run_check;

const TAX: CheckCategory = CheckCategory::TaxCompliance;
const WITHHOLDING: CheckCategory = CheckCategory::WithholdingTax;

/// Impact of a lookup that could not be completed.
const LOOKUP_ERROR_IMPACT: f64 = 0.10;

/// Registration lifecycle states that disqualify a seller.
const INACTIVE_STATUSES: [&str; 2] = ["SUSPENDED", "CANCELLED"];

/// The fail-fast chain for one invoice.
pub struct TaxChain {
    authority: Arc<dyn TaxAuthority>,
    rule_checks: Vec<Arc<dyn RuleCheck>>,
    missing_impact: f64,
}

impl std::fmt::Debug for TaxChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxChain")
            .field("rule_checks", &self.rule_checks.iter().map(|c| c.id()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Whether a lookup settled the step or the chain must stop.
enum Step {
    Continue,
    Stop,
}

impl TaxChain {
    /// Chain over `authority`, finishing with the registry's tax-compliance
    /// and withholding checks.
    pub fn new(authority: Arc<dyn TaxAuthority>, registry: &CheckRegistry, rules: &TaxRules) -> Self {
        let rule_checks = registry
            .category(TAX)
            .iter()
            .chain(registry.category(WITHHOLDING))
            .cloned()
            .collect();
        Self {
            authority,
            rule_checks,
            missing_impact: rules.missing_data_impact,
        }
    }

    /// Run the chain. The returned list ends with the first tax-compliance
    /// FAIL when there is one.
    pub async fn run(&self, invoice: &InvoiceContext) -> Vec<ValidationResult> {
        let mut results = Vec::new();

        if let Step::Stop = self.seller_registration(invoice, &mut results).await {
            return results;
        }
        if let Step::Stop = self.reference_registration(invoice, &mut results).await {
            return results;
        }
        if let Step::Stop = self.tariff_rates(invoice, &mut results).await {
            return results;
        }
        if let Step::Stop = self.e_invoice(invoice, &mut results).await {
            return results;
        }

        // Every earlier FAIL has returned, so the advisory step is reached
        // only on a clean lookup record.
        self.special_withholding(invoice, &mut results).await;

        for check in &self.rule_checks {
            results.push(run_check(check.as_ref(), invoice));
        }
        results
    }

    async fn seller_registration(&self, invoice: &InvoiceContext, out: &mut Vec<ValidationResult>) -> Step {
        let id = check_ids::TAX_SELLER_REGISTRATION;
        let Some(tax_id) = invoice.seller_tax_id() else {
            return Step::Continue;
        };

        let response = match self.authority.validate_tax_id(tax_id).await {
            Ok(r) if !r.is_server_error() => r,
            outcome => {
                out.push(lookup_error(id, TAX, "GSTIN validation error", outcome));
                return Step::Continue;
            }
        };

        if !response.is_ok() || !response.flag("valid") {
            let reason = response.text("message").unwrap_or("Invalid GSTIN").to_string();
            out.push(ValidationResult::fail(id, TAX, reason, 0.25).with_evidence(response.body));
            return Step::Stop;
        }
        if let Some(status) = response.text("status").filter(|s| INACTIVE_STATUSES.contains(s)) {
            let reason = format!("GSTIN {status}");
            out.push(ValidationResult::fail(id, TAX, reason, 0.20).with_evidence(response.body));
            return Step::Stop;
        }
        out.push(ValidationResult::pass(id, TAX).with_evidence(response.body));
        Step::Continue
    }

    async fn reference_registration(&self, invoice: &InvoiceContext, out: &mut Vec<ValidationResult>) -> Step {
        let id = check_ids::TAX_REFERENCE_REGISTRATION;
        let Some(reference) = invoice.reference_number() else {
            return Step::Continue;
        };

        let response = match self.authority.validate_reference(reference).await {
            Ok(r) if !r.is_server_error() => r,
            outcome => {
                out.push(lookup_error(id, TAX, "IRN validation error", outcome));
                return Step::Continue;
            }
        };

        let cancelled = response.text("status") == Some("CANCELLED");
        if !response.is_ok() || !response.flag("valid") || cancelled {
            out.push(
                ValidationResult::fail(id, TAX, "Invalid or cancelled IRN", 0.15).with_evidence(response.body),
            );
            return Step::Stop;
        }
        out.push(ValidationResult::pass(id, TAX).with_evidence(response.body));
        Step::Continue
    }

    async fn tariff_rates(&self, invoice: &InvoiceContext, out: &mut Vec<ValidationResult>) -> Step {
        let id = check_ids::TAX_TARIFF_RATE;
        let Some(date) = invoice.invoice_date else {
            return Step::Continue;
        };

        for (line, item) in invoice.line_items.iter().enumerate() {
            let Some(code) = item.tariff_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };

            let response = match self.authority.tariff_rate(code, date).await {
                Ok(r) => r,
                Err(e) => {
                    out.push(
                        ValidationResult::review(id, TAX, format!("HSN validation error: {e}"), LOOKUP_ERROR_IMPACT)
                            .with_metadata("line", json!(line)),
                    );
                    continue;
                }
            };

            let expected = response
                .body
                .pointer("/rate/igst")
                .filter(|v| !v.is_null())
                .and_then(|v| serde_json::from_value::<Amount>(v.clone()).ok());
            let Some(expected) = expected.filter(|_| response.is_ok()) else {
                out.push(
                    ValidationResult::review(id, TAX, "HSN rate lookup failed", LOOKUP_ERROR_IMPACT)
                        .with_evidence(response.body)
                        .with_metadata("line", json!(line)),
                );
                continue;
            };

            let Some(declared) = declared_rate(item) else {
                out.push(
                    ValidationResult::review(
                        id,
                        TAX,
                        format!("Missing data: declared tax rate on line {line}"),
                        self.missing_impact,
                    )
                    .with_metadata("line", json!(line)),
                );
                continue;
            };

            if declared != expected {
                out.push(
                    ValidationResult::fail(id, TAX, "GST rate mismatch with HSN", 0.10)
                        .with_evidence(response.body)
                        .with_metadata("line", json!(line))
                        .with_metadata("expected", json!(expected))
                        .with_metadata("declared", json!(declared)),
                );
                return Step::Stop;
            }
            out.push(
                ValidationResult::pass(id, TAX)
                    .with_evidence(response.body)
                    .with_metadata("line", json!(line)),
            );
        }
        Step::Continue
    }

    async fn e_invoice(&self, invoice: &InvoiceContext, out: &mut Vec<ValidationResult>) -> Step {
        let id = check_ids::TAX_E_INVOICE_REQUIRED;
        let (Some(tax_id), Some(date)) = (invoice.seller_tax_id(), invoice.invoice_date) else {
            out.push(ValidationResult::skip(id, TAX, "No seller tax id or invoice date"));
            return Step::Continue;
        };
        let value = invoice.invoice_value.clone().unwrap_or_else(Amount::zero);

        let response = match self.authority.e_invoice_required(tax_id, date, &value).await {
            Ok(r) if r.is_ok() => r,
            outcome => {
                out.push(lookup_error(id, TAX, "E-invoice API error", outcome));
                return Step::Continue;
            }
        };

        if response.flag("required") && invoice.reference_number().is_none() {
            out.push(
                ValidationResult::fail(id, TAX, "E-invoice required but IRN missing", 0.15)
                    .with_evidence(response.body),
            );
            return Step::Stop;
        }
        out.push(ValidationResult::pass(id, TAX).with_evidence(response.body));
        Step::Continue
    }

    async fn special_withholding(&self, invoice: &InvoiceContext, out: &mut Vec<ValidationResult>) {
        let id = check_ids::WITHHOLDING_SPECIAL_RATE;
        let Some(taxpayer_id) = invoice.vendor_taxpayer_id() else {
            return;
        };

        let response = match self.authority.special_withholding(taxpayer_id).await {
            Ok(r) if r.is_ok() => r,
            outcome => {
                out.push(lookup_error(id, WITHHOLDING, "TDS verification error", outcome));
                return;
            }
        };

        if response.flag("section_206ab_applicable") {
            out.push(
                ValidationResult::review(
                    id,
                    WITHHOLDING,
                    "Higher TDS under section 206AB applicable",
                    LOOKUP_ERROR_IMPACT,
                )
                .with_evidence(response.body),
            );
        } else {
            out.push(ValidationResult::pass(id, WITHHOLDING).with_evidence(response.body));
        }
    }
}

/// Declared integrated rate of a line; for intra-state lines, the sum of
/// the central and state components.
fn declared_rate(item: &LineItem) -> Option<Amount> {
    if let Some(igst) = &item.igst_rate {
        return Some(igst.clone());
    }
    match (&item.cgst_rate, &item.sgst_rate) {
        (Some(c), Some(s)) => Some(Amount::from(c.as_decimal() + s.as_decimal())),
        _ => None,
    }
}

/// REVIEW for a lookup that produced no usable answer.
fn lookup_error(
    id: &'static str,
    category: CheckCategory,
    context: &str,
    outcome: Result<ApiResponse, TaxApiError>,
) -> ValidationResult {
    match outcome {
        Ok(response) => {
            let detail = response
                .text("error")
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            tracing::warn!(check_id = id, status = response.status, "{context}: {detail}");
            ValidationResult::review(id, category, format!("{context}: {detail}"), LOOKUP_ERROR_IMPACT)
                .with_evidence(response.body)
        }
        Err(e) => {
            tracing::warn!(check_id = id, rate_limited = e.is_rate_limited(), "{context}: {e}");
            ValidationResult::review(id, category, format!("{context}: {e}"), LOOKUP_ERROR_IMPACT)
        }
    }
}
