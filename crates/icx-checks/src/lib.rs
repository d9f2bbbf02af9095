//! # icx-checks — Rule Checks
//!
//! Independent predicates over a normalised invoice, one [`RuleCheck`] per
//! rule. Each produces exactly one [`ValidationResult`].
//!
//! ## Categories
//!
//! | Module          | Category                | State                       |
//! |-----------------|-------------------------|-----------------------------|
//! | [`document`]    | document authenticity   | prepared batch verdicts     |
//! | [`tax`]         | tax compliance          | stateless                   |
//! | [`withholding`] | withholding tax         | stateless                   |
//! | [`arithmetic`]  | arithmetic              | stateless                   |
//! | [`policy`]      | policy                  | stateless                   |
//!
//! ## Missing Data
//!
//! A check never fails for lack of an optional field. Missing inputs yield
//! REVIEW with the configured missing-data impact. The exceptions are the
//! fields basic document integrity depends on: the invoice number format
//! and the seller tax-id format FAIL when absent.
//!
//! ## Batch-Aware Checks
//!
//! The duplicate and sequence checks judge an invoice against the rest of
//! its batch and against earlier runs. Their verdicts are fixed once, in
//! submission order, by [`CheckRegistry::prepare`] before any invoice is
//! evaluated, so concurrent evaluation order never changes a decision.

pub mod arithmetic;
pub mod document;
pub mod error;
pub mod policy;
pub mod registry;
pub mod tax;
pub mod withholding;

pub use error::CheckError;
pub use registry::CheckRegistry;

use std::collections::HashSet;

use icx_core::{CheckCategory, InvoiceContext, ValidationResult};

/// What batch-aware checks see before any invoice of the batch is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct BatchView<'a> {
    /// Invoices in submission order, one per identifier.
    pub invoices: &'a [InvoiceContext],
    /// Identifiers with a decision recorded by an earlier run. `None` when
    /// the decision history could not be read.
    pub previously_decided: Option<&'a HashSet<String>>,
}

/// One compliance rule.
///
/// Implementations must be `Send + Sync`: a single instance is evaluated
/// concurrently for many invoices.
pub trait RuleCheck: Send + Sync {
    /// Stable identifier, from [`icx_core::check_ids`].
    fn id(&self) -> &'static str;

    fn category(&self) -> CheckCategory;

    /// One-line human description.
    fn description(&self) -> &'static str;

    /// Evaluate the rule against one invoice.
    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError>;

    /// Called once per batch before fan-out. Checks whose verdict depends
    /// on other invoices fix it here; `evaluate` then only looks it up.
    fn prepare(&self, _batch: &BatchView<'_>) {}
}

/// REVIEW result for a check that lacks the data it needs.
pub(crate) fn missing_data(
    check: &dyn RuleCheck,
    impact: f64,
    what: impl std::fmt::Display,
) -> ValidationResult {
    ValidationResult::review(check.id(), check.category(), format!("Missing data: {what}"), impact)
}
