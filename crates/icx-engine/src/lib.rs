//! # icx-engine — Compliance Decision Engine
//!
//! Decides APPROVE, APPROVE_WITH_REVIEW or ESCALATE for each invoice of a
//! batch, and records every decision.
//!
//! ## Pipeline
//!
//! ```text
//! InvoiceContext
//!   → Validator
//!       → TaxChain (authority lookups, fail-fast)
//!       → document / arithmetic / policy checks (skipped after a tax FAIL)
//!   → confidence::aggregate + conflict::detect
//!   → Resolver (decision table, explainer, DecisionStore append)
//!   → InvoiceReport
//! ```
//!
//! The [`Orchestrator`] runs that pipeline concurrently over a batch and
//! converts any per-invoice failure into a synthetic ESCALATE report.
//!
//! ## Crate Policy
//!
//! - No global state: the authority client (with its cache), the store and
//!   the explainer are owned by the [`Orchestrator`] and passed down.
//! - Nothing below [`Orchestrator::run`] is allowed to abort a batch.

pub mod confidence;
pub mod conflict;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod tax_chain;
pub mod validator;

pub use error::EngineError;
pub use orchestrator::{BatchOutcome, BatchSummary, Orchestrator};
pub use report::InvoiceReport;
pub use resolver::{decide, DecisionSignals, Resolver};
pub use tax_chain::TaxChain;
pub use validator::{normalize_outcome, run_check, Validator};
