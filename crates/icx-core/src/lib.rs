//! # icx-core — Foundational Types for the Invoice Compliance Engine
//!
//! Every other crate in the workspace depends on `icx-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Closed result type.** A rule check produces exactly one
//!    [`ValidationResult`] with a required [`CheckStatus`]. There is no
//!    "string or none or result" ambiguity for downstream consumers.
//!
//! 2. **Exact money.** All amounts flow through [`Amount`], an exact decimal.
//!    Quantity × rate comparisons never touch binary floating point.
//!
//! 3. **Stable identifiers.** Check identifiers live in [`check_ids`] and
//!    are part of the audit record; renaming one is a breaking change.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `icx-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod check_ids;
pub mod config;
pub mod decision;
pub mod error;
pub mod invoice;
pub mod result;

// Re-export primary types for ergonomic imports.
pub use amount::Amount;
pub use config::{EngineConfig, PolicyConfig, TaxRules};
pub use decision::{Decision, DecisionRecord, Resolution};
pub use error::{AmountError, ConfigError, UnknownDecision};
pub use invoice::{CounterpartyType, InvoiceContext, InvoiceMetadata, LineItem, TaxType};
pub use result::{CheckCategory, CheckStatus, ValidationPayload, ValidationResult};
