//! # icx-store — Decision Store
//!
//! Append-only audit trail of every decision the engine makes, persisted
//! in SQLite through `sqlx`.
//!
//! The store answers two questions for the engine: "what did we decide
//! before for this invoice?" (historical-deviation check) and "what did
//! this run decide?" (audit). Rows are never updated or deleted.
//!
//! ## Schema
//!
//! One table, `decisions(seq, invoice_id, decision, confidence, run_id,
//! recorded_at)`, created by the embedded migrations under `migrations/`.
//! `seq` is the insertion order.
//!
//! ## Concurrency
//!
//! A [`DecisionStore`] is shared by every worker of a batch (`Arc`). Writes
//! are serialised by an async lock inside the store; file-backed databases
//! run in WAL mode with a busy timeout so concurrent readers never block
//! the writer.

pub mod decisions;
pub mod error;
pub mod store;

pub use decisions::PriorDecision;
pub use error::StoreError;
pub use store::DecisionStore;
