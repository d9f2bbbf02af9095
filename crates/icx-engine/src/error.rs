//! Error types for the engine.
//!
//! Nothing here reaches a caller of [`crate::Orchestrator::run`]: every
//! variant is converted into a synthetic ESCALATE report at the worker
//! boundary. The variants exist so that report can say what went wrong.

use icx_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The decision store rejected a read or the final append.
    #[error("decision store failure: {0}")]
    Store(#[from] StoreError),

    /// The invoice's worker task panicked or was cancelled.
    #[error("worker for invoice {invoice_id} failed: {reason}")]
    Worker { invoice_id: String, reason: String },

    /// Evaluation did not finish within the configured per-invoice timeout.
    #[error("evaluation of invoice {invoice_id} timed out after {secs}s")]
    Timeout { invoice_id: String, secs: u64 },
}
