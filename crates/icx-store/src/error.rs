//! Error types for the decision store.

use thiserror::Error;

/// Failures of the decision store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection, query or decode failure in SQLite.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded schema migrations could not be applied.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row does not map back to a decision record.
    #[error("corrupt decision row {seq}: {reason}")]
    CorruptRow { seq: i64, reason: String },

    /// A record offered for import is unusable.
    #[error("invalid history record for invoice {invoice_id:?}: {reason}")]
    InvalidRecord { invoice_id: String, reason: String },
}
