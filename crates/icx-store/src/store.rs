//! The [`DecisionStore`] handle.

use std::str::FromStr;
use std::time::Duration;

use icx_core::{Decision, DecisionRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;

use crate::decisions::{self, PriorDecision};
use crate::StoreError;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_CONNECTIONS: u32 = 8;

const MEMORY_URL: &str = "sqlite::memory:";

/// Append-only, concurrency-safe record of every decision made.
///
/// Appends are serialised through one async write lock so rows never
/// interleave and no append is lost. Reads go straight to the pool and
/// observe every append that has completed.
#[derive(Debug)]
pub struct DecisionStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl DecisionStore {
    /// Open (creating if missing) the database at `url` and apply the
    /// embedded migrations.
    ///
    /// `sqlite::memory:` is routed to [`DecisionStore::in_memory`].
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if url == MEMORY_URL {
            return Self::in_memory().await;
        }
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(BUSY_TIMEOUT)
            .connect_with(options)
            .await?;

        tracing::info!(url, "Connected to decision store");
        Self::from_pool(pool).await
    }

    /// A private in-memory database.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool
    /// holds exactly one connection and never recycles it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(MEMORY_URL)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("Decision store migrations applied");
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    /// Record one decision. Confidence is clamped into `[0, 1]`.
    pub async fn append(
        &self,
        invoice_id: &str,
        decision: Decision,
        confidence: f64,
        run_id: Option<&str>,
    ) -> Result<DecisionRecord, StoreError> {
        let _guard = self.write_lock.lock().await;
        let record = decisions::insert(&self.pool, invoice_id, decision, confidence, run_id).await?;
        tracing::debug!(invoice_id, seq = record.seq, decision = %decision, "Decision recorded");
        Ok(record)
    }

    /// Seed prior decisions in one transaction. Either every record is
    /// stored or none is. Returns the number stored.
    pub async fn import_history(&self, records: &[PriorDecision]) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        for record in records {
            decisions::insert_prior(&mut tx, record).await?;
        }
        tx.commit().await?;
        tracing::info!(count = records.len(), "Imported decision history");
        Ok(records.len())
    }

    /// Whether any decision exists for the invoice.
    pub async fn contains(&self, invoice_id: &str) -> Result<bool, StoreError> {
        decisions::exists(&self.pool, invoice_id).await
    }

    /// Whether the invoice was ever given `decision`.
    pub async fn has_decision(&self, invoice_id: &str, decision: Decision) -> Result<bool, StoreError> {
        decisions::exists_with(&self.pool, invoice_id, decision).await
    }

    pub async fn latest_for(&self, invoice_id: &str) -> Result<Option<DecisionRecord>, StoreError> {
        decisions::latest_for(&self.pool, invoice_id).await
    }

    /// All decisions for the invoice, oldest first.
    pub async fn history_for(&self, invoice_id: &str) -> Result<Vec<DecisionRecord>, StoreError> {
        decisions::history_for(&self.pool, invoice_id).await
    }

    pub async fn count_for(&self, invoice_id: &str) -> Result<i64, StoreError> {
        decisions::count_for(&self.pool, invoice_id).await
    }

    /// Total number of rows.
    pub async fn len(&self) -> Result<i64, StoreError> {
        decisions::count_all(&self.pool).await
    }

    /// The newest `limit` decisions across all invoices, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<DecisionRecord>, StoreError> {
        decisions::recent(&self.pool, limit).await
    }

    /// Close the pool, waiting for open connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
