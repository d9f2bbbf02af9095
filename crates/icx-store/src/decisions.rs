//! Decision row persistence operations.
//!
//! Free functions over a `SqlitePool` and the `decisions` table. Writers
//! go through [`crate::DecisionStore`], which serialises them; these
//! functions do no locking of their own.

use chrono::{DateTime, Utc};
use icx_core::{Decision, DecisionRecord};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::StoreError;

const SELECT_COLUMNS: &str = "SELECT seq, invoice_id, decision, confidence, run_id, recorded_at FROM decisions";

/// A decision made outside this store, for seeding history.
///
/// One line of an import file: `{"invoice_id", "decision", "confidence"}`,
/// with an optional `recorded_at` (defaults to the import time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorDecision {
    pub invoice_id: String,
    pub decision: Decision,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Insert one row and return it with its assigned sequence number.
pub(crate) async fn insert(
    pool: &SqlitePool,
    invoice_id: &str,
    decision: Decision,
    confidence: f64,
    run_id: Option<&str>,
) -> Result<DecisionRecord, StoreError> {
    let recorded_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO decisions (invoice_id, decision, confidence, run_id, recorded_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(invoice_id)
    .bind(decision.as_str())
    .bind(clamp_confidence(confidence))
    .bind(run_id)
    .bind(recorded_at)
    .execute(pool)
    .await?;

    Ok(DecisionRecord {
        seq: result.last_insert_rowid(),
        invoice_id: invoice_id.to_string(),
        decision,
        confidence: clamp_confidence(confidence),
        run_id: run_id.map(str::to_string),
        recorded_at,
    })
}

/// Insert imported rows inside an open transaction.
pub(crate) async fn insert_prior(
    tx: &mut Transaction<'_, Sqlite>,
    prior: &PriorDecision,
) -> Result<(), StoreError> {
    if prior.invoice_id.trim().is_empty() {
        return Err(StoreError::InvalidRecord {
            invoice_id: prior.invoice_id.clone(),
            reason: "empty invoice id".into(),
        });
    }
    sqlx::query(
        "INSERT INTO decisions (invoice_id, decision, confidence, run_id, recorded_at)
         VALUES (?, ?, ?, NULL, ?)",
    )
    .bind(&prior.invoice_id)
    .bind(prior.decision.as_str())
    .bind(clamp_confidence(prior.confidence))
    .bind(prior.recorded_at.unwrap_or_else(Utc::now))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn exists(pool: &SqlitePool, invoice_id: &str) -> Result<bool, StoreError> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM decisions WHERE invoice_id = ?)")
        .bind(invoice_id)
        .fetch_one(pool)
        .await?;
    Ok(found)
}

pub(crate) async fn exists_with(
    pool: &SqlitePool,
    invoice_id: &str,
    decision: Decision,
) -> Result<bool, StoreError> {
    let found: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM decisions WHERE invoice_id = ? AND decision = ?)",
    )
    .bind(invoice_id)
    .bind(decision.as_str())
    .fetch_one(pool)
    .await?;
    Ok(found)
}

pub(crate) async fn count_for(pool: &SqlitePool, invoice_id: &str) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decisions WHERE invoice_id = ?")
        .bind(invoice_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub(crate) async fn count_all(pool: &SqlitePool) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decisions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub(crate) async fn latest_for(
    pool: &SqlitePool,
    invoice_id: &str,
) -> Result<Option<DecisionRecord>, StoreError> {
    let row = sqlx::query_as::<_, DecisionRow>(&format!(
        "{SELECT_COLUMNS} WHERE invoice_id = ? ORDER BY seq DESC LIMIT 1"
    ))
    .bind(invoice_id)
    .fetch_optional(pool)
    .await?;

    row.map(DecisionRow::into_record).transpose()
}

/// Every row for one invoice, oldest first.
pub(crate) async fn history_for(
    pool: &SqlitePool,
    invoice_id: &str,
) -> Result<Vec<DecisionRecord>, StoreError> {
    let rows = sqlx::query_as::<_, DecisionRow>(&format!(
        "{SELECT_COLUMNS} WHERE invoice_id = ? ORDER BY seq ASC"
    ))
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DecisionRow::into_record).collect()
}

/// The most recent `limit` rows across all invoices, newest first.
pub(crate) async fn recent(pool: &SqlitePool, limit: u32) -> Result<Vec<DecisionRecord>, StoreError> {
    let rows = sqlx::query_as::<_, DecisionRow>(&format!("{SELECT_COLUMNS} ORDER BY seq DESC LIMIT ?"))
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(DecisionRow::into_record).collect()
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct DecisionRow {
    seq: i64,
    invoice_id: String,
    decision: String,
    confidence: f64,
    run_id: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl DecisionRow {
    fn into_record(self) -> Result<DecisionRecord, StoreError> {
        let decision = self.decision.parse::<Decision>().map_err(|e| StoreError::CorruptRow {
            seq: self.seq,
            reason: e.to_string(),
        })?;
        Ok(DecisionRecord {
            seq: self.seq,
            invoice_id: self.invoice_id,
            decision,
            confidence: self.confidence,
            run_id: self.run_id,
            recorded_at: self.recorded_at,
        })
    }
}
