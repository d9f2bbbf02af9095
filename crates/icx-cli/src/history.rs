//! # History Subcommands
//!
//! `icx history` prints recorded decisions; `icx import-history` seeds the
//! store with decisions made elsewhere so historical-deviation checks have
//! something to compare against.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use icx_store::PriorDecision;

/// Arguments for `icx history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Invoice identifier. Without one, the most recent decisions are shown.
    pub invoice_id: Option<String>,

    /// Number of recent decisions to show when no invoice is given.
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}

/// Arguments for `icx import-history`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON-lines file, one `{"invoice_id", "decision", "confidence"}` per line.
    pub file: PathBuf,
}

/// Execute `icx history`.
pub async fn run_history(args: &HistoryArgs, db_url: &str) -> Result<u8> {
    let store = crate::open_store(db_url).await?;
    let records = match &args.invoice_id {
        Some(id) => store.history_for(id).await?,
        None => store.recent(args.limit).await?,
    };
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(0)
}

/// Execute `icx import-history`.
pub async fn run_import(args: &ImportArgs, db_url: &str) -> Result<u8> {
    let records = read_prior_decisions(&args.file)?;
    let store = crate::open_store(db_url).await?;
    let imported = store.import_history(&records).await?;
    println!("Imported {imported} decision(s) from {}", args.file.display());
    Ok(0)
}

/// Parse a JSON-lines history file. Blank lines are skipped; any other bad
/// line fails the whole import.
pub fn read_prior_decisions(path: &Path) -> Result<Vec<PriorDecision>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("{}:{}: invalid decision record", path.display(), index + 1))
        })
        .collect()
}
