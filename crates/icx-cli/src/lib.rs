//! # icx-cli — Command-Line Driver
//!
//! Provides the `icx` binary.
//!
//! ## Subcommands
//!
//! - `icx run`: evaluate a JSON file of normalised invoices and print the
//!   batch summary and per-invoice reports as JSON.
//! - `icx history`: show recorded decisions for one invoice, or the most
//!   recent decisions overall.
//! - `icx import-history`: seed the decision store from a JSON-lines file
//!   of prior decisions.
//!
//! ```bash
//! ICX_TAX_API_KEY=dev icx run --invoices batch.json --config engine.yaml
//! icx run --invoices batch.json --offline --registry vendors.json
//! icx history INV-2024-001
//! icx import-history prior_decisions.jsonl
//! ```
//!
//! Every subcommand returns an exit code; errors are logged and map to 1.

pub mod history;
pub mod run;

use icx_store::DecisionStore;

/// Store location used when neither `--db` nor `ICX_DATABASE_URL` is given.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://icx-decisions.db";

/// Open the decision store, with context for the error path.
pub async fn open_store(url: &str) -> anyhow::Result<DecisionStore> {
    use anyhow::Context;
    DecisionStore::connect(url)
        .await
        .with_context(|| format!("failed to open decision store at {url}"))
}
