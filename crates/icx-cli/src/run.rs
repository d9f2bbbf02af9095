//! # Run Subcommand
//!
//! Loads invoices and engine configuration, wires the tax authority (HTTP
//! client or the in-process static authority), the optional explainer and
//! the decision store, and evaluates the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use icx_client::{
    ExplainerConfig, HttpExplainer, StaticTaxAuthority, TaxApiClient, TaxApiConfig, TaxAuthority, VendorRegistry,
};
use icx_core::{EngineConfig, InvoiceContext};
use icx_engine::{BatchOutcome, Orchestrator};

/// Arguments for `icx run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON file holding an array of normalised invoices.
    #[arg(long)]
    pub invoices: PathBuf,

    /// Engine configuration (YAML). Defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the confidence threshold from the configuration.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Answer tax lookups from a local vendor registry instead of the API.
    #[arg(long)]
    pub offline: bool,

    /// Vendor registry JSON used with `--offline`.
    #[arg(long, requires = "offline")]
    pub registry: Option<PathBuf>,

    /// Write the result JSON here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute `icx run`.
pub async fn run_batch(args: &RunArgs, db_url: &str) -> Result<u8> {
    let config = load_config(args.config.as_deref(), args.threshold)?;
    let invoices = load_invoices(&args.invoices)?;
    let authority = build_authority(args)?;
    let store = Arc::new(crate::open_store(db_url).await?);

    let mut orchestrator = Orchestrator::new(config, authority, store);
    if let Some(explainer_config) = ExplainerConfig::from_env().context("invalid explainer configuration")? {
        tracing::info!(url = %explainer_config.base_url, "Explainer enabled");
        orchestrator = orchestrator.with_explainer(Arc::new(HttpExplainer::new(&explainer_config)?));
    }

    let outcome = orchestrator.run(invoices).await;
    write_outcome(&outcome, args.output.as_deref())?;
    Ok(0)
}

/// Engine configuration from an optional YAML file plus CLI overrides.
pub fn load_config(path: Option<&Path>, threshold: Option<f64>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(threshold) = threshold {
        config.confidence_threshold = threshold;
        config = config.validate()?;
    }
    Ok(config)
}

/// Parse the invoice file: a JSON array of invoice objects.
pub fn load_invoices(path: &Path) -> Result<Vec<InvoiceContext>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let invoices: Vec<InvoiceContext> =
        serde_json::from_str(&text).with_context(|| format!("failed to parse invoices in {}", path.display()))?;
    tracing::debug!(count = invoices.len(), path = %path.display(), "Loaded invoices");
    Ok(invoices)
}

fn build_authority(args: &RunArgs) -> Result<Arc<dyn TaxAuthority>> {
    if args.offline {
        let registry = match &args.registry {
            Some(path) => VendorRegistry::load(path)?,
            None => VendorRegistry::default(),
        };
        let authority = StaticTaxAuthority::new(registry);
        tracing::info!(vendors = authority.vendor_count(), "Offline mode: using static tax authority");
        return Ok(Arc::new(authority));
    }
    let config = TaxApiConfig::from_env().context("tax API configuration (set ICX_TAX_API_KEY or use --offline)")?;
    tracing::info!(url = %config.base_url, "Using tax-validation API");
    Ok(Arc::new(TaxApiClient::new(&config)?))
}

fn write_outcome(outcome: &BatchOutcome, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote batch result");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use icx_core::Decision;

    const INVOICES: &str = r#"[
        {"invoice_id": "INV-100", "seller_tax_id": "27AAPFU0939F1ZV", "invoice_value": 1000},
        {"invoice_id": "INV-101", "seller_tax_id": "29AAACB1234C1Z5", "invoice_value": "2500.50"}
    ]"#;

    #[test]
    fn threshold_override_is_validated() {
        let config = load_config(None, Some(0.85)).unwrap();
        assert_eq!(config.confidence_threshold, 0.85);
        assert_eq!(load_config(None, None).unwrap().confidence_threshold, 0.7);
    }

    #[test]
    fn invoices_parse_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, INVOICES).unwrap();
        let invoices = load_invoices(&path).unwrap();
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[1].invoice_id, "INV-101");
    }

    #[test]
    fn malformed_invoice_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_invoices(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse invoices"));
    }

    #[tokio::test]
    async fn offline_batch_writes_output_and_records_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let invoices = dir.path().join("batch.json");
        let registry = dir.path().join("vendors.json");
        let output = dir.path().join("out.json");
        std::fs::write(&invoices, INVOICES).unwrap();
        std::fs::write(
            &registry,
            r#"{"vendors": [{"gstin": "27AAPFU0939F1ZV", "legal_name": "Acme", "status": "ACTIVE", "state_code": "27"}]}"#,
        )
        .unwrap();
        let db = format!("sqlite://{}", dir.path().join("decisions.db").display());

        let args = RunArgs {
            invoices,
            config: None,
            threshold: None,
            offline: true,
            registry: Some(registry),
            output: Some(output.clone()),
        };
        assert_eq!(run_batch(&args, &db).await.unwrap(), 0);

        let outcome: BatchOutcome = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(outcome.summary.total_invoices, 2);
        // The second seller is not in the registry.
        assert_eq!(outcome.reports[1].decision, Decision::Escalate);

        let store = crate::open_store(&db).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
    }
}
