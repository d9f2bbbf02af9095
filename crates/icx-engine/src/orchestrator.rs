//! # Batch Orchestrator
//!
//! Drives a batch of normalised invoices through Validator → Resolver on a
//! bounded pool of `min(max_workers, n)` concurrent workers.
//!
//! Each invoice runs on its own spawned task. A panic, cancellation or
//! (when configured) timeout surfaces at the worker boundary and becomes a
//! synthetic ESCALATE report; the batch always completes and always
//! produces a summary.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use icx_checks::{BatchView, CheckRegistry};
use icx_client::{Explainer, TaxAuthority};
use icx_core::{Decision, EngineConfig, InvoiceContext};
use icx_store::DecisionStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::report::InvoiceReport;
use crate::resolver::Resolver;
use crate::validator::Validator;

/// Batch-level counts and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub total_invoices: usize,
    pub approved: usize,
    pub approved_with_review: usize,
    pub escalated: usize,
    /// Everything that is not a plain APPROVE.
    pub not_approved: usize,
    /// Invoices dropped as repeats of an earlier identifier.
    pub duplicates_dropped: usize,
    pub processing_time_secs: f64,
}

/// Summary plus one report per distinct invoice, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub reports: Vec<InvoiceReport>,
}

/// Owns the shared resources of a run: the authority client (and its
/// cache), the decision store and the optional explainer.
pub struct Orchestrator {
    config: EngineConfig,
    authority: Arc<dyn TaxAuthority>,
    store: Arc<DecisionStore>,
    explainer: Option<Arc<dyn Explainer>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("explainer", &self.explainer.is_some())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(config: EngineConfig, authority: Arc<dyn TaxAuthority>, store: Arc<DecisionStore>) -> Self {
        Self {
            config,
            authority,
            store,
            explainer: None,
        }
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DecisionStore> {
        &self.store
    }

    /// Evaluate a batch. Never fails.
    pub async fn run(&self, invoices: Vec<InvoiceContext>) -> BatchOutcome {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let submitted = invoices.len();
        let invoices = dedup_by_id(invoices);
        let duplicates_dropped = submitted - invoices.len();
        let workers = self.config.max_workers.min(invoices.len()).max(1);

        tracing::info!(
            run_id = %run_id,
            invoices = invoices.len(),
            duplicates_dropped,
            workers,
            "Batch started"
        );

        // Batch-aware verdicts are settled here, in submission order and
        // before this run writes anything.
        let registry = CheckRegistry::standard(&self.config);
        let previously_decided = self.previously_decided(&invoices).await;
        registry.prepare(&BatchView {
            invoices: &invoices,
            previously_decided: previously_decided.as_ref(),
        });
        let validator = Arc::new(Validator::new(
            Arc::clone(&self.authority),
            registry,
            &self.config.tax_rules,
        ));
        let mut resolver = Resolver::new(Arc::clone(&self.store), self.config.confidence_threshold);
        if let Some(explainer) = &self.explainer {
            resolver = resolver.with_explainer(Arc::clone(explainer));
        }
        let resolver = Arc::new(resolver);
        let run: Arc<str> = Arc::from(run_id.as_str());
        let timeout = self.config.invoice_timeout_secs.map(Duration::from_secs);

        let mut indexed: Vec<(usize, InvoiceReport)> = stream::iter(invoices.into_iter().enumerate())
            .map(|(index, invoice)| {
                let validator = Arc::clone(&validator);
                let resolver = Arc::clone(&resolver);
                let run = Arc::clone(&run);
                async move {
                    let report = self.run_worker(validator, resolver, invoice, run, timeout).await;
                    (index, report)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let reports: Vec<InvoiceReport> = indexed.into_iter().map(|(_, report)| report).collect();

        let summary = summarize(run_id, &reports, duplicates_dropped, started.elapsed());
        tracing::info!(
            run_id = %summary.run_id,
            total = summary.total_invoices,
            approved = summary.approved,
            approved_with_review = summary.approved_with_review,
            escalated = summary.escalated,
            secs = summary.processing_time_secs,
            "Batch finished"
        );
        BatchOutcome { summary, reports }
    }

    /// Identifiers of `invoices` that already have a recorded decision.
    /// `None` when the store cannot answer.
    async fn previously_decided(&self, invoices: &[InvoiceContext]) -> Option<HashSet<String>> {
        let mut decided = HashSet::new();
        for invoice in invoices {
            match self.store.contains(&invoice.invoice_id).await {
                Ok(true) => {
                    decided.insert(invoice.invoice_id.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Decision history unavailable, duplicate check degraded: {e}");
                    return None;
                }
            }
        }
        Some(decided)
    }

    /// One invoice on its own task, with failures mapped at the boundary.
    async fn run_worker(
        &self,
        validator: Arc<Validator>,
        resolver: Arc<Resolver>,
        invoice: InvoiceContext,
        run: Arc<str>,
        timeout: Option<Duration>,
    ) -> InvoiceReport {
        let invoice_id = invoice.invoice_id.clone();
        let source_file = invoice.metadata.source_file.clone();

        let task_run = Arc::clone(&run);
        let handle = tokio::spawn(async move {
            let payload = validator.validate(&invoice).await;
            let resolution = resolver.resolve(&invoice, &payload, Some(&*task_run)).await?;
            Ok::<_, EngineError>(InvoiceReport::new(&invoice, payload, resolution))
        });
        let abort = handle.abort_handle();

        let joined = match timeout {
            None => handle.await,
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    let err = EngineError::Timeout {
                        invoice_id: invoice_id.clone(),
                        secs: limit.as_secs(),
                    };
                    return self.system_error(&invoice_id, source_file, &run, err).await;
                }
            },
        };

        let err = match joined {
            Ok(Ok(report)) => return report,
            Ok(Err(e)) => e,
            Err(join_error) => EngineError::Worker {
                invoice_id: invoice_id.clone(),
                reason: if join_error.is_panic() {
                    "evaluation panicked".to_string()
                } else {
                    join_error.to_string()
                },
            },
        };
        self.system_error(&invoice_id, source_file, &run, err).await
    }

    /// Synthetic ESCALATE report, with a best-effort audit row.
    async fn system_error(
        &self,
        invoice_id: &str,
        source_file: Option<String>,
        run: &str,
        err: EngineError,
    ) -> InvoiceReport {
        tracing::error!(invoice_id, "Invoice evaluation failed: {err:#}");
        if let Err(store_err) = self.store.append(invoice_id, Decision::Escalate, 0.0, Some(run)).await {
            tracing::warn!(invoice_id, "Could not record system-error decision: {store_err}");
        }
        InvoiceReport::system_error(invoice_id, source_file, err.to_string())
    }
}

/// Keep the first invoice per identifier, preserving order.
pub fn dedup_by_id(invoices: Vec<InvoiceContext>) -> Vec<InvoiceContext> {
    let mut seen = HashSet::new();
    invoices
        .into_iter()
        .filter(|invoice| {
            let first = seen.insert(invoice.invoice_id.clone());
            if !first {
                tracing::debug!(invoice_id = %invoice.invoice_id, "Dropping repeated invoice");
            }
            first
        })
        .collect()
}

fn summarize(run_id: String, reports: &[InvoiceReport], duplicates_dropped: usize, elapsed: Duration) -> BatchSummary {
    let count = |d: Decision| reports.iter().filter(|r| r.decision == d).count();
    let approved = count(Decision::Approve);
    BatchSummary {
        run_id,
        total_invoices: reports.len(),
        approved,
        approved_with_review: count(Decision::ApproveWithReview),
        escalated: count(Decision::Escalate),
        not_approved: reports.len() - approved,
        duplicates_dropped,
        processing_time_secs: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut first = InvoiceContext::new("INV-1");
        first.metadata.source_file = Some("a.json".into());
        let mut repeat = InvoiceContext::new("INV-1");
        repeat.metadata.source_file = Some("b.json".into());
        let kept = dedup_by_id(vec![first, InvoiceContext::new("INV-2"), repeat]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].metadata.source_file.as_deref(), Some("a.json"));
        assert_eq!(kept[1].invoice_id, "INV-2");
    }

    #[test]
    fn summary_counts() {
        let rows = vec![
            InvoiceReport::system_error("INV-1", None, "boom"),
            InvoiceReport::system_error("INV-2", None, "boom"),
        ];
        let s = summarize("run".into(), &rows, 1, Duration::from_millis(1234));
        assert_eq!(s.total_invoices, 2);
        assert_eq!(s.escalated, 2);
        assert_eq!(s.not_approved, 2);
        assert_eq!(s.approved, 0);
        assert_eq!(s.duplicates_dropped, 1);
        assert_eq!(s.processing_time_secs, 1.23);
    }
}
