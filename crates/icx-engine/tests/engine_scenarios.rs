//! End-to-end decision scenarios against a scripted tax authority and an
//! in-memory decision store.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use icx_client::{StaticTaxAuthority, VendorRegistry};
use icx_core::check_ids;
use icx_core::{CheckCategory, Decision, EngineConfig};
use icx_engine::{conflict, Orchestrator};
use icx_store::{DecisionStore, PriorDecision};

async fn store() -> Arc<DecisionStore> {
    Arc::new(DecisionStore::in_memory().await.unwrap())
}

#[tokio::test]
async fn clean_invoice_is_approved() {
    let store = store().await;
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), Arc::clone(&store));

    let outcome = engine.run(vec![clean_invoice("INV-2024-001")]).await;
    let report = &outcome.reports[0];

    assert_eq!(report.decision, Decision::Approve, "{report:#?}");
    assert!(report.failed_checks.is_empty());
    assert!(report.review_flags.is_empty());
    assert!(!report.escalation_required);
    assert_eq!(report.final_confidence, 1.0);
    assert_eq!(outcome.summary.approved, 1);
    assert_eq!(store.count_for("INV-2024-001").await.unwrap(), 1);
}

#[tokio::test]
async fn unregistered_seller_escalates_without_later_categories() {
    let authority = ScriptedAuthority::new().script_tax_id(SELLER, not_found()).shared();
    let engine = Orchestrator::new(EngineConfig::default(), authority.clone(), store().await);

    let outcome = engine.run(vec![clean_invoice("INV-2024-002")]).await;
    let report = &outcome.reports[0];

    assert_eq!(report.decision, Decision::Escalate);
    assert!(report.escalation_required);
    assert_eq!(report.failed_checks, vec![check_ids::TAX_SELLER_REGISTRATION]);
    assert_eq!(report.first_finding.as_deref(), Some("GSTIN not registered"));
    assert_eq!(report.conflicts, vec![conflict::CRITICAL_TAX_FAILURE]);
    assert!(report
        .results
        .iter()
        .all(|r| !matches!(r.category, CheckCategory::Arithmetic | CheckCategory::Policy | CheckCategory::DocumentAuthenticity)));

    // Fail-fast: no later lookup ran.
    assert_eq!(authority.tariff_calls.load(Ordering::SeqCst), 0);
    assert_eq!(authority.e_invoice_calls.load(Ordering::SeqCst), 0);
    assert_eq!(authority.special_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn suspended_seller_gets_distinct_reason() {
    let inner = StaticTaxAuthority::new(VendorRegistry::default())
        .with_vendor(SELLER, "Acme Consulting LLP", "27")
        .with_vendor_status(SELLER, "SUSPENDED");
    let engine = Orchestrator::new(
        EngineConfig::default(),
        ScriptedAuthority::new().with_inner(inner).shared(),
        store().await,
    );

    let report = engine.run(vec![clean_invoice("INV-2024-003")]).await.reports.remove(0);
    assert_eq!(report.decision, Decision::Escalate);
    assert_eq!(report.first_finding.as_deref(), Some("GSTIN SUSPENDED"));
    assert_eq!(report.results.len(), 1);
}

#[tokio::test]
async fn registration_outage_is_a_blocking_review() {
    let authority = ScriptedAuthority::new().script_tax_id(SELLER, server_error()).shared();
    let engine = Orchestrator::new(EngineConfig::default(), authority.clone(), store().await);

    let report = engine.run(vec![clean_invoice("INV-2024-004")]).await.reports.remove(0);

    assert_eq!(report.decision, Decision::ApproveWithReview, "{report:#?}");
    assert_eq!(report.review_flags, vec![check_ids::TAX_SELLER_REGISTRATION]);
    assert!(report.failed_checks.is_empty());
    assert!(report.final_confidence >= 0.7);
    // The chain kept going after the downgrade.
    assert_eq!(authority.tariff_calls.load(Ordering::SeqCst), 1);
    assert_eq!(authority.special_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_rate_limit_downgrades_to_review() {
    let authority = ScriptedAuthority::new().script_tax_id(SELLER, Script::RateLimited).shared();
    let engine = Orchestrator::new(EngineConfig::default(), authority, store().await);

    let report = engine.run(vec![clean_invoice("INV-2024-005")]).await.reports.remove(0);
    assert_eq!(report.decision, Decision::ApproveWithReview);
    let downgraded = report
        .results
        .iter()
        .find(|r| r.check_id == check_ids::TAX_SELLER_REGISTRATION)
        .unwrap();
    assert!(downgraded.reason.as_deref().unwrap().contains("rate limit"));
}

#[tokio::test]
async fn tariff_mismatch_stops_at_first_bad_line() {
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), store().await);
    let mut invoice = clean_invoice("INV-2024-006");
    let mut wrong = invoice.line_items[0].clone();
    wrong.cgst_rate = Some(icx_core::Amount::from_int(6));
    wrong.sgst_rate = Some(icx_core::Amount::from_int(6));
    invoice.line_items = vec![wrong.clone(), wrong];

    let report = engine.run(vec![invoice]).await.reports.remove(0);
    assert_eq!(report.decision, Decision::Escalate);
    let tariff: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.check_id == check_ids::TAX_TARIFF_RATE)
        .collect();
    assert_eq!(tariff.len(), 1, "second line is not examined");
    assert!(tariff[0].is_fail());
    assert_eq!(report.results.last().unwrap().check_id, check_ids::TAX_TARIFF_RATE);
}

#[tokio::test]
async fn missing_reference_on_high_value_invoice_fails() {
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), store().await);
    let mut invoice = clean_invoice("INV-2024-007");
    invoice.invoice_value = Some(icx_core::Amount::from_int(600_000));

    let report = engine.run(vec![invoice]).await.reports.remove(0);
    assert_eq!(report.decision, Decision::Escalate);
    assert_eq!(report.failed_checks, vec![check_ids::TAX_E_INVOICE_REQUIRED]);
}

#[tokio::test]
async fn special_withholding_is_advisory() {
    let inner = StaticTaxAuthority::new(VendorRegistry::default())
        .with_vendor(SELLER, "Acme Consulting LLP", "27")
        .with_special_withholding("AAPFU0939F");
    let engine = Orchestrator::new(
        EngineConfig::default(),
        ScriptedAuthority::new().with_inner(inner).shared(),
        store().await,
    );

    let report = engine.run(vec![clean_invoice("INV-2024-008")]).await.reports.remove(0);
    // Withholding REVIEW is not a blocking review.
    assert_eq!(report.decision, Decision::Approve, "{report:#?}");
    assert!(report.failed_checks.is_empty());
    assert_eq!(report.review_flags, vec![check_ids::WITHHOLDING_SPECIAL_RATE]);
}

#[tokio::test]
async fn policy_failure_escalates_after_full_evaluation() {
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), store().await);
    let mut invoice = clean_invoice("INV-2024-009");
    invoice.vendor_approved = Some(false);

    let report = engine.run(vec![invoice]).await.reports.remove(0);
    assert_eq!(report.decision, Decision::Escalate);
    assert_eq!(report.failed_checks, vec![check_ids::POLICY_APPROVED_VENDOR]);
    // A lone non-tax FAIL is not a conflict.
    assert!(report.conflicts.is_empty());
    assert!(report.results.iter().any(|r| r.category == CheckCategory::Arithmetic));
}

#[tokio::test]
async fn repeated_identifier_yields_one_report_and_one_row() {
    let store = store().await;
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), Arc::clone(&store));

    let outcome = engine
        .run(vec![clean_invoice("INV-2024-010"), clean_invoice("INV-2024-010")])
        .await;

    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.summary.total_invoices, 1);
    assert_eq!(outcome.summary.duplicates_dropped, 1);
    assert_eq!(store.count_for("INV-2024-010").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_worker_becomes_system_error() {
    let store = store().await;
    let authority = ScriptedAuthority::new().script_tax_id("29AAACB1234C1Z5", Script::Panic).shared();
    let engine = Orchestrator::new(EngineConfig::default(), authority, Arc::clone(&store));

    let mut bad = clean_invoice("INV-2024-011");
    bad.seller_tax_id = Some("29AAACB1234C1Z5".into());
    let outcome = engine.run(vec![bad, clean_invoice("INV-2024-012")]).await;

    assert_eq!(outcome.reports.len(), 2);
    let failed = &outcome.reports[0];
    assert!(failed.is_system_error());
    assert_eq!(failed.decision, Decision::Escalate);
    assert_eq!(failed.final_confidence, 0.0);
    assert!(failed.primary_reason.contains("INV-2024-011"));
    assert_eq!(outcome.reports[1].invoice_id, "INV-2024-012");
    assert!(!outcome.reports[1].is_system_error());

    let row = store.latest_for("INV-2024-011").await.unwrap().unwrap();
    assert_eq!(row.decision, Decision::Escalate);
    assert_eq!(row.confidence, 0.0);
}

#[tokio::test]
async fn stalled_invoice_times_out() {
    let authority = ScriptedAuthority::new()
        .script_tax_id(SELLER, Script::Stall(Duration::from_secs(30)))
        .shared();
    let config = EngineConfig {
        invoice_timeout_secs: Some(1),
        ..EngineConfig::default()
    };
    let engine = Orchestrator::new(config, authority, store().await);

    let report = engine.run(vec![clean_invoice("INV-2024-013")]).await.reports.remove(0);
    assert!(report.is_system_error());
    assert!(report.primary_reason.contains("timed out"));
}

#[tokio::test]
async fn prior_approval_with_current_fail_is_flagged() {
    let store = store().await;
    store
        .import_history(&[PriorDecision {
            invoice_id: "INV-2024-014".into(),
            decision: Decision::Approve,
            confidence: 0.95,
            recorded_at: None,
        }])
        .await
        .unwrap();
    let explainer = Arc::new(RecordingExplainer::default());
    let authority = ScriptedAuthority::new().script_tax_id(SELLER, not_found()).shared();
    let engine = Orchestrator::new(EngineConfig::default(), authority, Arc::clone(&store))
        .with_explainer(explainer.clone());

    let report = engine.run(vec![clean_invoice("INV-2024-014")]).await.reports.remove(0);

    assert_eq!(report.decision, Decision::Escalate);
    assert!(report.deviated_from_history);
    assert!(report.conflicts.iter().any(|c| c == conflict::HISTORICAL_DEVIATION));
    assert_eq!(report.explanation.len(), 2);

    let requests = explainer.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.counterparty_id.as_deref(), Some(SELLER));
    assert!(requests[0].1.iter().any(|c| c == conflict::HISTORICAL_DEVIATION));
    drop(requests);

    assert_eq!(store.count_for("INV-2024-014").await.unwrap(), 2);
}

#[tokio::test]
async fn explainer_failure_leaves_explanation_empty() {
    let explainer = Arc::new(RecordingExplainer {
        fail: true,
        ..RecordingExplainer::default()
    });
    let authority = ScriptedAuthority::new().script_tax_id(SELLER, not_found()).shared();
    let engine = Orchestrator::new(EngineConfig::default(), authority, store().await).with_explainer(explainer.clone());

    let report = engine.run(vec![clean_invoice("INV-2024-015")]).await.reports.remove(0);
    assert_eq!(report.decision, Decision::Escalate);
    assert!(report.explanation.is_empty());
    assert_eq!(explainer.requests.lock().len(), 1);
}

#[tokio::test]
async fn approved_invoice_does_not_call_explainer() {
    let explainer = Arc::new(RecordingExplainer::default());
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), store().await)
        .with_explainer(explainer.clone());

    let report = engine.run(vec![clean_invoice("INV-2024-016")]).await.reports.remove(0);
    assert_eq!(report.decision, Decision::Approve);
    assert!(explainer.requests.lock().is_empty());
}

#[tokio::test]
async fn empty_batch_still_summarises() {
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), store().await);
    let outcome = engine.run(Vec::new()).await;
    assert!(outcome.reports.is_empty());
    assert_eq!(outcome.summary.total_invoices, 0);
    assert!(!outcome.summary.run_id.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_invoice_in_a_large_batch_gets_one_row() {
    // Ascending numbers from one seller; the sequence check must pass all of
    // them however the workers interleave.
    for _ in 0..3 {
        let store = store().await;
        let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), Arc::clone(&store));
        let invoices: Vec<_> = (0..25).map(|i| clean_invoice(&format!("INV-2024-{i:03}"))).collect();

        let outcome = engine.run(invoices).await;
        assert_eq!(outcome.reports.len(), 25);
        assert_eq!(store.len().await.unwrap(), 25);
        // Reports come back in submission order.
        assert_eq!(outcome.reports[7].invoice_id, "INV-2024-007");
        for report in &outcome.reports {
            assert_eq!(report.decision, Decision::Approve, "{report:#?}");
        }
        assert_eq!(outcome.summary.approved, 25);
    }
}

#[tokio::test]
async fn out_of_order_number_in_batch_is_flagged() {
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), store().await);
    let outcome = engine
        .run(vec![
            clean_invoice("INV-2024-030"),
            clean_invoice("INV-2024-020"),
            clean_invoice("INV-2024-031"),
        ])
        .await;

    assert_eq!(outcome.reports[0].decision, Decision::Approve);
    assert!(outcome.reports[1]
        .failed_checks
        .iter()
        .any(|id| id == check_ids::DOCUMENT_SEQUENCE));
    assert_eq!(outcome.reports[2].decision, Decision::Approve);
}

#[tokio::test]
async fn invoice_decided_by_an_earlier_run_is_a_duplicate() {
    let store = store().await;
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), Arc::clone(&store));

    let first = engine.run(vec![clean_invoice("INV-2024-040")]).await;
    assert_eq!(first.reports[0].decision, Decision::Approve);

    let second = engine
        .run(vec![clean_invoice("INV-2024-040"), clean_invoice("INV-2024-041")])
        .await;
    let resubmitted = &second.reports[0];
    assert_eq!(resubmitted.decision, Decision::Escalate, "{resubmitted:#?}");
    assert!(resubmitted
        .failed_checks
        .iter()
        .any(|id| id == check_ids::DOCUMENT_DUPLICATE));
    assert_eq!(second.reports[1].decision, Decision::Approve);
    assert_eq!(store.count_for("INV-2024-040").await.unwrap(), 2);
}

#[tokio::test]
async fn imported_history_counts_as_an_earlier_run() {
    let store = store().await;
    store
        .import_history(&[PriorDecision {
            invoice_id: "INV-2024-050".into(),
            decision: Decision::Approve,
            confidence: 0.9,
            recorded_at: None,
        }])
        .await
        .unwrap();
    let engine = Orchestrator::new(EngineConfig::default(), ScriptedAuthority::new().shared(), store);

    let report = engine.run(vec![clean_invoice("INV-2024-050")]).await.reports.remove(0);
    assert!(report
        .failed_checks
        .iter()
        .any(|id| id == check_ids::DOCUMENT_DUPLICATE));
    assert_ne!(report.decision, Decision::Approve);
}
