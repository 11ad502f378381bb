//! Persistence and aggregation failures stay inside their phase.
//!
//! Draw upserts that committed are never rolled back by a later failure,
//! and a failed aggregation never fails the ingestion itself.

mod common;

use common::{history_csv, FlakyStore};
use loteria_core::{
    api::IngestResponse,
    config::{GameConfig, PipelineConfig},
    event::IngestEvent,
    pipeline::{AggregationOutcome, IngestPipeline},
};

// ─────────────────────────────────────────────────────────────────────────────
// Reconciliation write failures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn failed_upsert_batch_becomes_line_zero_error() {
    let store = FlakyStore::new();
    store.fail_upsert_of.set(Some(7));
    let game = GameConfig::quina();
    // upsert_batch = 5: batches are 1-5, 6-10, 11-15, 16-20.
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());

    let report = pipeline.ingest_text(&history_csv(&game, 1..=20, 3), None).unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].line, 0);
    assert!(report.errors[0].reason.contains("6..=10"));
    assert_eq!(store.inner.draw_count("quina").unwrap(), 15);
    assert!(store.inner.get_draw("quina", 7).unwrap().is_none());
    assert!(store.inner.get_draw("quina", 11).unwrap().is_some());
    // Stats reflect what actually landed.
    assert_eq!(
        report.aggregation,
        AggregationOutcome::Updated {
            draws_scanned: 15,
            studies_written: 20
        }
    );
}

#[test]
fn nothing_persisted_means_aggregation_is_skipped() {
    let store = FlakyStore::new();
    store.fail_all_upserts.set(true);
    let game = GameConfig::quina();
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());

    let report = pipeline.ingest_text(&history_csv(&game, 1..=6, 3), None).unwrap();

    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.aggregation, AggregationOutcome::SkippedNoDraws);
    let response = IngestResponse::from(&report);
    assert!(response.ok);
    assert!(!response.stats_updated);
    assert_eq!(response.aggregation.status, "skipped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregation failures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn scan_failure_keeps_committed_draws() {
    let store = FlakyStore::new();
    store.fail_scan.set(true);
    let game = GameConfig::mega_sena();
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());

    let report = pipeline.ingest_text(&history_csv(&game, 1..=12, 8), None).unwrap();

    assert!(matches!(
        &report.aggregation,
        AggregationOutcome::Failed { reason } if reason.contains("scan")
    ));
    assert_eq!(report.reconcile.inserted, 12);
    assert_eq!(store.inner.draw_count("megasena").unwrap(), 12);
    assert!(store.inner.number_stats("megasena").unwrap().is_empty());

    let response = IngestResponse::from(&report);
    assert!(response.ok);
    assert!(!response.stats_updated);
    assert!(!response.studies_updated);
    assert_eq!(response.aggregation.status, "failed");

    let events = store.inner.events_for_run(&report.run_id).unwrap();
    let last = events.last().unwrap().decode().unwrap();
    assert!(matches!(last, IngestEvent::AggregationFailed { .. }));
}

#[test]
fn study_write_failure_is_reported_not_raised() {
    let store = FlakyStore::new();
    *store.fail_study.borrow_mut() = Some("sum_range".into());
    let game = GameConfig::mega_sena();
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());

    let report = pipeline.ingest_text(&history_csv(&game, 1..=12, 8), None).unwrap();

    assert!(matches!(report.aggregation, AggregationOutcome::Failed { .. }));
    // Studies before the failing one were written; later ones were not.
    assert!(!store.inner.study_items("megasena", "pair_freq").unwrap().is_empty());
    assert!(store.inner.study_items("megasena", "parity").unwrap().is_empty());

    // A clean rerun repairs everything.
    *store.fail_study.borrow_mut() = None;
    let rerun = pipeline.ingest_text(&history_csv(&game, 1..=12, 8), None).unwrap();
    assert!(rerun.aggregation.studies_updated());
    assert!(!store.inner.study_items("megasena", "parity").unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit failures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn audit_failures_never_fail_ingestion() {
    let store = FlakyStore::new();
    store.fail_events.set(true);
    let game = GameConfig::quina();
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());

    let report = pipeline.ingest_text(&history_csv(&game, 1..=5, 1), None).unwrap();
    assert!(report.aggregation.stats_updated());
    assert!(store.inner.events_for_run(&report.run_id).unwrap().is_empty());
}
