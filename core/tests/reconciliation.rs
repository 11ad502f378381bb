//! Reconciliation against persisted history.
//!
//! 1. Window ∪ new-beyond-max scenario (100 stored, 105 incoming, window 20)
//! 2. Late corrections inside the window overwrite stored draws
//! 3. Corrections outside the window are left untouched
//! 4. Window clamping
//! 5. Batch boundaries do not change the counts

mod common;

use common::{header, history_csv, numbers_for, row, store};
use loteria_core::{
    config::{GameConfig, PipelineConfig},
    pipeline::IngestPipeline,
    reconciliation::reconcile,
    store::HistoryStore,
    tabular::parse_table,
    validator::validate,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: the reference scenario
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn window_and_new_draws_form_the_upsert_set() {
    let store = store();
    let game = GameConfig::mega_sena();
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());

    pipeline.ingest_text(&history_csv(&game, 1..=100, 5), None).unwrap();
    assert_eq!(store.max_contest_no("megasena").unwrap(), Some(100));

    let report = pipeline
        .ingest_text(&history_csv(&game, 1..=105, 5), Some(20))
        .unwrap();
    let r = &report.reconcile;

    assert_eq!(r.persisted_max_before, Some(100));
    assert_eq!(r.upsert_set, (86..=105).collect::<Vec<_>>());
    assert_eq!(r.inserted, 5);
    assert_eq!(r.updated, 15);
    assert_eq!(r.skipped, 85);
    assert_eq!(report.processed, 105);
    assert_eq!(store.draw_count("megasena").unwrap(), 105);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests 2 and 3: late corrections
// ─────────────────────────────────────────────────────────────────────────────

fn revised_history(game: &GameConfig, seed: u64, revised: &[i64]) -> String {
    let mut lines = vec![header(game)];
    for contest in 1..=30 {
        let winners = if revised.contains(&contest) { 4 } else { 0 };
        lines.push(row(game, contest, &numbers_for(game, contest, seed), winners));
    }
    lines.join("\n")
}

#[test]
fn corrections_inside_window_are_rewritten() {
    let store = store();
    let game = GameConfig::quina();
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());

    pipeline.ingest_text(&revised_history(&game, 9, &[]), None).unwrap();
    let report = pipeline
        .ingest_text(&revised_history(&game, 9, &[5, 28]), Some(10))
        .unwrap();

    assert_eq!(report.reconcile.updated, 10);
    assert_eq!(report.reconcile.inserted, 0);
    // Contest 28 is inside the trailing 10; contest 5 is not.
    let inside = store.get_draw("quina", 28).unwrap().unwrap();
    assert_eq!(inside.top_tier_winners, Some(4));
    assert!(!inside.is_rollover());
    let outside = store.get_draw("quina", 5).unwrap().unwrap();
    assert_eq!(outside.top_tier_winners, Some(0));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: clamping
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn window_is_clamped_to_bounds() {
    let store = store();
    let game = GameConfig::quina();
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default_test());
    let csv = history_csv(&game, 1..=150, 2);

    pipeline.ingest_text(&csv, None).unwrap();

    let report = pipeline.ingest_text(&csv, Some(5_000)).unwrap();
    assert_eq!(report.reconcile.window, 100);
    assert_eq!(report.reconcile.updated, 100);
    assert_eq!(report.reconcile.skipped, 50);

    let report = pipeline.ingest_text(&csv, Some(-3)).unwrap();
    assert_eq!(report.reconcile.window, 0);
    assert_eq!(report.reconcile.updated, 0);
    assert_eq!(report.reconcile.skipped, 150);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: batch sizes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn batch_sizes_do_not_change_counts() {
    let game = GameConfig::lotofacil();
    let first = history_csv(&game, 1..=60, 13);
    let second = history_csv(&game, 1..=75, 13);

    let mut counts = Vec::new();
    for cfg in [PipelineConfig::default(), PipelineConfig::default_test()] {
        let store = store();
        let records = validate(&parse_table(&first), &game).unwrap().records;
        reconcile(&store, "lotofacil", &records, 60, &cfg).unwrap();

        let records = validate(&parse_table(&second), &game).unwrap().records;
        let summary = reconcile(&store, "lotofacil", &records, 30, &cfg).unwrap();
        counts.push((summary.inserted, summary.updated, summary.skipped));
        assert_eq!(store.draw_count("lotofacil").unwrap(), 75);
    }
    assert_eq!(counts[0], (15, 15, 45));
    assert_eq!(counts[0], counts[1]);
}
