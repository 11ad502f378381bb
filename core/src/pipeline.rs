//! The ingestion pipeline: one synchronous run per request.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Acquire the per-game ingest lock
//!   2. Parse         (tabular)
//!   3. Validate      (validator)
//!   4. Reconcile     (reconciliation)
//!   5. Aggregate     (aggregation, full replay)
//!   6. Write studies (study_writer)
//!   7. Release the lock (guard drop)
//!
//! RULES:
//!   - Steps 2-4 fail the run with `Err`. Step 4 only fails on the
//!     initial max-key read; batch write failures become line-0 errors.
//!   - Steps 5-6 never fail the run. Their outcome is reported as an
//!     `AggregationOutcome`; committed draw upserts are never rolled back.
//!   - Each stage appends one audit event. Audit failures are logged only.

use crate::{
    aggregation::AggregationScan,
    api::IngestRequest,
    config::{GameConfig, PipelineConfig},
    error::{IngestError, IngestResult, RowError},
    event::{IngestEvent, IngestEventEntry},
    reconciliation::{reconcile, ReconcileSummary},
    store::HistoryStore,
    study_writer::write_studies,
    tabular::parse_table,
    types::RunId,
    validator::validate,
};
use serde::Serialize;
use uuid::Uuid;

/// Result of steps 5-6.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AggregationOutcome {
    Updated {
        draws_scanned: u64,
        studies_written: usize,
    },
    SkippedNoDraws,
    Failed {
        reason: String,
    },
}

impl AggregationOutcome {
    pub fn stats_updated(&self) -> bool {
        matches!(self, AggregationOutcome::Updated { .. })
    }

    pub fn studies_updated(&self) -> bool {
        matches!(self, AggregationOutcome::Updated { .. })
    }

    fn to_event(&self) -> IngestEvent {
        match self {
            AggregationOutcome::Updated {
                draws_scanned,
                studies_written,
            } => IngestEvent::AggregationCompleted {
                draws_scanned: *draws_scanned,
                studies_written: *studies_written,
            },
            AggregationOutcome::SkippedNoDraws => IngestEvent::AggregationSkipped {
                reason: "no draws persisted".into(),
            },
            AggregationOutcome::Failed { reason } => IngestEvent::AggregationFailed {
                reason: reason.clone(),
            },
        }
    }
}

/// Everything one successful run produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_id: RunId,
    pub game: String,
    /// Valid rows after validation.
    pub processed: usize,
    pub blank_rows: usize,
    /// Row-level rejections followed by line-0 persistence errors.
    pub errors: Vec<RowError>,
    pub reconcile: ReconcileSummary,
    pub aggregation: AggregationOutcome,
}

// ── Ingest lock guard ──────────────────────────────────────────────

/// Holds the per-game lock; releases it on drop.
struct IngestLock<'a, S: HistoryStore + ?Sized> {
    store: &'a S,
    game: &'a str,
    owner: &'a str,
}

impl<'a, S: HistoryStore + ?Sized> IngestLock<'a, S> {
    fn acquire(store: &'a S, game: &'a str, owner: &'a str, ttl_secs: i64) -> IngestResult<Self> {
        let now = chrono::Utc::now().timestamp();
        if !store.try_acquire_ingest_lock(game, owner, now, ttl_secs)? {
            log::warn!("game={game} lock: ingestion already in progress");
            return Err(IngestError::IngestInProgress {
                game: game.to_string(),
            });
        }
        Ok(Self { store, game, owner })
    }
}

impl<S: HistoryStore + ?Sized> Drop for IngestLock<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release_ingest_lock(self.game, self.owner) {
            log::warn!("game={} lock: release failed: {e}", self.game);
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

pub struct IngestPipeline<'a, S: HistoryStore + ?Sized> {
    store: &'a S,
    game: &'a GameConfig,
    cfg: PipelineConfig,
}

impl<'a, S: HistoryStore + ?Sized> IngestPipeline<'a, S> {
    pub fn new(store: &'a S, game: &'a GameConfig, cfg: PipelineConfig) -> Self {
        Self { store, game, cfg }
    }

    pub fn ingest(&self, request: &IngestRequest) -> IngestResult<IngestReport> {
        self.ingest_text(&request.csv_text, request.reconcile_last_n)
    }

    pub fn ingest_text(&self, csv_text: &str, reconcile_last_n: Option<i64>) -> IngestResult<IngestReport> {
        let game_id = self.game.game_id.as_str();
        let run_id: RunId = Uuid::new_v4().to_string();
        let window = self.cfg.clamp_window(reconcile_last_n);

        // 1. Lock
        let _lock = IngestLock::acquire(self.store, game_id, &run_id, self.cfg.lock_ttl_secs)?;
        log::info!("game={game_id} run {run_id}: started, reconcile window {window}");
        self.emit(
            &run_id,
            &IngestEvent::RunStarted {
                run_id: run_id.clone(),
                game: game_id.to_string(),
                reconcile_window: window,
            },
        );

        // 2-3. Parse and validate
        if csv_text.trim().is_empty() {
            return Err(IngestError::EmptyInput);
        }
        let table = parse_table(csv_text);
        let batch = validate(&table, self.game)?;
        self.emit(
            &run_id,
            &IngestEvent::RowsValidated {
                valid: batch.records.len(),
                rejected: batch.errors.len(),
                blank: batch.blank_rows,
            },
        );

        // 4. Reconcile
        let summary = reconcile(self.store, game_id, &batch.records, window, &self.cfg)?;
        self.emit(
            &run_id,
            &IngestEvent::ReconciliationCompleted {
                inserted: summary.inserted,
                updated: summary.updated,
                skipped: summary.skipped,
                write_errors: summary.errors.len(),
                persisted_max_before: summary.persisted_max_before,
            },
        );

        // 5-6. Aggregate and write studies
        let aggregation = self.aggregate();
        self.emit(&run_id, &aggregation.to_event());

        let mut errors = batch.errors;
        errors.extend(summary.errors.iter().cloned());

        log::info!(
            "game={game_id} run {run_id}: {} processed, {} errors, aggregation {:?}",
            batch.records.len(),
            errors.len(),
            aggregation
        );

        Ok(IngestReport {
            run_id: run_id.clone(),
            game: game_id.to_string(),
            processed: batch.records.len(),
            blank_rows: batch.blank_rows,
            errors,
            reconcile: summary,
            aggregation,
        })
    }

    /// Full replay plus study rewrite. Never returns `Err`.
    pub fn aggregate(&self) -> AggregationOutcome {
        match self.try_aggregate() {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("game={} aggregate: failed: {e}", self.game.game_id);
                AggregationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_aggregate(&self) -> IngestResult<AggregationOutcome> {
        let game_id = self.game.game_id.as_str();
        let tables = AggregationScan::new(self.store, self.game, self.cfg.scan_page)?.run_to_end()?;
        if tables.total_draws == 0 {
            log::info!("game={game_id} aggregate: no draws, skipped");
            return Ok(AggregationOutcome::SkippedNoDraws);
        }

        self.store.replace_number_stats(game_id, &tables.number_stats)?;
        let studies_written =
            write_studies(self.store, self.game, &tables, self.cfg.study_item_batch)?;

        log::info!(
            "game={game_id} aggregate: {} draws scanned, last contest {:?}",
            tables.total_draws,
            tables.last_contest
        );
        Ok(AggregationOutcome::Updated {
            draws_scanned: tables.total_draws,
            studies_written,
        })
    }

    fn emit(&self, run_id: &str, event: &IngestEvent) {
        let appended = IngestEventEntry::from_event(run_id, &self.game.game_id, event)
            .map_err(IngestError::from)
            .and_then(|entry| self.store.append_event(&entry));
        if let Err(e) = appended {
            log::warn!(
                "game={} audit: could not record {}: {e}",
                self.game.game_id,
                event.type_name()
            );
        }
    }
}
