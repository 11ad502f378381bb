//! Reconciliation: decide which validated draws to write.
//!
//! Upsert set = trailing `window` incoming draws ∪ every draw above the
//! persisted maximum. Everything else is skipped on purpose. Write
//! failures are recorded as line-0 errors and never abort later batches.

use crate::{
    config::PipelineConfig,
    error::{IngestResult, RowError},
    store::{DrawRecord, HistoryStore},
    types::ContestNo,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileSummary {
    pub window: usize,
    pub persisted_max_before: Option<ContestNo>,
    /// Contests chosen for writing, ascending.
    pub upsert_set: Vec<ContestNo>,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

/// Pure selection step. Returns the chosen draws ascending by contest.
/// A contest appearing twice in the input keeps its last occurrence.
pub fn select_upserts(
    records: &[DrawRecord],
    window: usize,
    persisted_max: Option<ContestNo>,
) -> Vec<DrawRecord> {
    let by_contest: BTreeMap<ContestNo, &DrawRecord> =
        records.iter().map(|d| (d.contest_no, d)).collect();
    let total = by_contest.len();
    let window_start = total.saturating_sub(window);

    by_contest
        .values()
        .enumerate()
        .filter(|(idx, draw)| {
            *idx >= window_start || persisted_max.map_or(true, |max| draw.contest_no > max)
        })
        .map(|(_, draw)| (*draw).clone())
        .collect()
}

/// Classify and write the upsert set through `store` in bounded batches.
pub fn reconcile<S: HistoryStore + ?Sized>(
    store: &S,
    game: &str,
    records: &[DrawRecord],
    window: usize,
    cfg: &PipelineConfig,
) -> IngestResult<ReconcileSummary> {
    let persisted_max = store.max_contest_no(game)?;
    let upserts = select_upserts(records, window, persisted_max);
    let keys: Vec<ContestNo> = upserts.iter().map(|d| d.contest_no).collect();

    let mut errors = Vec::new();
    let mut existing: HashSet<ContestNo> = HashSet::new();
    for chunk in keys.chunks(cfg.existence_batch.max(1)) {
        match store.existing_contests(game, chunk) {
            Ok(found) => existing.extend(found),
            Err(e) => {
                log::warn!("game={game} reconcile: existence check failed: {e}");
                errors.push(RowError::new(0, format!("existence check failed: {e}")));
            }
        }
    }

    for batch in upserts.chunks(cfg.upsert_batch.max(1)) {
        if let Err(e) = store.upsert_draws(game, batch) {
            let (first, last) = (batch[0].contest_no, batch[batch.len() - 1].contest_no);
            log::warn!("game={game} reconcile: upsert {first}..={last} failed: {e}");
            errors.push(RowError::new(
                0,
                format!("upsert of contests {first}..={last} failed: {e}"),
            ));
        } else {
            log::debug!("game={game} reconcile: upserted {} draws", batch.len());
        }
    }

    let updated = existing.len();
    let summary = ReconcileSummary {
        window,
        persisted_max_before: persisted_max,
        inserted: keys.len() - updated,
        updated,
        skipped: records.len().saturating_sub(keys.len()),
        upsert_set: keys,
        errors,
    };

    log::info!(
        "game={game} reconcile: {} inserted, {} updated, {} skipped",
        summary.inserted,
        summary.updated,
        summary.skipped
    );
    Ok(summary)
}
