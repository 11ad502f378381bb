//! Shared fixtures: seeded synthetic histories and a fault-injecting store.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use loteria_core::{
    config::GameConfig,
    error::{IngestError, IngestResult},
    event::IngestEventEntry,
    store::{DrawRecord, HistoryStore, LotteryStore, NumberStat, Study, StudyItem},
    types::{ContestNo, Number},
};
use rand::{seq::index::sample, Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::cell::{Cell, RefCell};
use std::ops::RangeInclusive;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn store() -> LotteryStore {
    init_logging();
    let store = LotteryStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

pub fn header(game: &GameConfig) -> String {
    let mut cols = vec!["Concurso".to_string(), "Data Sorteio".to_string()];
    cols.extend((1..=game.draw_size).map(|i| format!("Bola{i}")));
    cols.push(format!("Ganhadores {} acertos", game.top_tier_hits));
    cols.push(format!("Acumulado {} acertos", game.top_tier_hits));
    cols.join(";")
}

pub fn date_for(contest: ContestNo) -> String {
    let base = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
    (base + Duration::days(contest * 3)).format("%d/%m/%Y").to_string()
}

/// Deterministic random draw for `contest`.
pub fn numbers_for(game: &GameConfig, contest: ContestNo, seed: u64) -> Vec<Number> {
    let mut rng = Pcg64Mcg::seed_from_u64(seed ^ (contest as u64).wrapping_mul(0x9E37_79B9));
    let mut numbers: Vec<Number> = sample(&mut rng, usize::from(game.domain_max), game.draw_size)
        .into_iter()
        .map(|i| i as Number + 1)
        .collect();
    numbers.sort_unstable();
    numbers
}

pub fn row(game: &GameConfig, contest: ContestNo, numbers: &[Number], winners: i64) -> String {
    let mut cols = vec![contest.to_string(), date_for(contest)];
    cols.extend(numbers.iter().map(|n| n.to_string()));
    cols.push(winners.to_string());
    cols.push(if winners == 0 {
        "R$ 1.250.000,00".to_string()
    } else {
        "0,00".to_string()
    });
    debug_assert_eq!(cols.len(), game.draw_size + 4);
    cols.join(";")
}

/// A full CSV export for `contests`, seeded.
pub fn history_csv(game: &GameConfig, contests: RangeInclusive<ContestNo>, seed: u64) -> String {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut lines = vec![header(game)];
    for contest in contests {
        let winners = rng.gen_range(0..3);
        lines.push(row(game, contest, &numbers_for(game, contest, seed), winners));
    }
    lines.join("\n") + "\n"
}

// ── Fault injection ────────────────────────────────────────────────

fn injected(what: &str) -> IngestError {
    IngestError::Other(anyhow::anyhow!("injected failure: {what}"))
}

/// Delegates to a real store, failing selected calls on demand.
pub struct FlakyStore {
    pub inner: LotteryStore,
    /// Upsert batches containing this contest fail.
    pub fail_upsert_of: Cell<Option<ContestNo>>,
    pub fail_all_upserts: Cell<bool>,
    pub fail_scan: Cell<bool>,
    pub fail_study: RefCell<Option<String>>,
    pub fail_events: Cell<bool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: store(),
            fail_upsert_of: Cell::new(None),
            fail_all_upserts: Cell::new(false),
            fail_scan: Cell::new(false),
            fail_study: RefCell::new(None),
            fail_events: Cell::new(false),
        }
    }
}

impl HistoryStore for FlakyStore {
    fn max_contest_no(&self, game: &str) -> IngestResult<Option<ContestNo>> {
        self.inner.max_contest_no(game)
    }

    fn existing_contests(&self, game: &str, contests: &[ContestNo]) -> IngestResult<Vec<ContestNo>> {
        self.inner.existing_contests(game, contests)
    }

    fn upsert_draws(&self, game: &str, draws: &[DrawRecord]) -> IngestResult<usize> {
        if self.fail_all_upserts.get() {
            return Err(injected("upsert"));
        }
        if let Some(bad) = self.fail_upsert_of.get() {
            if draws.iter().any(|d| d.contest_no == bad) {
                return Err(injected("upsert"));
            }
        }
        self.inner.upsert_draws(game, draws)
    }

    fn scan_draws(
        &self,
        game: &str,
        after: Option<ContestNo>,
        limit: usize,
    ) -> IngestResult<Vec<DrawRecord>> {
        if self.fail_scan.get() {
            return Err(injected("scan"));
        }
        self.inner.scan_draws(game, after, limit)
    }

    fn replace_number_stats(&self, game: &str, stats: &[NumberStat]) -> IngestResult<()> {
        self.inner.replace_number_stats(game, stats)
    }

    fn replace_study(
        &self,
        game: &str,
        study: &Study,
        items: &[StudyItem],
        batch_size: usize,
    ) -> IngestResult<()> {
        if self.fail_study.borrow().as_deref() == Some(study.study_key.as_str()) {
            return Err(injected("study"));
        }
        self.inner.replace_study(game, study, items, batch_size)
    }

    fn try_acquire_ingest_lock(
        &self,
        game: &str,
        owner: &str,
        now: i64,
        ttl_secs: i64,
    ) -> IngestResult<bool> {
        self.inner.try_acquire_ingest_lock(game, owner, now, ttl_secs)
    }

    fn release_ingest_lock(&self, game: &str, owner: &str) -> IngestResult<()> {
        self.inner.release_ingest_lock(game, owner)
    }

    fn append_event(&self, entry: &IngestEventEntry) -> IngestResult<()> {
        if self.fail_events.get() {
            return Err(injected("audit"));
        }
        self.inner.append_event(entry)
    }
}
