//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Pipeline stages go through the `HistoryStore` contract; they never
//! execute SQL directly. Every table is keyed by `game` first, so one
//! database file holds the history of every variant.

mod draws;
mod ingest_log;
mod stats;
mod studies;

use crate::{
    error::IngestResult,
    event::IngestEventEntry,
    types::{ContestNo, Number},
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

// ── Records ────────────────────────────────────────────────────────

/// One validated contest. `numbers` holds exactly k distinct values in
/// `[1, D]`, sorted ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub contest_no: ContestNo,
    pub draw_date: NaiveDate,
    pub numbers: Vec<Number>,
    pub top_tier_winners: Option<i64>,
    pub top_tier_prize: Option<f64>,
    pub accumulated_amount: Option<f64>,
    pub total_collected: Option<f64>,
    pub next_prize_estimate: Option<f64>,
    pub note: Option<String>,
}

impl DrawRecord {
    pub fn new(contest_no: ContestNo, draw_date: NaiveDate, numbers: Vec<Number>) -> Self {
        Self {
            contest_no,
            draw_date,
            numbers,
            top_tier_winners: None,
            top_tier_prize: None,
            accumulated_amount: None,
            total_collected: None,
            next_prize_estimate: None,
            note: None,
        }
    }

    /// No top-tier winner: the jackpot rolls over to the next contest.
    pub fn is_rollover(&self) -> bool {
        match self.top_tier_winners {
            Some(winners) => winners == 0,
            None => self.accumulated_amount.is_some_and(|a| a > 0.0),
        }
    }
}

/// Per-number statistics snapshot. Never patched, only replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberStat {
    pub number: Number,
    pub times_drawn: u64,
    /// `times_drawn / total_draws`.
    pub pct_of_draws: f64,
    pub total_draws: u64,
    pub times_drawn_recent: u64,
    pub last_contest: Option<ContestNo>,
    pub overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub study_key: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyItem {
    pub study_key: String,
    pub item_key: String,
    /// 1-based, contiguous within a study.
    pub rank: u32,
    pub value: f64,
    pub extra: Option<serde_json::Value>,
}

// ── Store contract ─────────────────────────────────────────────────

/// Everything the ingestion pipeline needs from persistent storage.
///
/// Batch sizes are the caller's business: `existing_contests` and
/// `upsert_draws` receive one bounded batch per call, `scan_draws` one
/// page. `replace_*` methods are atomic per call.
pub trait HistoryStore {
    fn max_contest_no(&self, game: &str) -> IngestResult<Option<ContestNo>>;

    fn existing_contests(&self, game: &str, contests: &[ContestNo]) -> IngestResult<Vec<ContestNo>>;

    fn upsert_draws(&self, game: &str, draws: &[DrawRecord]) -> IngestResult<usize>;

    /// Ascending by `contest_no`, strictly after `after` (keyset paging).
    fn scan_draws(
        &self,
        game: &str,
        after: Option<ContestNo>,
        limit: usize,
    ) -> IngestResult<Vec<DrawRecord>>;

    fn replace_number_stats(&self, game: &str, stats: &[NumberStat]) -> IngestResult<()>;

    /// Upsert the catalog header, delete prior items, insert `items` in
    /// batches of `batch_size`.
    fn replace_study(
        &self,
        game: &str,
        study: &Study,
        items: &[StudyItem],
        batch_size: usize,
    ) -> IngestResult<()>;

    /// Returns false when another owner holds a lock younger than `ttl_secs`.
    fn try_acquire_ingest_lock(
        &self,
        game: &str,
        owner: &str,
        now: i64,
        ttl_secs: i64,
    ) -> IngestResult<bool>;

    fn release_ingest_lock(&self, game: &str, owner: &str) -> IngestResult<()>;

    fn append_event(&self, entry: &IngestEventEntry) -> IngestResult<()>;
}

// ── SQLite implementation ──────────────────────────────────────────

pub struct LotteryStore {
    conn: Connection,
}

impl LotteryStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> IngestResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> IngestResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> IngestResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_draws.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_number_stats.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_studies.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_ingest_log.sql"))?;
        Ok(())
    }
}

impl HistoryStore for LotteryStore {
    fn max_contest_no(&self, game: &str) -> IngestResult<Option<ContestNo>> {
        self.max_contest(game)
    }

    fn existing_contests(&self, game: &str, contests: &[ContestNo]) -> IngestResult<Vec<ContestNo>> {
        self.contests_present(game, contests)
    }

    fn upsert_draws(&self, game: &str, draws: &[DrawRecord]) -> IngestResult<usize> {
        self.upsert_draw_batch(game, draws)
    }

    fn scan_draws(
        &self,
        game: &str,
        after: Option<ContestNo>,
        limit: usize,
    ) -> IngestResult<Vec<DrawRecord>> {
        self.draws_after(game, after, limit)
    }

    fn replace_number_stats(&self, game: &str, stats: &[NumberStat]) -> IngestResult<()> {
        self.write_number_stats(game, stats)
    }

    fn replace_study(
        &self,
        game: &str,
        study: &Study,
        items: &[StudyItem],
        batch_size: usize,
    ) -> IngestResult<()> {
        self.write_study(game, study, items, batch_size)
    }

    fn try_acquire_ingest_lock(
        &self,
        game: &str,
        owner: &str,
        now: i64,
        ttl_secs: i64,
    ) -> IngestResult<bool> {
        self.acquire_lock(game, owner, now, ttl_secs)
    }

    fn release_ingest_lock(&self, game: &str, owner: &str) -> IngestResult<()> {
        self.release_lock(game, owner)
    }

    fn append_event(&self, entry: &IngestEventEntry) -> IngestResult<()> {
        self.insert_event(entry)
    }
}
