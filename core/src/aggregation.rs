//! Aggregation engine: one ascending full-history replay.
//!
//! RULES:
//!   - Every metric accumulates in a single pass over the scan.
//!   - All state lives in `StatsAccumulator`, created per run and consumed
//!     by `finish()`. Nothing is held between runs.
//!   - Scan order matters: repeaters compare each draw with the one
//!     scanned right before it.

use crate::{
    config::GameConfig,
    error::IngestResult,
    store::{DrawRecord, HistoryStore, NumberStat},
    types::{ContestNo, Number},
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ── Per-draw metrics ───────────────────────────────────────────────

/// `(evens, odds)`.
pub fn parity_counts(numbers: &[Number]) -> (usize, usize) {
    let evens = numbers.iter().filter(|&&n| n % 2 == 0).count();
    (evens, numbers.len() - evens)
}

/// `(low, high)` where low means `n <= midpoint`.
pub fn high_low_counts(numbers: &[Number], midpoint: Number) -> (usize, usize) {
    let low = numbers.iter().filter(|&&n| n <= midpoint).count();
    (low, numbers.len() - low)
}

/// Number of distinct pairwise absolute differences.
pub fn ac_value(numbers: &[Number]) -> usize {
    let mut diffs: Vec<Number> = Vec::with_capacity(numbers.len() * numbers.len() / 2);
    for (i, &a) in numbers.iter().enumerate() {
        for &b in &numbers[i + 1..] {
            diffs.push(a.abs_diff(b));
        }
    }
    diffs.sort_unstable();
    diffs.dedup();
    diffs.len()
}

/// Mean of consecutive differences of the sorted draw, in tenths
/// (rounded half away from zero). `None` for fewer than two numbers.
pub fn mean_gap_tenths(sorted: &[Number]) -> Option<i64> {
    let (first, last) = (sorted.first()?, sorted.last()?);
    if sorted.len() < 2 {
        return None;
    }
    let span = f64::from(last - first);
    Some((span * 10.0 / (sorted.len() - 1) as f64).round() as i64)
}

pub fn sum_bin_start(sum: u32, width: u32) -> u32 {
    (sum / width) * width
}

/// Zero-based decade index: 1..=10 → 0, 11..=20 → 1, 100 → 9.
pub fn decade_index(n: Number) -> Number {
    n.saturating_sub(1) / 10
}

/// Count every ascending `R`-subset of `sorted`.
fn count_subsets<const R: usize>(sorted: &[Number], counts: &mut HashMap<[Number; R], u64>) {
    let k = sorted.len();
    if R == 0 || R > k {
        return;
    }
    let mut idx: [usize; R] = std::array::from_fn(|i| i);
    loop {
        let key: [Number; R] = std::array::from_fn(|i| sorted[idx[i]]);
        *counts.entry(key).or_insert(0) += 1;

        let Some(i) = (0..R).rev().find(|&i| idx[i] < i + k - R) else {
            return;
        };
        idx[i] += 1;
        for j in i + 1..R {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

// ── Accumulator ────────────────────────────────────────────────────

/// Running totals for one aggregation pass.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    domain_max: Number,
    midpoint: Number,
    sum_bin_width: u32,
    enumerate_triples: bool,
    enumerate_quads: bool,
    /// Draws with `contest_no > recent_cutoff` count toward the window.
    recent_cutoff: Option<ContestNo>,

    draws: u64,
    last_contest: Option<ContestNo>,
    /// Indexed by number; slot 0 unused.
    times_drawn: Vec<u64>,
    times_drawn_recent: Vec<u64>,
    last_seen: Vec<Option<ContestNo>>,

    pairs: HashMap<[Number; 2], u64>,
    triples: HashMap<[Number; 3], u64>,
    quads: HashMap<[Number; 4], u64>,
    sum_bins: BTreeMap<u32, u64>,
    parity: BTreeMap<usize, u64>,
    high_low: BTreeMap<usize, u64>,
    decades: BTreeMap<Number, u64>,
    last_digits: [u64; 10],
    mean_gaps: BTreeMap<i64, u64>,
    ac_values: BTreeMap<usize, u64>,
    repeaters: BTreeMap<usize, u64>,
    repeaters_accumulated: BTreeMap<usize, u64>,
    previous: Option<Vec<Number>>,
    skipped_corrupt: u64,
}

impl StatsAccumulator {
    /// `last_contest_overall` is the persisted maximum read before the
    /// scan starts; it anchors the recent window.
    pub fn new(game: &GameConfig, last_contest_overall: Option<ContestNo>) -> Self {
        let slots = usize::from(game.domain_max) + 1;
        Self {
            domain_max: game.domain_max,
            midpoint: game.midpoint(),
            sum_bin_width: game.studies.sum_bin_width.max(1),
            enumerate_triples: game.studies.enumerate_triples,
            enumerate_quads: game.studies.enumerate_quads,
            recent_cutoff: last_contest_overall
                .map(|last| last.saturating_sub(game.studies.recent_window)),
            draws: 0,
            last_contest: None,
            times_drawn: vec![0; slots],
            times_drawn_recent: vec![0; slots],
            last_seen: vec![None; slots],
            pairs: HashMap::new(),
            triples: HashMap::new(),
            quads: HashMap::new(),
            sum_bins: BTreeMap::new(),
            parity: BTreeMap::new(),
            high_low: BTreeMap::new(),
            decades: BTreeMap::new(),
            last_digits: [0; 10],
            mean_gaps: BTreeMap::new(),
            ac_values: BTreeMap::new(),
            repeaters: BTreeMap::new(),
            repeaters_accumulated: BTreeMap::new(),
            previous: None,
            skipped_corrupt: 0,
        }
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Fold one draw into every metric. Draws must arrive ascending.
    pub fn observe(&mut self, draw: &DrawRecord) {
        let mut numbers = draw.numbers.clone();
        numbers.sort_unstable();
        if numbers.iter().any(|&n| n == 0 || n > self.domain_max) {
            self.skipped_corrupt += 1;
            log::warn!(
                "aggregate: contest {} has numbers outside [1, {}], skipped",
                draw.contest_no,
                self.domain_max
            );
            return;
        }

        self.draws += 1;
        self.last_contest = Some(draw.contest_no);
        let recent = self.recent_cutoff.map_or(true, |cut| draw.contest_no > cut);

        let mut sum = 0u32;
        for &n in &numbers {
            let slot = usize::from(n);
            self.times_drawn[slot] += 1;
            if recent {
                self.times_drawn_recent[slot] += 1;
            }
            self.last_seen[slot] = Some(draw.contest_no);
            *self.decades.entry(decade_index(n)).or_insert(0) += 1;
            self.last_digits[usize::from(n % 10)] += 1;
            sum += u32::from(n);
        }

        count_subsets::<2>(&numbers, &mut self.pairs);
        if self.enumerate_triples {
            count_subsets::<3>(&numbers, &mut self.triples);
        }
        if self.enumerate_quads {
            count_subsets::<4>(&numbers, &mut self.quads);
        }

        *self
            .sum_bins
            .entry(sum_bin_start(sum, self.sum_bin_width))
            .or_insert(0) += 1;
        *self.parity.entry(parity_counts(&numbers).0).or_insert(0) += 1;
        *self
            .high_low
            .entry(high_low_counts(&numbers, self.midpoint).0)
            .or_insert(0) += 1;
        if let Some(tenths) = mean_gap_tenths(&numbers) {
            *self.mean_gaps.entry(tenths).or_insert(0) += 1;
        }
        *self.ac_values.entry(ac_value(&numbers)).or_insert(0) += 1;

        if let Some(previous) = &self.previous {
            let shared = numbers
                .iter()
                .filter(|n| previous.binary_search(n).is_ok())
                .count();
            *self.repeaters.entry(shared).or_insert(0) += 1;
            if draw.is_rollover() {
                *self.repeaters_accumulated.entry(shared).or_insert(0) += 1;
            }
        }
        self.previous = Some(numbers);
    }

    pub fn finish(self, game: &GameConfig) -> AggregateTables {
        let total = self.draws;
        let last_overall = self.last_contest.unwrap_or(0);

        let number_stats: Vec<NumberStat> = (1..=self.domain_max)
            .map(|n| {
                let slot = usize::from(n);
                let times = self.times_drawn[slot];
                let last_seen = self.last_seen[slot];
                NumberStat {
                    number: n,
                    times_drawn: times,
                    pct_of_draws: if total > 0 {
                        times as f64 / total as f64
                    } else {
                        0.0
                    },
                    total_draws: total,
                    times_drawn_recent: self.times_drawn_recent[slot],
                    last_contest: last_seen,
                    overdue: last_seen.map_or(last_overall, |seen| last_overall - seen),
                }
            })
            .collect();

        let expected =
            total as f64 * game.draw_size as f64 / f64::from(self.domain_max.max(1));
        let lambda = game.studies.regression_lambda;
        let regression = number_stats
            .iter()
            .map(|s| (s.number, (s.times_drawn as f64 + lambda * expected) / (1.0 + lambda)))
            .collect();
        let statistic = if expected > 0.0 {
            number_stats
                .iter()
                .map(|s| (s.times_drawn as f64 - expected).powi(2) / expected)
                .sum()
        } else {
            0.0
        };

        if self.skipped_corrupt > 0 {
            log::warn!(
                "game={} aggregate: {} corrupt draws ignored",
                game.game_id,
                self.skipped_corrupt
            );
        }

        AggregateTables {
            total_draws: total,
            last_contest: self.last_contest,
            number_stats,
            pairs: self.pairs,
            triples: self.enumerate_triples.then_some(self.triples),
            quads: self.enumerate_quads.then_some(self.quads),
            sum_bins: self.sum_bins,
            parity: self.parity,
            high_low: self.high_low,
            decades: self.decades,
            last_digits: self.last_digits,
            mean_gaps: self.mean_gaps,
            ac_values: self.ac_values,
            repeaters: self.repeaters,
            repeaters_accumulated: self.repeaters_accumulated,
            regression,
            chi_square: ChiSquare {
                statistic,
                degrees_of_freedom: u32::from(self.domain_max.saturating_sub(1)),
                expected_per_number: expected,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquare {
    pub statistic: f64,
    pub degrees_of_freedom: u32,
    pub expected_per_number: f64,
}

/// Final counters of one pass. Input to the study builders.
#[derive(Debug, Clone)]
pub struct AggregateTables {
    pub total_draws: u64,
    pub last_contest: Option<ContestNo>,
    pub number_stats: Vec<NumberStat>,
    pub pairs: HashMap<[Number; 2], u64>,
    pub triples: Option<HashMap<[Number; 3], u64>>,
    pub quads: Option<HashMap<[Number; 4], u64>>,
    /// Bin start → draws.
    pub sum_bins: BTreeMap<u32, u64>,
    /// Even count → draws.
    pub parity: BTreeMap<usize, u64>,
    /// Low count → draws.
    pub high_low: BTreeMap<usize, u64>,
    /// Decade index → occurrences.
    pub decades: BTreeMap<Number, u64>,
    pub last_digits: [u64; 10],
    /// Mean gap in tenths → draws.
    pub mean_gaps: BTreeMap<i64, u64>,
    pub ac_values: BTreeMap<usize, u64>,
    /// Shared-with-previous count → draws.
    pub repeaters: BTreeMap<usize, u64>,
    pub repeaters_accumulated: BTreeMap<usize, u64>,
    pub regression: Vec<(Number, f64)>,
    pub chi_square: ChiSquare,
}

// ── Resumable scan ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProgress {
    /// One page folded in; `cursor` is its last contest.
    Page { draws: usize, cursor: ContestNo },
    Finished,
}

/// Keyset-paginated replay of a game's history. Drive it with `step()`
/// one page at a time, or `run_to_end()`. Dropping it between pages
/// cancels the run without touching storage.
pub struct AggregationScan<'a, S: HistoryStore + ?Sized> {
    store: &'a S,
    game: &'a GameConfig,
    page_size: usize,
    cursor: Option<ContestNo>,
    acc: StatsAccumulator,
    finished: bool,
}

impl<'a, S: HistoryStore + ?Sized> AggregationScan<'a, S> {
    pub fn new(store: &'a S, game: &'a GameConfig, page_size: usize) -> IngestResult<Self> {
        let last = store.max_contest_no(&game.game_id)?;
        Ok(Self {
            store,
            game,
            page_size: page_size.max(1),
            cursor: None,
            acc: StatsAccumulator::new(game, last),
            finished: false,
        })
    }

    pub fn cursor(&self) -> Option<ContestNo> {
        self.cursor
    }

    pub fn draws_scanned(&self) -> u64 {
        self.acc.draws()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn step(&mut self) -> IngestResult<ScanProgress> {
        if self.finished {
            return Ok(ScanProgress::Finished);
        }
        let page = self
            .store
            .scan_draws(&self.game.game_id, self.cursor, self.page_size)?;
        let Some(last) = page.last().map(|d| d.contest_no) else {
            self.finished = true;
            return Ok(ScanProgress::Finished);
        };

        for draw in &page {
            self.acc.observe(draw);
        }
        self.cursor = Some(last);
        if page.len() < self.page_size {
            self.finished = true;
        }
        log::debug!(
            "game={} aggregate: page of {} draws, cursor {last}",
            self.game.game_id,
            page.len()
        );
        Ok(ScanProgress::Page {
            draws: page.len(),
            cursor: last,
        })
    }

    pub fn run_to_end(mut self) -> IngestResult<AggregateTables> {
        while self.step()? != ScanProgress::Finished {}
        Ok(self.finish())
    }

    /// Tables over whatever has been scanned so far.
    pub fn finish(self) -> AggregateTables {
        self.acc.finish(self.game)
    }
}
