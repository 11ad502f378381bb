//! Study catalog: stable keys, titles, and the builders that turn
//! `AggregateTables` into unranked `StudyItem`s.

use crate::{
    aggregation::AggregateTables,
    config::GameConfig,
    store::{Study, StudyItem},
    types::Number,
};
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyKind {
    DezenaFreq,
    DezenaAtraso,
    DezenaFreqRecent,
    PairFreq,
    TripleFreq,
    QuadFreq,
    ConsecutivePairs,
    SumRange,
    Parity,
    HighLow,
    DecadeDist,
    LastDigit,
    MeanGap,
    AcValue,
    Repeaters,
    RepeatersAccumulated,
    RegressionToMean,
    ChiSquare,
    CoverageReduction,
    MonteCarlo,
}

impl StudyKind {
    /// Registration order.
    pub const ALL: [StudyKind; 20] = [
        StudyKind::DezenaFreq,
        StudyKind::DezenaAtraso,
        StudyKind::DezenaFreqRecent,
        StudyKind::PairFreq,
        StudyKind::TripleFreq,
        StudyKind::QuadFreq,
        StudyKind::ConsecutivePairs,
        StudyKind::SumRange,
        StudyKind::Parity,
        StudyKind::HighLow,
        StudyKind::DecadeDist,
        StudyKind::LastDigit,
        StudyKind::MeanGap,
        StudyKind::AcValue,
        StudyKind::Repeaters,
        StudyKind::RepeatersAccumulated,
        StudyKind::RegressionToMean,
        StudyKind::ChiSquare,
        StudyKind::CoverageReduction,
        StudyKind::MonteCarlo,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StudyKind::DezenaFreq           => "dezena_freq",
            StudyKind::DezenaAtraso         => "dezena_atraso",
            StudyKind::DezenaFreqRecent     => "dezena_freq_recent",
            StudyKind::PairFreq             => "pair_freq",
            StudyKind::TripleFreq           => "triple_freq",
            StudyKind::QuadFreq             => "quad_freq",
            StudyKind::ConsecutivePairs     => "consecutive_pairs",
            StudyKind::SumRange             => "sum_range",
            StudyKind::Parity               => "parity",
            StudyKind::HighLow              => "high_low",
            StudyKind::DecadeDist           => "decade_dist",
            StudyKind::LastDigit            => "last_digit",
            StudyKind::MeanGap              => "mean_gap",
            StudyKind::AcValue              => "ac_value",
            StudyKind::Repeaters            => "repeaters",
            StudyKind::RepeatersAccumulated => "repeaters_accumulated",
            StudyKind::RegressionToMean     => "regression_to_mean",
            StudyKind::ChiSquare            => "chi_square",
            StudyKind::CoverageReduction    => "coverage_reduction",
            StudyKind::MonteCarlo           => "monte_carlo",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StudyKind::DezenaFreq           => "Frequência das dezenas",
            StudyKind::DezenaAtraso         => "Atraso das dezenas",
            StudyKind::DezenaFreqRecent     => "Frequência recente das dezenas",
            StudyKind::PairFreq             => "Pares mais sorteados",
            StudyKind::TripleFreq           => "Trios mais sorteados",
            StudyKind::QuadFreq             => "Quadras mais sorteadas",
            StudyKind::ConsecutivePairs     => "Pares consecutivos",
            StudyKind::SumRange             => "Faixas de soma",
            StudyKind::Parity               => "Pares e ímpares",
            StudyKind::HighLow              => "Baixas e altas",
            StudyKind::DecadeDist           => "Distribuição por dezena",
            StudyKind::LastDigit            => "Dígito final",
            StudyKind::MeanGap              => "Intervalo médio",
            StudyKind::AcValue              => "Valor AC",
            StudyKind::Repeaters            => "Repetidas do concurso anterior",
            StudyKind::RepeatersAccumulated => "Repetidas em concursos acumulados",
            StudyKind::RegressionToMean     => "Regressão à média",
            StudyKind::ChiSquare            => "Qui-quadrado de uniformidade",
            StudyKind::CoverageReduction    => "Fechamentos e reduções",
            StudyKind::MonteCarlo           => "Simulação Monte Carlo",
        }
    }

    pub fn study(self) -> Study {
        Study {
            study_key: self.key().to_string(),
            title: self.title().to_string(),
        }
    }

    /// Catalog placeholders: registered, never populated.
    pub fn is_placeholder(self) -> bool {
        matches!(self, StudyKind::CoverageReduction | StudyKind::MonteCarlo)
    }

    pub fn enabled_for(self, game: &GameConfig) -> bool {
        match self {
            StudyKind::TripleFreq => game.studies.enumerate_triples,
            StudyKind::QuadFreq => game.studies.enumerate_quads,
            _ => true,
        }
    }
}

/// Studies registered for `game`, in write order.
pub fn catalog(game: &GameConfig) -> Vec<StudyKind> {
    StudyKind::ALL
        .into_iter()
        .filter(|kind| kind.enabled_for(game))
        .collect()
}

// ── Item builders ──────────────────────────────────────────────────

fn item(kind: StudyKind, item_key: String, value: f64, extra: Option<serde_json::Value>) -> StudyItem {
    StudyItem {
        study_key: kind.key().to_string(),
        item_key,
        rank: 0,
        value,
        extra,
    }
}

fn dezena_key(game: &GameConfig, n: Number) -> String {
    format!("dezena:{}", game.pad(n))
}

fn subset_key(game: &GameConfig, numbers: &[Number]) -> String {
    numbers
        .iter()
        .map(|&n| game.pad(n))
        .collect::<Vec<_>>()
        .join("-")
}

fn subset_items<const R: usize>(
    kind: StudyKind,
    game: &GameConfig,
    counts: &HashMap<[Number; R], u64>,
) -> Vec<StudyItem> {
    counts
        .iter()
        .map(|(subset, &count)| item(kind, subset_key(game, subset), count as f64, None))
        .collect()
}

/// Share of `total` as extra metadata on histogram items.
fn share(count: u64, total: u64) -> Option<serde_json::Value> {
    let pct = if total > 0 { count as f64 / total as f64 } else { 0.0 };
    Some(json!({ "pct": pct }))
}

/// Unranked items for `kind`. Placeholders and disabled subset studies
/// yield an empty list.
pub fn build_items(kind: StudyKind, game: &GameConfig, tables: &AggregateTables) -> Vec<StudyItem> {
    let k = game.draw_size;
    let total = tables.total_draws;

    match kind {
        StudyKind::DezenaFreq => tables
            .number_stats
            .iter()
            .map(|s| {
                item(
                    kind,
                    dezena_key(game, s.number),
                    s.times_drawn as f64,
                    Some(json!({ "pct_of_draws": s.pct_of_draws, "total_draws": s.total_draws })),
                )
            })
            .collect(),
        StudyKind::DezenaAtraso => tables
            .number_stats
            .iter()
            .map(|s| {
                item(
                    kind,
                    dezena_key(game, s.number),
                    s.overdue as f64,
                    Some(json!({ "last_contest": s.last_contest })),
                )
            })
            .collect(),
        StudyKind::DezenaFreqRecent => tables
            .number_stats
            .iter()
            .map(|s| {
                item(
                    kind,
                    dezena_key(game, s.number),
                    s.times_drawn_recent as f64,
                    Some(json!({ "window": game.studies.recent_window })),
                )
            })
            .collect(),
        StudyKind::PairFreq => subset_items(kind, game, &tables.pairs),
        StudyKind::TripleFreq => tables
            .triples
            .as_ref()
            .map(|t| subset_items(kind, game, t))
            .unwrap_or_default(),
        StudyKind::QuadFreq => tables
            .quads
            .as_ref()
            .map(|q| subset_items(kind, game, q))
            .unwrap_or_default(),
        StudyKind::ConsecutivePairs => tables
            .pairs
            .iter()
            .filter(|([a, b], _)| b - a == 1)
            .map(|(pair, &count)| item(kind, subset_key(game, pair), count as f64, None))
            .collect(),
        StudyKind::SumRange => {
            let width = game.studies.sum_bin_width.max(1);
            tables
                .sum_bins
                .iter()
                .map(|(&start, &count)| {
                    item(
                        kind,
                        format!("{start}-{}", start + width - 1),
                        count as f64,
                        share(count, total),
                    )
                })
                .collect()
        }
        StudyKind::Parity => tables
            .parity
            .iter()
            .map(|(&evens, &count)| {
                item(
                    kind,
                    format!("{evens}p-{}i", k.saturating_sub(evens)),
                    count as f64,
                    share(count, total),
                )
            })
            .collect(),
        StudyKind::HighLow => tables
            .high_low
            .iter()
            .map(|(&low, &count)| {
                item(
                    kind,
                    format!("{low}b-{}a", k.saturating_sub(low)),
                    count as f64,
                    share(count, total),
                )
            })
            .collect(),
        StudyKind::DecadeDist => {
            let occurrences = total * k as u64;
            tables
                .decades
                .iter()
                .map(|(&idx, &count)| {
                    let start = idx * 10 + 1;
                    item(
                        kind,
                        format!("{start:02}-{:02}", start + 9),
                        count as f64,
                        share(count, occurrences),
                    )
                })
                .collect()
        }
        StudyKind::LastDigit => {
            let occurrences = total * k as u64;
            tables
                .last_digits
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(digit, &count)| {
                    item(kind, format!("final:{digit}"), count as f64, share(count, occurrences))
                })
                .collect()
        }
        StudyKind::MeanGap => tables
            .mean_gaps
            .iter()
            .map(|(&tenths, &count)| {
                item(
                    kind,
                    format!("{}.{}", tenths / 10, tenths % 10),
                    count as f64,
                    share(count, total),
                )
            })
            .collect(),
        StudyKind::AcValue => tables
            .ac_values
            .iter()
            .map(|(&ac, &count)| item(kind, format!("ac:{ac}"), count as f64, share(count, total)))
            .collect(),
        StudyKind::Repeaters => tables
            .repeaters
            .iter()
            .map(|(&shared, &count)| item(kind, format!("rep:{shared}"), count as f64, None))
            .collect(),
        StudyKind::RepeatersAccumulated => tables
            .repeaters_accumulated
            .iter()
            .map(|(&shared, &count)| item(kind, format!("rep:{shared}"), count as f64, None))
            .collect(),
        StudyKind::RegressionToMean => tables
            .regression
            .iter()
            .zip(&tables.number_stats)
            .map(|(&(n, adjusted), stat)| {
                item(
                    kind,
                    dezena_key(game, n),
                    adjusted,
                    Some(json!({
                        "observed": stat.times_drawn,
                        "expected": tables.chi_square.expected_per_number,
                        "lambda": game.studies.regression_lambda,
                    })),
                )
            })
            .collect(),
        StudyKind::ChiSquare => {
            let chi = &tables.chi_square;
            vec![
                item(kind, "chi2".into(), chi.statistic, None),
                item(kind, "degrees_of_freedom".into(), f64::from(chi.degrees_of_freedom), None),
                item(kind, "expected_per_number".into(), chi.expected_per_number, None),
            ]
        }
        StudyKind::CoverageReduction | StudyKind::MonteCarlo => Vec::new(),
    }
}
