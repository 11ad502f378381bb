use crate::{
    error::{IngestError, IngestResult},
    types::Number,
};
use serde::{Deserialize, Serialize};

// ── Number remapping ───────────────────────────────────────────────

/// How a raw position value from the CSV becomes a domain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberRemap {
    Identity,
    /// A literal `0` stands for `D` (e.g. Lotomania prints 100 as "00").
    ZeroToDomainMax,
}

impl NumberRemap {
    pub fn apply(self, raw: i64, domain_max: Number) -> i64 {
        match self {
            NumberRemap::ZeroToDomainMax if raw == 0 => i64::from(domain_max),
            _ => raw,
        }
    }
}

// ── Optional draw columns ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalField {
    TopTierWinners,
    TopTierPrize,
    AccumulatedAmount,
    TotalCollected,
    NextPrizeEstimate,
    Note,
}

impl OptionalField {
    pub const ALL: [OptionalField; 6] = [
        OptionalField::TopTierWinners,
        OptionalField::TopTierPrize,
        OptionalField::AccumulatedAmount,
        OptionalField::TotalCollected,
        OptionalField::NextPrizeEstimate,
        OptionalField::Note,
    ];

    /// Normalized header names accepted for this column.
    /// `hits` is the number of matches that wins the top tier.
    pub fn synonyms(self, hits: u32) -> Vec<String> {
        match self {
            OptionalField::TopTierWinners => vec![
                format!("ganhadores {hits} acertos"),
                "ganhadores faixa 1".into(),
                "ganhadores".into(),
            ],
            OptionalField::TopTierPrize => vec![
                format!("rateio {hits} acertos"),
                "premio faixa 1".into(),
                "rateio".into(),
            ],
            OptionalField::AccumulatedAmount => vec![
                format!("acumulado {hits} acertos"),
                "valor acumulado".into(),
                "acumulado".into(),
            ],
            OptionalField::TotalCollected => {
                vec!["arrecadacao total".into(), "arrecadacao".into()]
            }
            OptionalField::NextPrizeEstimate => vec![
                "estimativa premio".into(),
                "estimativa de premio".into(),
                "estimativa".into(),
            ],
            OptionalField::Note => vec!["observacao".into(), "obs".into()],
        }
    }
}

// ── Study parameters ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// K: draws with `contest_no > last - K` count toward windowed frequency.
    #[serde(default = "default_recent_window")]
    pub recent_window: i64,
    pub sum_bin_width: u32,
    /// Triples cost C(k,3) counter updates per draw. Opt-in.
    #[serde(default)]
    pub enumerate_triples: bool,
    /// Quadruples cost C(k,4) counter updates per draw. Opt-in.
    #[serde(default)]
    pub enumerate_quads: bool,
    /// λ in `(observed + λ·expected) / (1 + λ)`.
    #[serde(default = "default_regression_lambda")]
    pub regression_lambda: f64,
}

fn default_recent_window() -> i64 {
    200
}

fn default_regression_lambda() -> f64 {
    5.0
}

// ── Game variant ───────────────────────────────────────────────────

/// Fixed parameters of one lottery variant. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub game_id: String,
    pub label: String,
    /// k: numbers per draw.
    pub draw_size: usize,
    /// D: numbers are drawn from `[1, D]`.
    pub domain_max: Number,
    #[serde(default = "default_remap")]
    pub remap: NumberRemap,
    /// Matches needed for the top prize tier (usually `draw_size`).
    pub top_tier_hits: u32,
    #[serde(default)]
    pub optional_fields: Vec<OptionalField>,
    pub studies: StudyConfig,
}

fn default_remap() -> NumberRemap {
    NumberRemap::Identity
}

impl GameConfig {
    pub fn mega_sena() -> Self {
        Self {
            game_id: "megasena".into(),
            label: "Mega-Sena".into(),
            draw_size: 6,
            domain_max: 60,
            remap: NumberRemap::Identity,
            top_tier_hits: 6,
            optional_fields: OptionalField::ALL.to_vec(),
            studies: StudyConfig {
                recent_window: 200,
                sum_bin_width: 20,
                enumerate_triples: true,
                enumerate_quads: true,
                regression_lambda: 5.0,
            },
        }
    }

    pub fn quina() -> Self {
        Self {
            game_id: "quina".into(),
            label: "Quina".into(),
            draw_size: 5,
            domain_max: 80,
            remap: NumberRemap::Identity,
            top_tier_hits: 5,
            optional_fields: OptionalField::ALL.to_vec(),
            studies: StudyConfig {
                recent_window: 200,
                sum_bin_width: 20,
                enumerate_triples: true,
                enumerate_quads: true,
                regression_lambda: 5.0,
            },
        }
    }

    pub fn lotofacil() -> Self {
        Self {
            game_id: "lotofacil".into(),
            label: "Lotofácil".into(),
            draw_size: 15,
            domain_max: 25,
            remap: NumberRemap::Identity,
            top_tier_hits: 15,
            optional_fields: OptionalField::ALL.to_vec(),
            studies: StudyConfig {
                recent_window: 200,
                sum_bin_width: 20,
                enumerate_triples: true,
                enumerate_quads: false,
                regression_lambda: 5.0,
            },
        }
    }

    pub fn lotomania() -> Self {
        Self {
            game_id: "lotomania".into(),
            label: "Lotomania".into(),
            draw_size: 20,
            domain_max: 100,
            remap: NumberRemap::ZeroToDomainMax,
            top_tier_hits: 20,
            optional_fields: OptionalField::ALL.to_vec(),
            studies: StudyConfig {
                recent_window: 200,
                sum_bin_width: 50,
                enumerate_triples: false,
                enumerate_quads: false,
                regression_lambda: 5.0,
            },
        }
    }

    /// Look up a compiled-in variant by its `game_id`.
    pub fn preset(game_id: &str) -> Option<Self> {
        match game_id {
            "megasena" => Some(Self::mega_sena()),
            "quina" => Some(Self::quina()),
            "lotofacil" => Some(Self::lotofacil()),
            "lotomania" => Some(Self::lotomania()),
            _ => None,
        }
    }

    /// Load a custom variant from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: GameConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.game_id.trim().is_empty() {
            return Err(IngestError::InvalidConfig("game_id is empty".into()));
        }
        if self.draw_size < 2 {
            return Err(IngestError::InvalidConfig(format!(
                "draw_size must be >= 2 (got {})",
                self.draw_size
            )));
        }
        if usize::from(self.domain_max) < self.draw_size {
            return Err(IngestError::InvalidConfig(format!(
                "domain_max {} is smaller than draw_size {}",
                self.domain_max, self.draw_size
            )));
        }
        if self.studies.sum_bin_width == 0 {
            return Err(IngestError::InvalidConfig("sum_bin_width must be > 0".into()));
        }
        if self.studies.recent_window < 1 {
            return Err(IngestError::InvalidConfig(format!(
                "recent_window must be >= 1 (got {})",
                self.studies.recent_window
            )));
        }
        let lambda = self.studies.regression_lambda;
        if lambda.is_nan() || lambda < 0.0 {
            return Err(IngestError::InvalidConfig(
                "regression_lambda must be >= 0".into(),
            ));
        }
        Ok(())
    }

    /// Digits needed to print `D`; item keys zero-pad to this width.
    pub fn number_width(&self) -> usize {
        self.domain_max.to_string().len()
    }

    pub fn pad(&self, n: Number) -> String {
        format!("{:0width$}", n, width = self.number_width())
    }

    /// Numbers at or below this value count as "low".
    pub fn midpoint(&self) -> Number {
        self.domain_max / 2
    }
}

// ── Operational bounds ─────────────────────────────────────────────

/// Page and batch sizes that keep store I/O at O(page) memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub default_reconcile_window: usize,
    pub max_reconcile_window: usize,
    pub existence_batch: usize,
    pub upsert_batch: usize,
    pub scan_page: usize,
    pub study_item_batch: usize,
    pub lock_ttl_secs: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_reconcile_window: 20,
            max_reconcile_window: 100,
            existence_batch: 1000,
            upsert_batch: 500,
            scan_page: 1000,
            study_item_batch: 500,
            lock_ttl_secs: 900,
        }
    }
}

impl PipelineConfig {
    /// Tiny batches so tests cross page and batch boundaries.
    pub fn default_test() -> Self {
        Self {
            existence_batch: 7,
            upsert_batch: 5,
            scan_page: 4,
            study_item_batch: 3,
            ..Self::default()
        }
    }

    /// Clamp a caller-supplied window to `[0, max]`; `None` means default.
    pub fn clamp_window(&self, requested: Option<i64>) -> usize {
        match requested {
            None => self.default_reconcile_window.min(self.max_reconcile_window),
            Some(n) if n <= 0 => 0,
            Some(n) => usize::try_from(n)
                .unwrap_or(usize::MAX)
                .min(self.max_reconcile_window),
        }
    }
}
