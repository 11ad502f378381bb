//! Shared primitive types used across the ingestion pipeline.

/// A contest (draw) number. Unique per game, strictly positive.
pub type ContestNo = i64;

/// A drawn number, always inside `[1, D]` once validated.
pub type Number = u16;

/// Stable identifier of a lottery variant, e.g. `"megasena"`.
pub type GameId = String;

/// The canonical ingestion run identifier.
pub type RunId = String;
