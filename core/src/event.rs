//! Ingestion audit events.
//!
//! RULE: every pipeline stage that completes (or fails) emits exactly one
//! event. Events are append-only; variants are never removed or reordered.

use crate::types::{ContestNo, GameId, RunId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestEvent {
    RunStarted {
        run_id: RunId,
        game: GameId,
        reconcile_window: usize,
    },
    RowsValidated {
        valid: usize,
        rejected: usize,
        blank: usize,
    },
    ReconciliationCompleted {
        inserted: usize,
        updated: usize,
        skipped: usize,
        write_errors: usize,
        persisted_max_before: Option<ContestNo>,
    },
    AggregationCompleted {
        draws_scanned: u64,
        studies_written: usize,
    },
    AggregationSkipped {
        reason: String,
    },
    AggregationFailed {
        reason: String,
    },
}

impl IngestEvent {
    /// Pipeline stage that emitted this event.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestEvent::RunStarted { .. } => "pipeline",
            IngestEvent::RowsValidated { .. } => "validator",
            IngestEvent::ReconciliationCompleted { .. } => "reconciliation",
            IngestEvent::AggregationCompleted { .. }
            | IngestEvent::AggregationSkipped { .. }
            | IngestEvent::AggregationFailed { .. } => "aggregation",
        }
    }

    /// Stable name stored in the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            IngestEvent::RunStarted { .. }              => "run_started",
            IngestEvent::RowsValidated { .. }           => "rows_validated",
            IngestEvent::ReconciliationCompleted { .. } => "reconciliation_completed",
            IngestEvent::AggregationCompleted { .. }    => "aggregation_completed",
            IngestEvent::AggregationSkipped { .. }      => "aggregation_skipped",
            IngestEvent::AggregationFailed { .. }       => "aggregation_failed",
        }
    }
}

/// A persisted row in the `ingest_event` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEventEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub game: GameId,
    pub stage: String,
    pub event_type: String,
    pub payload: String,
}

impl IngestEventEntry {
    pub fn from_event(run_id: &str, game: &str, event: &IngestEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            run_id: run_id.to_string(),
            game: game.to_string(),
            stage: event.stage().to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<IngestEvent> {
        serde_json::from_str(&self.payload)
    }
}
