//! Request/response surface consumed and produced by the pipeline.

use crate::{
    error::{IngestError, IngestResult, RowError},
    pipeline::{AggregationOutcome, IngestReport},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub csv_text: String,
    #[serde(default)]
    pub reconcile_last_n: Option<i64>,
}

impl IngestRequest {
    pub fn from_json(body: &str) -> IngestResult<Self> {
        serde_json::from_str(body).map_err(|e| IngestError::InvalidRequest(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&AggregationOutcome> for AggregationStatus {
    fn from(outcome: &AggregationOutcome) -> Self {
        match outcome {
            AggregationOutcome::Updated { .. } => Self {
                status: "updated",
                reason: None,
            },
            AggregationOutcome::SkippedNoDraws => Self {
                status: "skipped",
                reason: Some("no draws persisted".into()),
            },
            AggregationOutcome::Failed { reason } => Self {
                status: "failed",
                reason: Some(reason.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub processed: usize,
    pub reconcile_window: usize,
    pub errors: Vec<RowError>,
    pub stats_updated: bool,
    pub studies_updated: bool,
    pub aggregation: AggregationStatus,
    pub run_id: String,
}

impl From<&IngestReport> for IngestResponse {
    fn from(report: &IngestReport) -> Self {
        Self {
            ok: true,
            imported: report.reconcile.inserted,
            updated: report.reconcile.updated,
            skipped: report.reconcile.skipped,
            processed: report.processed,
            reconcile_window: report.reconcile.window,
            errors: report.errors.clone(),
            stats_updated: report.aggregation.stats_updated(),
            studies_updated: report.aggregation.studies_updated(),
            aggregation: AggregationStatus::from(&report.aggregation),
            run_id: report.run_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureResponse {
    pub ok: bool,
    pub error: String,
    #[serde(rename = "headerReceived", skip_serializing_if = "Option::is_none")]
    pub header_received: Option<Vec<String>>,
    #[serde(rename = "headerNormalized", skip_serializing_if = "Option::is_none")]
    pub header_normalized: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RowError>,
}

impl FailureResponse {
    /// HTTP-equivalent status for `err`.
    pub fn status_code(err: &IngestError) -> u16 {
        match err {
            IngestError::InvalidRequest(_)
            | IngestError::EmptyInput
            | IngestError::NoDataRows
            | IngestError::MissingColumns { .. }
            | IngestError::NoValidRows { .. } => 400,
            IngestError::IngestInProgress { .. } => 409,
            IngestError::InvalidConfig(_) => 422,
            IngestError::Database(_) | IngestError::Serialization(_) | IngestError::Other(_) => 500,
        }
    }
}

impl From<&IngestError> for FailureResponse {
    fn from(err: &IngestError) -> Self {
        let mut response = Self {
            ok: false,
            error: err.to_string(),
            header_received: None,
            header_normalized: None,
            errors: Vec::new(),
        };
        match err {
            IngestError::MissingColumns {
                header_received,
                header_normalized,
                ..
            } => {
                response.header_received = Some(header_received.clone());
                response.header_normalized = Some(header_normalized.clone());
            }
            IngestError::NoValidRows { errors } => response.errors = errors.clone(),
            _ => {}
        }
        response
    }
}
