use serde::Serialize;
use thiserror::Error;

/// A single rejected input row. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based source line; 0 marks a synthetic (persistence) error.
    pub line: usize,
    pub reason: String,
}

impl RowError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Empty input")]
    EmptyInput,

    #[error("Input has a header but no data rows")]
    NoDataRows,

    #[error("Missing required columns: {}", missing.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        header_received: Vec<String>,
        header_normalized: Vec<String>,
    },

    #[error("No valid rows in input ({} rejected)", errors.len())]
    NoValidRows { errors: Vec<RowError> },

    #[error("Ingestion already in progress for game '{game}'")]
    IngestInProgress { game: String },

    #[error("Invalid game config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;
