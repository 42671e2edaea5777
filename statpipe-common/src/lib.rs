pub mod config;
pub use config::{Config, ExportConfig, PipelineConfig, RejectionPolicy};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage names, carried in fatal-error context so a caller can see
/// where a run died and how far it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Fetching,
    Transforming,
    Aggregating,
    Reporting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching"),
            Stage::Transforming => write!(f, "transforming"),
            Stage::Aggregating => write!(f, "aggregating"),
            Stage::Reporting => write!(f, "reporting"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StatPipeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("malformed record: {0}")]
    Deserialization(String),
    #[error("projection failed: {0}")]
    Projection(String),
    #[error("invalid bucket config: {0}")]
    InvalidBucketConfig(String),
    #[error("insufficient data: need at least 2 values, got {count}")]
    InsufficientData { count: u64 },
    #[error("pipeline aborted while {stage} after {records_processed} records: {cause}")]
    Aborted {
        stage: Stage,
        records_processed: u64,
        cause: String,
    },
    #[error("{0}")]
    Other(String),
}

impl StatPipeError {
    /// Per-record failures are tallied under the skip policy; everything
    /// else tears the pipeline down.
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            StatPipeError::Deserialization(_) | StatPipeError::Projection(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StatPipeError>;

/// One keyed reading as it comes out of a record source. Records are copied
/// (not borrowed) into downstream stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: i64,
    pub value: Reading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub numeric: f64,
    pub label: String,
}

impl Record {
    pub fn new(key: i64, numeric: f64, label: impl Into<String>) -> Self {
        Record {
            key,
            value: Reading {
                numeric,
                label: label.into(),
            },
        }
    }
}
