//! Error taxonomy for the analysis engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Which required column could not be identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Timestamp,
    Decibel,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Timestamp => write!(f, "timestamp"),
            ColumnKind::Decibel => write!(f, "decibel"),
        }
    }
}

/// Errors surfaced by ingestion, aggregation and configuration.
///
/// Every variant names the recording, column or condition involved so the
/// caller can render an actionable message.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A required column is absent.
    #[error("{source_id}: no {missing} column found (headers: {})", headers.join(", "))]
    Schema {
        source_id: String,
        missing: ColumnKind,
        headers: Vec<String>,
    },

    /// The input could not be decoded with any of the listed encodings.
    #[error("{source_id}: could not decode text with any of [{}]", tried.join(", "))]
    Encoding { source_id: String, tried: Vec<String> },

    /// Nothing usable survived cleaning.
    #[error("{source_id}: no usable samples ({dropped_rows} rows dropped)")]
    EmptyData { source_id: String, dropped_rows: usize },

    /// Aggregation over zero recordings.
    #[error("condition {condition}: no recordings to aggregate ({excluded} excluded)")]
    InsufficientData { condition: String, excluded: usize },

    /// A recording labelled for one condition was handed to another.
    #[error("{source_id}: labelled {found}, expected condition {expected}")]
    ConditionMismatch {
        source_id: String,
        expected: String,
        found: String,
    },

    #[error("invalid condition label {label:?}: {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    /// Stable short name of the error kind, for reports and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Schema { .. } => "schema",
            AnalysisError::Encoding { .. } => "encoding",
            AnalysisError::EmptyData { .. } => "empty_data",
            AnalysisError::InsufficientData { .. } => "insufficient_data",
            AnalysisError::ConditionMismatch { .. } => "condition_mismatch",
            AnalysisError::InvalidLabel { .. } => "invalid_label",
            AnalysisError::InvalidConfig(_) => "invalid_config",
            AnalysisError::Io { .. } => "io",
        }
    }
}
