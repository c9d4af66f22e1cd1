//! Error types for the segmentation library

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Column '{column}' has {count} missing value(s)")]
    MissingValues { column: String, count: usize },

    #[error("Column '{column}' has {count} non-finite value(s) (NaN or infinity)")]
    NonFiniteValues { column: String, count: usize },

    #[error("Invalid cluster id {0} (expected a whole number in 0..{max})", max = crate::viz::MAX_PLOT_CLUSTERS)]
    InvalidCluster(f64),

    #[error("Unrecognized gender value '{0}' (expected 'Male' or 'Female')")]
    UnknownGender(String),

    #[error("Table has no 'Behavior' column; label the rows before filtering")]
    MissingBehaviorColumn,

    #[error("Unknown behavior label: {0}")]
    UnknownBehavior(String),

    #[error("Feature dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid artifact {name}: {reason}")]
    InvalidArtifact { name: String, reason: String },

    #[error("Value out of range for {field}: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Model fitting failed: {0}")]
    Fit(String),
}

/// Result type alias for library operations.
pub type SegmentResult<T> = std::result::Result<T, SegmentError>;
