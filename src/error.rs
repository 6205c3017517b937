//! Error types for the scrna-qc library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum QcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Matrix Market error: {0}")]
    MatrixMarket(#[from] sprs::io::IoError),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("Requested top {requested} barcodes but only {available} are available")]
    OutOfRange { requested: usize, available: usize },

    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Missing input file: {0}")]
    MissingFile(String),

    #[error("Feature '{0}' not found in count matrix")]
    MissingFeature(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, QcError>;
