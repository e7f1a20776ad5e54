use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Non-finite value at row {row}, column {column}")]
    NonFinite { row: usize, column: usize },

    #[error("Insufficient data: covariance needs at least 2 vectors, have {count}")]
    InsufficientData { count: u64 },

    #[error("Embedding dimension must be at least 1")]
    ZeroDimension,

    #[error("Invalid accumulator state: {0}")]
    InvalidState(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Format error in {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
}

impl StatsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StatsError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StatsError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
