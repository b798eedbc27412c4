//! Error types for the forest crate

use thiserror::Error;

/// Errors raised while fitting, evaluating, or persisting a forest
#[derive(Error, Debug)]
pub enum ForestError {
    /// Hyperparameters the learner cannot use
    #[error("Invalid forest parameters: {0}")]
    InvalidParameters(String),

    /// Fit was called with zero rows
    #[error("Cannot fit a forest on an empty training set")]
    EmptyTrainingSet,

    /// Feature rows or targets disagree with the expected shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored digest does not match the artifact on disk
    #[error("Artifact hash mismatch: expected {expected}, found {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Result type for forest operations
pub type Result<T> = std::result::Result<T, ForestError>;
