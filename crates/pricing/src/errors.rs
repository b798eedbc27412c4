use bluebook_forest::ForestError;
use thiserror::Error;

/// Errors returned by the pricing pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}, column '{column}': {reason}")]
    Ingestion {
        line: usize,
        column: String,
        reason: String,
    },

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("schema mismatch: missing columns {missing:?}, unexpected columns {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("degenerate split: {0}")]
    DegenerateSplit(String),

    #[error("RMSLE is undefined for negative {series} value {value} at index {index}")]
    NegativeValue {
        series: &'static str,
        index: usize,
        value: f64,
    },

    #[error("metric error: {0}")]
    Metric(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Forest(#[from] ForestError),
}

impl PipelineError {
    /// Schema mismatch between the expected and the found column lists
    pub fn schema_mismatch(expected: &[String], found: &[String]) -> Self {
        PipelineError::SchemaMismatch {
            missing: expected.iter().filter(|n| !found.contains(n)).cloned().collect(),
            unexpected: found.iter().filter(|n| !expected.contains(n)).cloned().collect(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
