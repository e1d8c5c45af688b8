use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("required {table} table not found at {}", path.display())]
    MissingSource { table: &'static str, path: PathBuf },

    #[error("{artifact} not found at {}; run `train` first", path.display())]
    MissingArtifact {
        artifact: &'static str,
        path: PathBuf,
    },

    #[error("column `{column}` missing from {table} table")]
    MissingColumn { table: String, column: String },

    #[error("model expects {expected} feature columns but schema lists {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("feature table is empty after assembly; nothing to {stage}")]
    EmptyFeatureTable { stage: &'static str },

    #[error("model has not been fitted")]
    Unfitted,

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("prediction data unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error(transparent)]
    Internal(#[from] PipelineError),
}

impl From<polars::prelude::PolarsError> for QueryError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        QueryError::Internal(PipelineError::Polars(err))
    }
}
