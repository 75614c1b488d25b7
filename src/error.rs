//! Error type shared by every stage of the pipeline.

use polars::prelude::PolarsError;

/// Errors raised while loading, splitting, training or evaluating.
///
/// Every variant is fatal to a run: nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("data format error: {0}")]
    DataFormat(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("classifier is frozen for inference and can no longer be trained")]
    Frozen,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PolarsError> for PipelineError {
    fn from(err: PolarsError) -> Self {
        PipelineError::DataFormat(err.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
