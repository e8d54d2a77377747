use std::io;

use thiserror::Error;

/// Error type for configuration, dataset loading, and pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("malformed dataset line {line} ('{content}'): {reason}")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },
    #[error("missing data for relation '{relation}': {details}")]
    MissingData { relation: String, details: String },
    #[error("invalid dataset: {0}")]
    Dataset(String),
    #[error("model failure: {0}")]
    Model(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
