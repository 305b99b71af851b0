//! Error types for configuration and job validation.

use thiserror::Error;

use crate::types::{JobId, NodeId};

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating a `GridConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("config declares no nodes")]
    NoNodes,

    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("node {0} has zero capacity")]
    ZeroCapacity(NodeId),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised when constructing a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} has zero cpu demand")]
    ZeroDemand(JobId),
}
