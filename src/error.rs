//! Error types for wfcluster

use crate::exec::ExecutionError;
use thiserror::Error;

/// Result type for wfcluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// wfcluster error types
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Desired state is malformed (bad IP, missing credential, empty service list)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Mutually exclusive desired-state options were both set
    #[error("Configuration conflict: {0}")]
    ConfigConflict(String),

    /// A fail-fast step returned a command failure
    #[error("Step {step} failed for {resource}: {source}")]
    CommandFailed {
        step: String,
        resource: String,
        #[source]
        source: ExecutionError,
    },

    /// A state read could not be started at all
    #[error("Failed to read cluster state with [{query}]: {source}")]
    Probe {
        query: String,
        #[source]
        source: ExecutionError,
    },

    #[error("Failed to install Windows feature {feature}: {source}")]
    FeatureInstall {
        feature: String,
        #[source]
        source: ExecutionError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),
}

impl From<serde_yaml::Error> for ClusterError {
    fn from(err: serde_yaml::Error) -> Self {
        ClusterError::Yaml(err.to_string())
    }
}
