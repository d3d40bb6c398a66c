//! Error types for configuration, planning and execution

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to the caller of a build
#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad rule/step wiring, detected before any execution
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown step '{name}'")]
    UnknownStep { name: String },

    #[error("Duplicate step '{name}'")]
    DuplicateStep { name: String },

    #[error("Invalid option '{key}' for step '{step}': {reason}")]
    InvalidOption {
        step: String,
        key: String,
        reason: String,
    },

    #[error("Cyclic step dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A fatal step failed; the whole run was aborted
    #[error("Step '{step}' failed for {resource}: {source}")]
    StepExecution {
        resource: String,
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Build cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BuildError {
    /// True for errors detected while loading or planning, before execution
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BuildError::Configuration(_)
                | BuildError::UnknownStep { .. }
                | BuildError::DuplicateStep { .. }
                | BuildError::InvalidOption { .. }
                | BuildError::CyclicDependency { .. }
                | BuildError::Yaml(_)
        )
    }
}

/// Failure of a single step handler for a single resource
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Step panicked or was aborted: {0}")]
    Aborted(String),
}

impl StepError {
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        StepError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
