//! Error types for GTE Core
//!
//! - [`TaskError`]: why one attempt at a task failed
//! - [`EngineError`]: why a run could not be set up or driven
//! - [`ConfigError`]: why configuration or a task file could not be loaded

use crate::llm::GenerateError;
use gte_isolation::IsolationError;
use gte_kernel::GraphError;
use gte_patch::PatchError;
use gte_sandbox::{SandboxError, Tier};
use std::path::PathBuf;

/// Failure of a single attempt
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Patch could not be placed or written
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// A validation tier rejected the patched file
    #[error("validation failed: {summary}")]
    Validation {
        /// First failing tier
        tier: Tier,
        /// Tier name and first line of its output
        summary: String,
    },

    /// Validation could not be set up
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// Git isolation failed
    #[error("isolation error: {0}")]
    Isolation(#[from] IsolationError),

    /// Code generator failed
    #[error(transparent)]
    Generation(#[from] GenerateError),

    /// No proposed code and no generator to ask
    #[error("no proposed code for task")]
    NoProposal,

    /// Generator answered without a code block
    #[error("no code block in generated response")]
    NoCodeBlock,

    /// Blocking work was cancelled or panicked
    #[error("worker failed: {0}")]
    Worker(String),

    /// Failure reported by a custom executor
    #[error("{0}")]
    Other(String),
}

impl TaskError {
    /// Pipeline stage the failure belongs to
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Patch(PatchError::Syntax { .. }) => Tier::Syntax.as_str(),
            Self::Patch(_) => "patch",
            Self::Validation { tier, .. } => tier.as_str(),
            Self::Sandbox(_) => "validation",
            Self::Isolation(_) => "isolation",
            Self::Generation(_) | Self::NoProposal | Self::NoCodeBlock => "generation",
            Self::Worker(_) | Self::Other(_) => "execution",
        }
    }

    /// Failing validation tier, if any
    #[must_use]
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::Validation { tier, .. } => Some(*tier),
            Self::Patch(PatchError::Syntax { .. }) => Some(Tier::Syntax),
            _ => None,
        }
    }

    /// Whether another attempt with the same input may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        crate::analyzer::FailureAnalyzer::new()
            .analyze(self)
            .is_retryable()
    }
}

/// Failure to load configuration or a task file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid YAML
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Extension is not one of toml, yaml, yml, json
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Values parse but make no sense
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to set up or drive a run
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Task graph rejected a task or could not be planned
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Configuration problem
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Isolation could not be initialised
    #[error("isolation error: {0}")]
    Isolation(#[from] IsolationError),

    /// Concurrency limiter was closed
    #[error("orchestrator shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages() {
        assert_eq!(TaskError::from(PatchError::EmptyPatch).stage(), "patch");
        let err = TaskError::Validation {
            tier: Tier::Tests,
            summary: "tests check failed: 1 failed".to_string(),
        };
        assert_eq!(err.stage(), "tests");
        assert_eq!(err.tier(), Some(Tier::Tests));
        assert_eq!(err.to_string(), "validation failed: tests check failed: 1 failed");
        assert_eq!(TaskError::NoCodeBlock.stage(), "generation");
    }

    #[test]
    fn retryable_follows_classification() {
        assert!(TaskError::Generation(GenerateError::Timeout("llm".into())).is_retryable());
        assert!(!TaskError::from(PatchError::EmptyPatch).is_retryable());
        assert!(!TaskError::NoProposal.is_retryable());
    }
}
