//! Error types for the sandbox
//!
//! Failing checks are results, not errors. These cover the cases where a
//! check could not even be set up.

use std::path::PathBuf;

/// Errors raised while preparing a validation run
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Template has no program to run
    #[error("empty command template")]
    EmptyCommand,

    /// Template has an unterminated quote
    #[error("unbalanced quote in command template: {0}")]
    UnbalancedQuote(String),

    /// Sandbox directory or file could not be prepared
    #[error("io error on {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Original file path has no file name to reuse
    #[error("invalid target file: {0}")]
    InvalidTarget(PathBuf),
}

impl SandboxError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
