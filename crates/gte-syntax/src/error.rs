//! Error types for syntax operations

use crate::language::Language;

/// Errors raised while parsing or checking source text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    /// No grammar is available for the file
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Grammar could not be loaded into the parser
    #[error("parser initialization failed for {language}: {message}")]
    ParserInit {
        /// Language whose grammar failed to load
        language: Language,
        /// Loader message
        message: String,
    },

    /// Parser gave up (cancelled or timed out)
    #[error("parse failed")]
    ParseFailed,

    /// Source contains error or missing nodes
    #[error("syntax error at {line}:{column}: {message}")]
    Invalid {
        /// 1-based line of the first offending node
        line: usize,
        /// 1-based column of the first offending node
        column: usize,
        /// Short description of the node
        message: String,
    },
}

impl SyntaxError {
    /// Create an invalid-syntax error at a 0-based tree-sitter point
    #[must_use]
    pub fn invalid_at(point: tree_sitter::Point, message: impl Into<String>) -> Self {
        Self::Invalid {
            line: point.row + 1,
            column: point.column + 1,
            message: message.into(),
        }
    }
}
