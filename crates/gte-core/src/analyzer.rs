//! Failure classification
//!
//! | reason       | next status                         |
//! |--------------|-------------------------------------|
//! | `Transient`  | `Retrying` while budget remains     |
//! | `Contextual` | `PendingRegeneration`               |
//! | `Validation` | `Failed`, manual review             |
//! | `Conflict`   | `Failed`                            |
//! | `Unknown`    | as `Transient`                      |

use crate::error::TaskError;
use gte_isolation::IsolationError;
use gte_patch::PatchError;
use gte_sandbox::SandboxError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Timeouts and network trouble
    Transient,
    /// The proposal does not fit the file
    Contextual,
    /// The patched file was rejected by a check
    Validation,
    /// Git could not combine the change
    Conflict,
    /// Anything else
    Unknown,
}

impl FailureReason {
    /// Lowercase name, also used as a ticket label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Transient => "transient",
            FailureReason::Contextual => "contextual",
            FailureReason::Validation => "validation",
            FailureReason::Conflict => "conflict",
            FailureReason::Unknown => "unknown",
        }
    }

    /// Whether the orchestrator retries after this failure
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::Transient | FailureReason::Unknown)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TRANSIENT_KEYWORDS: &[&str] = &["timeout", "timed out", "network", "connection"];
const CONTEXTUAL_KEYWORDS: &[&str] = &[
    "anchor not found",
    "no matching region",
    "patch is empty",
    "fuzzy match failed",
];
const VALIDATION_KEYWORDS: &[&str] = &[
    "validation failed",
    "test failed",
    "tests failed",
    "check failed",
    "syntax error",
];

/// Maps attempt errors to a [`FailureReason`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureAnalyzer;

impl FailureAnalyzer {
    /// Create analyzer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify a typed attempt error
    #[must_use]
    pub fn analyze(&self, error: &TaskError) -> FailureReason {
        match error {
            TaskError::Patch(err) if err.is_contextual() => FailureReason::Contextual,
            TaskError::Patch(PatchError::Syntax { .. }) | TaskError::Validation { .. } => {
                FailureReason::Validation
            }
            TaskError::Patch(PatchError::Io { source, .. }) => classify_io(source),
            TaskError::Patch(_) => FailureReason::Unknown,
            TaskError::Sandbox(SandboxError::Io { source, .. }) => classify_io(source),
            TaskError::Sandbox(_) => FailureReason::Validation,
            TaskError::Isolation(err) => classify_isolation(err),
            TaskError::Generation(err) if err.is_transient() => FailureReason::Transient,
            TaskError::Generation(_) | TaskError::Worker(_) => FailureReason::Unknown,
            TaskError::NoProposal | TaskError::NoCodeBlock => FailureReason::Contextual,
            TaskError::Other(message) => self.analyze_message(message),
        }
    }

    /// Classify a free-form error message by keyword
    #[must_use]
    pub fn analyze_message(&self, message: &str) -> FailureReason {
        let message = message.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

        if has(TRANSIENT_KEYWORDS) {
            FailureReason::Transient
        } else if has(CONTEXTUAL_KEYWORDS) {
            FailureReason::Contextual
        } else if has(VALIDATION_KEYWORDS) {
            FailureReason::Validation
        } else if message.contains("conflict") {
            FailureReason::Conflict
        } else {
            FailureReason::Unknown
        }
    }
}

fn classify_io(err: &std::io::Error) -> FailureReason {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => FailureReason::Transient,
        _ => FailureReason::Unknown,
    }
}

fn classify_isolation(err: &IsolationError) -> FailureReason {
    match err {
        _ if err.is_conflict() => FailureReason::Conflict,
        IsolationError::BranchNotFound(_) | IsolationError::InvalidBranchName(_) => {
            FailureReason::Conflict
        }
        _ => FailureReason::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerateError;
    use gte_sandbox::Tier;

    #[test]
    fn contextual_patch_errors() {
        let analyzer = FailureAnalyzer::new();
        for err in [
            PatchError::EmptyPatch,
            PatchError::AnchorNotFound { symbol: "f".into() },
            PatchError::NoMatchingRegion { best_score: 0.2 },
        ] {
            assert_eq!(analyzer.analyze(&err.into()), FailureReason::Contextual);
        }
    }

    #[test]
    fn validation_failures_are_not_retried() {
        let err = TaskError::Validation {
            tier: Tier::Lint,
            summary: "lint check failed".into(),
        };
        let reason = FailureAnalyzer::new().analyze(&err);
        assert_eq!(reason, FailureReason::Validation);
        assert!(!reason.is_retryable());
    }

    #[test]
    fn generator_timeouts_are_transient() {
        let analyzer = FailureAnalyzer::new();
        let err = TaskError::Generation(GenerateError::Network("refused".into()));
        assert_eq!(analyzer.analyze(&err), FailureReason::Transient);
        let err = TaskError::Generation(GenerateError::Rejected("policy".into()));
        assert_eq!(analyzer.analyze(&err), FailureReason::Unknown);
    }

    #[test]
    fn isolation_conflicts() {
        let err = TaskError::Isolation(IsolationError::Conflict("src/app.py".into()));
        assert_eq!(FailureAnalyzer::new().analyze(&err), FailureReason::Conflict);
    }

    #[test]
    fn message_keywords() {
        let analyzer = FailureAnalyzer::new();
        assert_eq!(analyzer.analyze_message("Request timed out"), FailureReason::Transient);
        assert_eq!(
            analyzer.analyze_message("no matching region: symbol `f` not found"),
            FailureReason::Contextual
        );
        assert_eq!(analyzer.analyze_message("Validation failed: lint"), FailureReason::Validation);
        assert_eq!(analyzer.analyze_message("merge conflict in a.py"), FailureReason::Conflict);
        assert_eq!(analyzer.analyze_message("disk full"), FailureReason::Unknown);
    }
}
