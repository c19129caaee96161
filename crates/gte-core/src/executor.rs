//! Attempt execution seam

use crate::error::TaskError;
use crate::types::FixTask;
use async_trait::async_trait;
use gte_patch::PatchStrategy;
use gte_sandbox::ValidationResult;

/// What a successful attempt produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptOutcome {
    /// Strategy that placed the patch
    pub strategy: Option<PatchStrategy>,
    /// Validation that accepted it
    pub validation: Option<ValidationResult>,
    /// Isolation branch holding the change
    pub branch: Option<String>,
    /// Commit recording the change
    pub commit_ref: Option<String>,
}

/// Runs one attempt at a task
///
/// The orchestrator owns statuses, retries and backoff; an executor only
/// reports how a single attempt went.
#[async_trait]
pub trait FixExecutor: Send + Sync {
    /// Try to apply and validate the task's fix once
    ///
    /// # Errors
    /// Returns [`TaskError`] describing why the attempt failed; the file
    /// must be left as it was before the attempt.
    async fn attempt(&self, task: &FixTask) -> Result<AttemptOutcome, TaskError>;
}
