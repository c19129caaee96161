//! Task status lifecycle
//!
//! ```text
//! Pending ──► Running ──► Success | Failed | PendingRegeneration
//!    │          ▲   │
//!    ▼          │   ▼
//! Skipped       └─ Retrying ──► Failed
//! ```

use crate::error::StateMachineError;
use crate::types::TaskStatus;

/// Check that `from -> to` is a legal status change
///
/// # Errors
/// Returns [`StateMachineError::IllegalTransition`] for anything outside
/// the lifecycle table.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), StateMachineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: TaskStatus) -> &'static [TaskStatus] {
    use TaskStatus::{Failed, Pending, PendingRegeneration, Retrying, Running, Skipped, Success};
    match from {
        Pending => &[Running, Skipped],
        Running => &[Success, Failed, Retrying, PendingRegeneration],
        Retrying => &[Running, Failed],
        Success | Failed | PendingRegeneration | Skipped => &[],
    }
}
