//! Kernel error types

use crate::types::{TaskId, TaskStatus};

/// Errors from building the task graph or planning it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Adding the task would close a dependency cycle
    #[error("dependency cycle detected while adding task {task}")]
    CycleDetected {
        /// Task whose insertion was rejected
        task: TaskId,
    },

    /// A task with this id was already added
    #[error("duplicate task: {0}")]
    DuplicateTask(TaskId),

    /// Tasks remain but none has its dependencies planned
    #[error("deadlock: {remaining} task(s) can never become ready")]
    Deadlock {
        /// Number of tasks left unplanned
        remaining: usize,
    },

    /// Referenced task is not in the graph
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Illegal status change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// The transition is not in the lifecycle table
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: TaskStatus,
        /// Requested status
        to: TaskStatus,
    },
}
