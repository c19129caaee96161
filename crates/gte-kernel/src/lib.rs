//! GTE Kernel
//!
//! Task identity, the status lifecycle and dependency planning:
//!
//! - [`TaskStatus`] transitions are checked by [`validate_transition`]
//! - [`Scheduler`] keeps the task graph acyclic and layers it into an
//!   [`ExecutionPlan`] of batches that can each run concurrently

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod graph;
pub mod scheduler;
pub mod state_machine;
pub mod types;

pub use error::{GraphError, StateMachineError};
pub use graph::TaskGraph;
pub use scheduler::{ExecutionPlan, Scheduler};
pub use state_machine::{allowed_transitions, validate_transition};
pub use types::{TaskId, TaskStatus};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
