//! GTE Isolation
//!
//! Keeps each task's edits on its own short-lived branch:
//!
//! - [`IsolationManager::create_isolation_branch`] branches from HEAD
//! - [`IsolationManager::commit`] records exactly the patched files as the bot
//! - [`IsolationManager::revert`] undoes a commit with a new commit
//! - [`IsolationManager::merge_to`] is the only way anything reaches a
//!   shared branch, and is never called implicitly
//!
//! `revert` and `merge_to` report failure as `false` and leave the
//! repository as it was.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod branch;
pub mod error;
pub mod manager;
pub mod settings;

pub use branch::{is_valid_branch_name, sanitize_task_id, unique_branch_name};
pub use error::IsolationError;
pub use manager::IsolationManager;
pub use settings::IsolationSettings;
