//! Error types for isolation operations

use std::path::PathBuf;

/// Errors from git isolation operations
#[derive(Debug, thiserror::Error)]
pub enum IsolationError {
    /// Underlying libgit2 failure
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Path is not inside a git working tree
    #[error("not a git working tree: {0}")]
    NotARepository(PathBuf),

    /// Repository has no commits yet
    #[error("repository has no commits")]
    UnbornHead,

    /// Named local branch does not exist
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Generated or requested branch name is not a valid ref
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    /// File lies outside the working tree
    #[error("path outside repository: {0}")]
    OutsideRepository(PathBuf),

    /// Revert or merge would conflict
    #[error("conflict: {0}")]
    Conflict(String),
}

impl IsolationError {
    /// Whether the failure is a content conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Git(e) => e.code() == git2::ErrorCode::Conflict || e.class() == git2::ErrorClass::Checkout,
            _ => false,
        }
    }
}
