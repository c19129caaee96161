//! Branch naming

use git2::{BranchType, Repository};

/// Longest sanitised task id kept in a branch name
const MAX_ID_LEN: usize = 60;

/// Reduce a task id to characters safe in a ref name
///
/// Task ids look like `src/app.py:E501:12`; runs of anything outside
/// `[A-Za-z0-9._-]` collapse to a single `-`.
#[must_use]
pub fn sanitize_task_id(task_id: &str) -> String {
    let mut out = String::with_capacity(task_id.len());
    for c in task_id.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let mut out = out.replace("..", ".");
    if out.len() > MAX_ID_LEN {
        out.truncate(MAX_ID_LEN);
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "task".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether `name` is usable as a local branch
#[inline]
#[must_use]
pub fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty() && git2::Reference::is_valid_name(&format!("refs/heads/{name}"))
}

/// `base`, or `base-N` for the first N not already taken
#[must_use]
pub fn unique_branch_name(repo: &Repository, base: &str) -> String {
    let taken = |name: &str| repo.find_branch(name, BranchType::Local).is_ok();
    if !taken(base) {
        return base.to_string();
    }
    (1u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
