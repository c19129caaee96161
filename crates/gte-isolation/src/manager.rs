//! Isolation and rollback manager
//!
//! The repository is reopened for every operation, so a manager is plain
//! data and can be shared across tasks. Callers serialise operations that
//! move HEAD; two tasks checking out different branches of one working tree
//! at once would see each other's files.

use crate::branch::{is_valid_branch_name, sanitize_task_id, unique_branch_name};
use crate::error::IsolationError;
use crate::settings::IsolationSettings;
use git2::build::CheckoutBuilder;
use git2::{BranchType, Commit, Oid, Repository};
use std::path::{Path, PathBuf};

/// Git operations scoped to one working tree
#[derive(Debug, Clone)]
pub struct IsolationManager {
    root: PathBuf,
    settings: IsolationSettings,
}

impl IsolationManager {
    /// Open the working tree containing `repo_path`
    ///
    /// # Errors
    /// Returns error if no non-bare repository is found
    pub fn open(repo_path: &Path, settings: IsolationSettings) -> Result<Self, IsolationError> {
        let repo = Repository::discover(repo_path)
            .map_err(|_| IsolationError::NotARepository(repo_path.to_path_buf()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| IsolationError::NotARepository(repo_path.to_path_buf()))?;
        let root = workdir
            .canonicalize()
            .unwrap_or_else(|_| workdir.to_path_buf());

        tracing::debug!(root = %root.display(), "isolation manager opened");
        Ok(Self { root, settings })
    }

    /// Working tree root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Naming and identity settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &IsolationSettings {
        &self.settings
    }

    fn repo(&self) -> Result<Repository, IsolationError> {
        Ok(Repository::open(&self.root)?)
    }

    fn head_commit<'r>(repo: &'r Repository) -> Result<Commit<'r>, IsolationError> {
        let head = repo.head().map_err(|e| match e.code() {
            git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound => IsolationError::UnbornHead,
            _ => IsolationError::Git(e),
        })?;
        Ok(head.peel_to_commit()?)
    }

    /// Path of `path` relative to the working tree root
    ///
    /// Relative paths are taken as already relative to the root.
    ///
    /// # Errors
    /// Returns error if an absolute path lies outside the working tree
    pub fn relative_path(&self, path: &Path) -> Result<PathBuf, IsolationError> {
        if path.is_relative() {
            return Ok(path.to_path_buf());
        }
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        canonical
            .strip_prefix(&self.root)
            .or_else(|_| path.strip_prefix(&self.root))
            .map(Path::to_path_buf)
            .map_err(|_| IsolationError::OutsideRepository(path.to_path_buf()))
    }

    /// Create a branch for `task_id` from HEAD and check it out
    ///
    /// Name: prefix + sanitised task id + `-` + unix timestamp, with a
    /// numeric suffix if that name is taken.
    ///
    /// # Errors
    /// Returns error if HEAD is unborn or the checkout would overwrite
    /// local changes
    pub fn create_isolation_branch(&self, task_id: &str) -> Result<String, IsolationError> {
        let repo = self.repo()?;
        let head = Self::head_commit(&repo)?;

        let base = format!(
            "{}{}-{}",
            self.settings.branch_prefix,
            sanitize_task_id(task_id),
            chrono::Utc::now().timestamp()
        );
        let name = unique_branch_name(&repo, &base);
        if !is_valid_branch_name(&name) {
            return Err(IsolationError::InvalidBranchName(name));
        }

        let from = current_branch_of(&repo);
        repo.branch(&name, &head, false)?;
        checkout_branch(&repo, &name)?;

        tracing::info!(task_id, branch = %name, from = %from, "created isolation branch");
        Ok(name)
    }

    /// Stage exactly `file_paths` and commit them as the bot
    ///
    /// The index is reset to HEAD first, so anything staged beforehand is
    /// left out of the commit. Working tree files are not touched. Files
    /// that no longer exist are staged as deletions.
    ///
    /// # Errors
    /// Returns error if a path is outside the tree or libgit2 fails
    pub fn commit(
        &self,
        file_paths: &[PathBuf],
        task_id: &str,
        message: &str,
    ) -> Result<String, IsolationError> {
        let repo = self.repo()?;
        let parent = Self::head_commit(&repo)?;
        let mut index = repo.index()?;
        index.read_tree(&parent.tree()?)?;
        for path in file_paths {
            let rel = self.relative_path(path)?;
            if self.root.join(&rel).exists() {
                index.add_path(&rel)?;
            } else {
                index.remove_path(&rel)?;
            }
        }
        index.write()?;

        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = self.settings.signature()?;
        let full_message = format!(
            "{}{}\n\nTask-Id: {}",
            self.settings.message_prefix, message, task_id
        );
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &full_message, &tree, &[&parent])?;

        tracing::info!(task_id, commit = %oid, files = file_paths.len(), "committed patch");
        Ok(oid.to_string())
    }

    /// Revert `commit_ref` with a new commit on HEAD
    ///
    /// Returns `false` on any failure or conflict, leaving HEAD and the
    /// working tree unchanged.
    pub fn revert(&self, commit_ref: &str, reason: &str) -> bool {
        match self.try_revert(commit_ref, reason) {
            Ok(oid) => {
                tracing::warn!(commit = %short(commit_ref), revert = %oid, reason, "rolled back patch");
                true
            }
            Err(e) => {
                tracing::error!(commit = %short(commit_ref), reason, error = %e, "rollback failed");
                false
            }
        }
    }

    fn try_revert(&self, commit_ref: &str, reason: &str) -> Result<Oid, IsolationError> {
        let repo = self.repo()?;
        let target = repo.revparse_single(commit_ref)?.peel_to_commit()?;
        let head = Self::head_commit(&repo)?;

        let mut index = repo.revert_commit(&target, &head, 0, None)?;
        if index.has_conflicts() {
            return Err(IsolationError::Conflict(format!(
                "reverting {} conflicts with HEAD",
                short(commit_ref)
            )));
        }
        let tree = repo.find_tree(index.write_tree_to(&repo)?)?;

        // Update the tree first so a dirty working copy aborts before HEAD moves.
        repo.checkout_tree(tree.as_object(), Some(CheckoutBuilder::new().safe()))?;

        let sig = self.settings.signature()?;
        let message = format!(
            "{}Revert \"{}\"\n\nThis reverts commit {}.\n\nReason: {}",
            self.settings.message_prefix,
            target.summary().unwrap_or_default(),
            target.id(),
            reason
        );
        Ok(repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&head])?)
    }

    /// Merge `branch` into `target` with a merge commit, then delete `branch`
    ///
    /// Conflicts are detected in memory; on conflict or any other failure
    /// this returns `false` and nothing is changed.
    pub fn merge_to(&self, branch: &str, target: &str) -> bool {
        match self.try_merge(branch, target) {
            Ok(oid) => {
                tracing::info!(branch, target, merge = %oid, "merged isolation branch");
                true
            }
            Err(e) => {
                tracing::error!(branch, target, error = %e, "merge failed");
                false
            }
        }
    }

    fn try_merge(&self, branch: &str, target: &str) -> Result<Oid, IsolationError> {
        let repo = self.repo()?;
        let source = find_local_branch(&repo, branch)?.get().peel_to_commit()?;
        let target_commit = find_local_branch(&repo, target)?.get().peel_to_commit()?;

        let mut index = repo.merge_commits(&target_commit, &source, None)?;
        if index.has_conflicts() {
            return Err(IsolationError::Conflict(format!(
                "{branch} does not merge cleanly into {target}"
            )));
        }
        let tree = repo.find_tree(index.write_tree_to(&repo)?)?;

        repo.checkout_tree(tree.as_object(), Some(CheckoutBuilder::new().safe()))?;

        let target_ref = format!("refs/heads/{target}");
        let sig = self.settings.signature()?;
        let message = format!("{}Merge branch '{branch}' into {target}", self.settings.message_prefix);
        let oid = repo.commit(
            Some(&target_ref),
            &sig,
            &sig,
            &message,
            &tree,
            &[&target_commit, &source],
        )?;
        repo.set_head(&target_ref)?;

        find_local_branch(&repo, branch)?.delete()?;
        Ok(oid)
    }

    /// Restore one file in the working tree from HEAD
    ///
    /// # Errors
    /// Returns error if the path is outside the tree or the checkout fails
    pub fn restore_file(&self, path: &Path) -> Result<(), IsolationError> {
        let repo = self.repo()?;
        let rel = self.relative_path(path)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force().path(&rel)))?;
        tracing::debug!(file = %rel.display(), "restored file from HEAD");
        Ok(())
    }

    /// Short name of the checked-out branch (`HEAD` when detached)
    ///
    /// # Errors
    /// Returns error if HEAD cannot be read
    pub fn current_branch(&self) -> Result<String, IsolationError> {
        let repo = self.repo()?;
        let head = repo.head().map_err(|_| IsolationError::UnbornHead)?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    /// Check out an existing local branch
    ///
    /// # Errors
    /// Returns error if the branch is missing or local changes would be
    /// overwritten
    pub fn checkout(&self, branch: &str) -> Result<(), IsolationError> {
        let repo = self.repo()?;
        checkout_branch(&repo, branch)?;
        tracing::debug!(branch, "checked out");
        Ok(())
    }

    /// Full id of the HEAD commit
    ///
    /// # Errors
    /// Returns error if HEAD is unborn
    pub fn head_id(&self) -> Result<String, IsolationError> {
        let repo = self.repo()?;
        let id = Self::head_commit(&repo)?.id().to_string();
        Ok(id)
    }
}

fn find_local_branch<'r>(repo: &'r Repository, name: &str) -> Result<git2::Branch<'r>, IsolationError> {
    repo.find_branch(name, BranchType::Local)
        .map_err(|_| IsolationError::BranchNotFound(name.to_string()))
}

fn checkout_branch(repo: &Repository, name: &str) -> Result<(), IsolationError> {
    let branch = find_local_branch(repo, name)?;
    let commit = branch.get().peel_to_commit()?;
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
    repo.set_head(&format!("refs/heads/{name}"))?;
    Ok(())
}

fn current_branch_of(repo: &Repository) -> String {
    repo.head()
        .ok()
        .and_then(|h| h.shorthand().map(str::to_string))
        .unwrap_or_else(|| "HEAD".to_string())
}

fn short(commit_ref: &str) -> &str {
    commit_ref.get(..8).unwrap_or(commit_ref)
}
