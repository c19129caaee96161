//! Testing utilities for GTE workspace
//!
//! Shared fixtures: throwaway git repositories, task builders and a
//! scripted [`FixExecutor`] for driving the orchestrator without touching
//! files.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use git2::{BranchType, Repository, RepositoryInitOptions, Signature};
use gte_core::{AttemptOutcome, FixExecutor, FixTask, Issue, PatchSpec, TaskError};
use gte_kernel::TaskId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// Branch created by [`TempRepo::new`]
pub const MAIN_BRANCH: &str = "main";

/// Git repository in a temporary directory with one initial commit
pub struct TempRepo {
    dir: TempDir,
    repo: Repository,
}

impl std::fmt::Debug for TempRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempRepo").field("path", &self.dir.path()).finish()
    }
}

impl TempRepo {
    /// Repository on `main` with `files` committed
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(MAIN_BRANCH);
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();

        for (name, content) in files {
            write_file(dir.path(), name, content);
        }
        {
            let mut index = repo.index().unwrap();
            for (name, _) in files {
                index.add_path(Path::new(name)).unwrap();
            }
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = Signature::now("Fixture", "fixture@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Absolute path of `name`
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Working tree contents of `name`
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.file(name)).unwrap()
    }

    pub fn write(&self, name: &str, content: &str) {
        write_file(self.dir.path(), name, content);
    }

    /// Branch HEAD points at
    pub fn head_branch(&self) -> String {
        self.repo.head().unwrap().shorthand().unwrap().to_string()
    }

    /// Local branch names, sorted
    pub fn branches(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repo
            .branches(Some(BranchType::Local))
            .unwrap()
            .filter_map(|b| b.ok()?.0.name().ok().flatten().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    /// Contents of `name` at the tip of `branch`, if committed there
    pub fn file_at(&self, branch: &str, name: &str) -> Option<String> {
        let branch = self.repo.find_branch(branch, BranchType::Local).ok()?;
        let tree = branch.get().peel_to_tree().ok()?;
        let entry = tree.get_path(Path::new(name)).ok()?;
        let blob = entry.to_object(&self.repo).ok()?.peel_to_blob().ok()?;
        String::from_utf8(blob.content().to_vec()).ok()
    }

    /// Message of the commit at the tip of `branch`
    pub fn tip_message(&self, branch: &str) -> String {
        let branch = self.repo.find_branch(branch, BranchType::Local).unwrap();
        let commit = branch.get().peel_to_commit().unwrap();
        commit.message().unwrap_or_default().to_string()
    }
}

/// Write `content` to `root/name`, creating parent directories
pub fn write_file(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Plain directory holding `files`
pub fn temp_dir_with(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        write_file(dir.path(), name, content);
    }
    dir
}

/// Task fixing `file` with `code`
pub fn fix_task(id: &str, file: impl Into<PathBuf>, code: &str) -> FixTask {
    FixTask::new(id, Issue::new(file, "TEST001"), PatchSpec::code(code))
}

/// Task for the scripted executor; the file is never touched
pub fn task(id: &str) -> FixTask {
    fix_task(id, format!("{id}.py"), "pass\n")
}

/// Error the analyzer treats as transient
pub fn transient(message: &str) -> TaskError {
    TaskError::Other(format!("connection reset: {message}"))
}

/// Error the analyzer treats as needing a regenerated patch
pub fn contextual() -> TaskError {
    TaskError::Other("anchor not found in target file".to_string())
}

/// Error the analyzer treats as a validation failure
pub fn validation() -> TaskError {
    TaskError::Other("tests failed: 2 assertions".to_string())
}

/// Error the analyzer treats as a git conflict
pub fn conflict() -> TaskError {
    TaskError::Other("merge conflict on branch".to_string())
}

/// One recorded attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub task: TaskId,
    pub at: Instant,
}

/// [`FixExecutor`] that replays scripted results per task
///
/// Tasks without a script, or whose script is used up, succeed. Every
/// attempt is timestamped with tokio's clock so tests can run on a paused
/// runtime.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<TaskId, VecDeque<Result<(), TaskError>>>>,
    panics: HashSet<TaskId>,
    hold: Option<Duration>,
    attempts: Mutex<Vec<AttemptRecord>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results for successive attempts at `id`
    #[must_use]
    pub fn script(
        self,
        id: &str,
        results: impl IntoIterator<Item = Result<(), TaskError>>,
    ) -> Self {
        self.scripts
            .lock()
            .insert(TaskId::from(id), results.into_iter().collect());
        self
    }

    /// Every attempt at `id` fails with `make()`
    #[must_use]
    pub fn always_fail(self, id: &str, times: usize, make: fn() -> TaskError) -> Self {
        self.script(id, (0..times).map(|_| Err(make())))
    }

    /// Attempts at `id` panic
    #[must_use]
    pub fn panics_on(mut self, id: &str) -> Self {
        self.panics.insert(TaskId::from(id));
        self
    }

    /// Every attempt takes `duration`
    #[must_use]
    pub fn hold_for(mut self, duration: Duration) -> Self {
        self.hold = Some(duration);
        self
    }

    /// All attempts in the order they started
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().clone()
    }

    /// Start times of attempts at `id`
    pub fn attempts_of(&self, id: &str) -> Vec<Instant> {
        self.attempts
            .lock()
            .iter()
            .filter(|r| r.task.as_str() == id)
            .map(|r| r.at)
            .collect()
    }

    /// Order in which tasks first started
    pub fn start_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.attempts
            .lock()
            .iter()
            .filter(|r| seen.insert(r.task.clone()))
            .map(|r| r.task.to_string())
            .collect()
    }

    /// Most attempts that were running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FixExecutor for ScriptedExecutor {
    async fn attempt(&self, task: &FixTask) -> Result<AttemptOutcome, TaskError> {
        self.attempts.lock().push(AttemptRecord {
            task: task.id.clone(),
            at: Instant::now(),
        });
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(hold) = self.hold {
            tokio::time::sleep(hold).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        assert!(!self.panics.contains(&task.id), "scripted panic in {}", task.id);

        let next = self
            .scripts
            .lock()
            .get_mut(&task.id)
            .and_then(VecDeque::pop_front);
        next.unwrap_or(Ok(())).map(|()| AttemptOutcome::default())
    }
}
