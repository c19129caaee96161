//! Production executor: generate → isolate → patch → validate → commit
//!
//! ```text
//! proposal ─► [branch] ─► try_apply ─► validate ──fail──► restore backup
//!                                          │
//!                                        pass
//!                                          ▼
//!                                  [commit] ─► discard backup ─► [back to base]
//! ```
//!
//! Bracketed steps only run with isolation. With isolation enabled every
//! attempt holds the repository lock, since branch checkouts change the
//! shared working tree. Each attempt returns to the branch it started
//! from, so every task branches from the same base.

use crate::config::EngineConfig;
use crate::error::{EngineError, TaskError};
use crate::executor::{AttemptOutcome, FixExecutor};
use crate::llm::{build_fix_prompt, CodeGenerator};
use crate::types::FixTask;
use async_trait::async_trait;
use dashmap::DashMap;
use gte_isolation::IsolationManager;
use gte_patch::{extract_code_block, PatchEngine};
use gte_sandbox::{resolve_related_tests, SandboxValidator, Tier, ValidationSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Applies, validates and optionally commits one task's fix
pub struct PatchPipeline {
    engine: Arc<PatchEngine>,
    validator: SandboxValidator,
    validation: ValidationSettings,
    isolation: Option<Arc<IsolationManager>>,
    generator: Option<Arc<dyn CodeGenerator>>,
    root: Option<PathBuf>,
    repo_lock: Mutex<()>,
    file_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for PatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchPipeline")
            .field("engine", &self.engine)
            .field("validation", &self.validation)
            .field("isolation", &self.isolation)
            .field("generator", &self.generator.is_some())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl PatchPipeline {
    /// Pipeline without isolation or code generation
    #[must_use]
    pub fn new(engine: PatchEngine, validation: ValidationSettings) -> Self {
        Self {
            engine: Arc::new(engine),
            validator: SandboxValidator::new(),
            validation,
            isolation: None,
            generator: None,
            root: None,
            repo_lock: Mutex::new(()),
            file_locks: DashMap::new(),
        }
    }

    /// Pipeline as described by `config`
    ///
    /// # Errors
    /// Returns [`EngineError::Isolation`] if isolation is enabled and the
    /// repository cannot be opened.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let pipeline = Self::new(PatchEngine::new(config.patch), config.validation.clone());
        if !config.isolation.enabled {
            return Ok(pipeline);
        }
        let repo_path = config
            .isolation
            .repo_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let manager = IsolationManager::open(&repo_path, config.isolation.settings.clone())?;
        Ok(pipeline.with_isolation(manager))
    }

    /// Put every attempt on its own branch; relative task paths resolve
    /// against the repository root
    #[must_use]
    pub fn with_isolation(mut self, manager: IsolationManager) -> Self {
        self.root = Some(manager.root().to_path_buf());
        self.isolation = Some(Arc::new(manager));
        self
    }

    /// Ask `generator` for code when a task has none
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Resolve relative task paths against `root`
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// The patch engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &PatchEngine {
        &self.engine
    }

    /// The isolation manager, if enabled
    #[inline]
    #[must_use]
    pub fn isolation(&self) -> Option<&IsolationManager> {
        self.isolation.as_deref()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn file_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        Arc::clone(self.file_locks.entry(path.to_path_buf()).or_default().value())
    }

    async fn proposal(&self, task: &FixTask, path: &Path) -> Result<String, TaskError> {
        if task.patch.has_code() {
            return Ok(task.patch.proposed_code.clone());
        }
        let Some(generator) = self.generator.clone() else {
            return Err(TaskError::NoProposal);
        };

        let source = tokio::fs::read_to_string(path).await.ok();
        let prompt = build_fix_prompt(task, source.as_deref(), task.last_error.as_deref());
        tracing::debug!(task_id = %task.id, stage = "generation", "requesting code");

        let response = tokio::task::spawn_blocking(move || generator.generate(&prompt))
            .await
            .map_err(|e| TaskError::Worker(e.to_string()))??;
        let hint = task.issue.language().map(|l| l.name());
        extract_code_block(&response, hint).ok_or(TaskError::NoCodeBlock)
    }

    async fn apply_and_validate(
        &self,
        task: &FixTask,
        path: &Path,
        proposed: String,
    ) -> Result<AttemptOutcome, TaskError> {
        let engine = Arc::clone(&self.engine);
        let target = path.to_path_buf();
        let context = task.patch.context.clone();
        let applied = tokio::task::spawn_blocking(move || {
            engine.try_apply(&target, &proposed, context.as_ref())
        })
        .await
        .map_err(|e| TaskError::Worker(e.to_string()))??;

        let mut config = task.validation.resolve(path, &self.validation);
        if config.run_tests && config.test_scope.is_empty() {
            config.test_scope = resolve_related_tests(path)
                .into_iter()
                .map(|p| p.display().to_string())
                .collect();
        }

        let validation = match self.validator.validate(&applied.content, path, &config).await {
            Ok(validation) => validation,
            Err(err) => {
                self.rollback(path);
                return Err(err.into());
            }
        };

        if !validation.passed {
            self.rollback(path);
            let tier = validation.failed_tier().unwrap_or(Tier::Syntax);
            tracing::info!(
                task_id = %task.id,
                file = %path.display(),
                stage = tier.as_str(),
                "validation rejected patch"
            );
            return Err(TaskError::Validation {
                tier,
                summary: validation.summary(),
            });
        }

        Ok(AttemptOutcome {
            strategy: Some(applied.strategy),
            validation: Some(validation),
            ..AttemptOutcome::default()
        })
    }

    /// Put the file back as it was before the attempt
    fn rollback(&self, path: &Path) {
        match self.engine.restore(path) {
            Ok(()) => tracing::debug!(file = %path.display(), "restored backup"),
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "backup restore failed");
                if let Some(isolation) = &self.isolation {
                    if let Err(err) = isolation.restore_file(path) {
                        tracing::error!(file = %path.display(), error = %err, "git restore failed");
                    }
                }
            }
        }
    }

    fn discard_backup(&self, path: &Path) {
        if let Err(err) = self.engine.cleanup(path) {
            tracing::warn!(file = %path.display(), error = %err, "could not remove backup");
        }
    }

    async fn attempt_isolated(
        &self,
        isolation: &IsolationManager,
        task: &FixTask,
        path: &Path,
        proposed: String,
    ) -> Result<AttemptOutcome, TaskError> {
        let base = isolation.current_branch()?;
        let branch = isolation.create_isolation_branch(task.id.as_str())?;

        let result = match self.apply_and_validate(task, path, proposed).await {
            Ok(mut outcome) => {
                match isolation.commit(&[path.to_path_buf()], task.id.as_str(), &commit_message(task)) {
                    Ok(sha) => {
                        self.discard_backup(path);
                        outcome.branch = Some(branch.clone());
                        outcome.commit_ref = Some(sha);
                        Ok(outcome)
                    }
                    Err(err) => {
                        self.rollback(path);
                        Err(err.into())
                    }
                }
            }
            Err(err) => Err(err),
        };

        if let Err(err) = isolation.checkout(&base) {
            tracing::error!(task_id = %task.id, branch = %base, error = %err, "could not return to base branch");
            if result.is_ok() {
                return Err(err.into());
            }
        }
        result
    }
}

fn commit_message(task: &FixTask) -> String {
    format!("Fix {} in {}", task.issue.rule_id, task.issue.location())
}

#[async_trait]
impl FixExecutor for PatchPipeline {
    async fn attempt(&self, task: &FixTask) -> Result<AttemptOutcome, TaskError> {
        let path = self.resolve_path(task.file_path());
        let file_lock = self.file_lock(&path);
        let _file_guard = file_lock.lock().await;

        // generated proposals read the file, so they see earlier fixes to it
        let proposed = self.proposal(task, &path).await?;

        let outcome = match self.isolation.clone() {
            Some(isolation) => {
                let _repo_guard = self.repo_lock.lock().await;
                self.attempt_isolated(&isolation, task, &path, proposed).await?
            }
            None => {
                let outcome = self.apply_and_validate(task, &path, proposed).await?;
                self.discard_backup(&path);
                outcome
            }
        };

        tracing::info!(
            task_id = %task.id,
            file = %path.display(),
            strategy = ?outcome.strategy,
            commit = ?outcome.commit_ref,
            "attempt succeeded"
        );
        Ok(outcome)
    }
}
