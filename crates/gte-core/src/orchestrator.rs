//! Concurrent batch orchestration
//!
//! Batches from the [`ExecutionPlan`] run one after another. Inside a batch
//! the coordinator acquires a semaphore permit per task in priority order
//! and only then spawns it, so at most `max_parallel` attempts are in
//! flight. When a batch finishes, every still-pending dependent of a task
//! that ended `Failed` is marked `Skipped`.

use crate::analyzer::{FailureAnalyzer, FailureReason};
use crate::config::OrchestratorConfig;
use crate::error::EngineError;
use crate::executor::FixExecutor;
use crate::retry::RetryPolicy;
use crate::review::ManualReviewTicket;
use crate::types::{FixTask, RunReport, TaskOutcome};
use futures::FutureExt;
use gte_kernel::{ExecutionPlan, Scheduler, TaskId, TaskStatus};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Label used on tickets for attempts that panicked
const PANIC_LABEL: &str = "panic";

/// Final state of one task after its batch
#[derive(Debug)]
struct TaskRun {
    task: FixTask,
    outcome: TaskOutcome,
}

/// Drives tasks through the plan
pub struct Orchestrator {
    executor: Arc<dyn FixExecutor>,
    config: OrchestratorConfig,
    analyzer: FailureAnalyzer,
    scheduler: Scheduler,
    tasks: HashMap<TaskId, FixTask>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create orchestrator running attempts through `executor`
    #[must_use]
    pub fn new(executor: Arc<dyn FixExecutor>, config: OrchestratorConfig) -> Self {
        Self {
            executor,
            config,
            analyzer: FailureAnalyzer::new(),
            scheduler: Scheduler::new(),
            tasks: HashMap::new(),
        }
    }

    /// Register a task
    ///
    /// # Errors
    /// Returns [`EngineError::Graph`] for duplicate ids or dependency
    /// cycles; the task is not registered.
    pub fn add_task(&mut self, task: FixTask) -> Result<(), EngineError> {
        self.scheduler
            .add_task(task.id.clone(), task.priority, &task.dependencies)?;
        tracing::debug!(task_id = %task.id, file = %task.file_path().display(), "Task registered");
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Register several tasks, stopping at the first rejected one
    ///
    /// # Errors
    /// See [`Orchestrator::add_task`].
    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = FixTask>) -> Result<(), EngineError> {
        tasks.into_iter().try_for_each(|task| self.add_task(task))
    }

    /// A registered task in its current state
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&FixTask> {
        self.tasks.get(id)
    }

    /// Number of registered tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Plan the registered tasks without running them
    ///
    /// # Errors
    /// Returns [`EngineError::Graph`] if the graph cannot be layered.
    pub fn build_plan(&self) -> Result<ExecutionPlan, EngineError> {
        Ok(self.scheduler.build_plan()?)
    }

    /// Run every pending task
    ///
    /// # Errors
    /// Returns [`EngineError`] if the plan cannot be built. Task failures
    /// are reported in the [`RunReport`], never as errors.
    pub async fn execute(&mut self) -> Result<RunReport, EngineError> {
        let plan = self.scheduler.build_plan()?;
        let max_parallel = self.config.max_parallel.max(1);
        tracing::info!(
            batches = plan.len(),
            tasks = plan.task_count(),
            max_parallel,
            "Starting run"
        );

        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let mut report = RunReport {
            plan: plan.clone(),
            ..RunReport::default()
        };

        for (index, batch) in plan.iter().enumerate() {
            tracing::debug!(batch = index, size = batch.len(), "Running batch");
            for run in self.run_batch(batch, &semaphore).await? {
                self.record(run, &mut report);
            }

            let failed: Vec<TaskId> = batch
                .iter()
                .filter(|id| self.status(id) == Some(TaskStatus::Failed))
                .cloned()
                .collect();
            self.skip_dependents(&failed, &mut report)?;

            for id in batch {
                if !report.outcomes.contains_key(id) {
                    if let Some(task) = self.tasks.get(id) {
                        report
                            .outcomes
                            .insert(id.clone(), TaskOutcome::new(id.clone(), task.status));
                    }
                }
            }
        }

        tracing::info!(summary = %report.summary(), "Run finished");
        Ok(report)
    }

    fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.tasks.get(id).map(|t| t.status)
    }

    async fn run_batch(
        &self,
        batch: &[TaskId],
        semaphore: &Arc<Semaphore>,
    ) -> Result<Vec<TaskRun>, EngineError> {
        let mut join_set: JoinSet<TaskRun> = JoinSet::new();
        let mut spawned: Vec<TaskId> = Vec::new();

        for id in batch {
            let Some(task) = self.tasks.get(id) else {
                continue;
            };
            if task.status != TaskStatus::Pending {
                continue;
            }

            let permit = Arc::clone(semaphore)
                .acquire_owned()
                .await
                .map_err(|_| EngineError::Shutdown)?;
            let task = task.clone();
            let executor = Arc::clone(&self.executor);
            let analyzer = self.analyzer;
            let policy = self.config.retry_policy;

            spawned.push(task.id.clone());
            join_set.spawn(async move {
                let _permit = permit;
                let fallback = task.clone();
                match AssertUnwindSafe(run_task(executor, analyzer, policy, task))
                    .catch_unwind()
                    .await
                {
                    Ok(run) => run,
                    Err(payload) => abandoned(fallback, format!("attempt panicked: {}", panic_message(&*payload))),
                }
            });
        }

        let mut runs = Vec::with_capacity(spawned.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(run) => runs.push(run),
                Err(err) => tracing::error!(error = %err, "Task worker did not complete"),
            }
        }

        let returned: HashSet<TaskId> = runs.iter().map(|r| r.task.id.clone()).collect();
        for id in spawned.into_iter().filter(|id| !returned.contains(id)) {
            if let Some(task) = self.tasks.get(&id) {
                runs.push(abandoned(task.clone(), "task worker was cancelled".to_string()));
            }
        }
        Ok(runs)
    }

    fn record(&mut self, run: TaskRun, report: &mut RunReport) {
        let TaskRun { task, outcome } = run;

        if outcome.status == TaskStatus::Failed {
            let reason = outcome
                .failure_reason
                .map_or(PANIC_LABEL, |r| r.as_str());
            let ticket = ManualReviewTicket::for_task(
                &task,
                outcome.last_error.as_deref().unwrap_or("unknown error"),
                outcome.failed_stage.as_deref(),
                reason,
            );
            tracing::info!(task_id = %task.id, title = %ticket.title, "Created manual review ticket");
            report.tickets.push(ticket);
        }

        metrics::counter!("gte_tasks_total", "status" => outcome.status.as_str()).increment(1);
        tracing::info!(
            task_id = %task.id,
            status = %outcome.status,
            attempts = outcome.attempts,
            "Task finished"
        );
        report.outcomes.insert(task.id.clone(), outcome);
        self.tasks.insert(task.id.clone(), task);
    }

    fn skip_dependents(&mut self, failed: &[TaskId], report: &mut RunReport) -> Result<(), EngineError> {
        for failed_id in failed {
            for id in self.scheduler.dependents_of(failed_id)? {
                let Some(task) = self.tasks.get_mut(&id) else {
                    continue;
                };
                if task.status != TaskStatus::Pending {
                    continue;
                }
                advance(task, TaskStatus::Skipped);
                tracing::warn!(task_id = %id, failed_dependency = %failed_id, "Skipping task");
                metrics::counter!("gte_tasks_total", "status" => TaskStatus::Skipped.as_str()).increment(1);
                report
                    .outcomes
                    .insert(id.clone(), TaskOutcome::skipped(id, failed_id.clone()));
            }
        }
        Ok(())
    }
}

/// Attempt loop for one task
async fn run_task(
    executor: Arc<dyn FixExecutor>,
    analyzer: FailureAnalyzer,
    policy: RetryPolicy,
    mut task: FixTask,
) -> TaskRun {
    let mut outcome = TaskOutcome::new(task.id.clone(), TaskStatus::Running);
    advance(&mut task, TaskStatus::Running);

    loop {
        outcome.attempts += 1;
        metrics::counter!("gte_task_attempts_total").increment(1);
        tracing::info!(
            task_id = %task.id,
            attempt = outcome.attempts,
            file = %task.file_path().display(),
            "Attempting task"
        );

        let err = match executor.attempt(&task).await {
            Ok(result) => {
                advance(&mut task, TaskStatus::Success);
                outcome.strategy = result.strategy;
                outcome.branch = result.branch;
                outcome.commit_ref = result.commit_ref;
                break;
            }
            Err(err) => err,
        };

        let reason = analyzer.analyze(&err);
        let message = err.to_string();
        tracing::warn!(
            task_id = %task.id,
            attempt = outcome.attempts,
            stage = err.stage(),
            reason = %reason,
            error = %message,
            "Attempt failed"
        );
        outcome.failure_reason = Some(reason);
        outcome.failed_stage = Some(err.stage().to_string());
        outcome.last_error = Some(message.clone());
        task.last_error = Some(message);

        match reason {
            FailureReason::Transient | FailureReason::Unknown => {
                task.retry_count += 1;
                if task.retry_count > task.max_retries {
                    advance(&mut task, TaskStatus::Failed);
                    break;
                }
                advance(&mut task, TaskStatus::Retrying);
                let delay = policy.delay(task.retry_count);
                tracing::info!(task_id = %task.id, retry = task.retry_count, delay = ?delay, "Retrying after backoff");
                tokio::time::sleep(delay).await;
                advance(&mut task, TaskStatus::Running);
            }
            FailureReason::Contextual => {
                tracing::warn!(task_id = %task.id, "Task needs a regenerated patch");
                advance(&mut task, TaskStatus::PendingRegeneration);
                break;
            }
            FailureReason::Validation | FailureReason::Conflict => {
                advance(&mut task, TaskStatus::Failed);
                break;
            }
        }
    }

    outcome.status = task.status;
    TaskRun { task, outcome }
}

/// Record a task whose attempt state was lost as `Failed`
fn abandoned(mut task: FixTask, error: String) -> TaskRun {
    tracing::error!(task_id = %task.id, error = %error, "Task attempt aborted");
    task.status = TaskStatus::Failed;
    task.last_error = Some(error.clone());
    let mut outcome = TaskOutcome::new(task.id.clone(), TaskStatus::Failed);
    outcome.attempts = 1;
    outcome.last_error = Some(error);
    outcome.failed_stage = Some("execution".to_string());
    TaskRun { task, outcome }
}

fn advance(task: &mut FixTask, to: TaskStatus) {
    if let Err(err) = task.transition(to) {
        tracing::error!(task_id = %task.id, error = %err, "Status change rejected");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
