//! Task data model
//!
//! A [`FixTask`] is what an upstream planner hands over: the issue found in
//! a file, the code proposed to fix it, and how to check the result. Tasks
//! deserialize from TOML, YAML or JSON.

use crate::analyzer::FailureReason;
use crate::review::ManualReviewTicket;
use gte_kernel::{validate_transition, ExecutionPlan, StateMachineError, TaskId, TaskStatus};
use gte_patch::{PatchContext, PatchStrategy};
use gte_sandbox::ValidationOptions;
use gte_syntax::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default retry budget per task
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How risky the underlying issue is
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Not assessed; ranks below everything
    #[default]
    Unknown,
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
}

impl RiskLevel {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Unknown => "unknown",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(RiskLevel::Unknown),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Issue a task fixes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    /// File containing the issue
    pub file_path: PathBuf,
    /// 1-based line, if known
    pub line: Option<u32>,
    /// Rule that flagged the issue
    pub rule_id: String,
    /// Human-readable description
    pub description: String,
    /// Language hint from the planner
    pub language: Option<String>,
    /// Assessed risk
    pub risk_level: RiskLevel,
}

impl Issue {
    /// Issue in `file_path` flagged by `rule_id`
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>, rule_id: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            rule_id: rule_id.into(),
            ..Self::default()
        }
    }

    /// Set the line
    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the risk level
    #[must_use]
    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Language of the issue: the hint if it names one, else the extension
    #[must_use]
    pub fn language(&self) -> Option<Language> {
        self.language
            .as_deref()
            .and_then(Language::from_name)
            .or_else(|| Language::from_path(&self.file_path))
    }

    /// `file:line` for reports
    #[must_use]
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{line}", self.file_path.display()),
            None => self.file_path.display().to_string(),
        }
    }
}

/// Code proposed for a task
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchSpec {
    /// Proposed replacement code; blank means "ask the code generator"
    pub proposed_code: String,
    /// Where the code belongs
    pub context: Option<PatchContext>,
    /// Extra guidance for the code generator
    pub llm_hint: Option<String>,
}

impl PatchSpec {
    /// Patch carrying proposed code
    #[must_use]
    pub fn code(proposed_code: impl Into<String>) -> Self {
        Self {
            proposed_code: proposed_code.into(),
            ..Self::default()
        }
    }

    /// Attach a patch context
    #[must_use]
    pub fn with_context(mut self, context: PatchContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether there is code to apply
    #[inline]
    #[must_use]
    pub fn has_code(&self) -> bool {
        !self.proposed_code.trim().is_empty()
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// One unit of work: apply and validate a single fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixTask {
    /// Unique id
    pub id: TaskId,
    /// Issue being fixed
    pub issue: Issue,
    /// Proposed code
    #[serde(default)]
    pub patch: PatchSpec,
    /// Higher runs first within a batch
    #[serde(default)]
    pub priority: f64,
    /// Tasks that must be scheduled before this one
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Current status
    #[serde(default)]
    pub status: TaskStatus,
    /// Retries used so far
    #[serde(default)]
    pub retry_count: u32,
    /// Retries allowed after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Validation tiers and overrides
    #[serde(default)]
    pub validation: ValidationOptions,
    /// Error of the most recent failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl FixTask {
    /// Create a pending task
    #[must_use]
    pub fn new(id: impl Into<TaskId>, issue: Issue, patch: PatchSpec) -> Self {
        Self {
            id: id.into(),
            issue,
            patch,
            priority: 0.0,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            validation: ValidationOptions::default(),
            last_error: None,
        }
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Add a dependency
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<TaskId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set validation options
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationOptions) -> Self {
        self.validation = validation;
        self
    }

    /// File the task patches
    #[inline]
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.issue.file_path
    }

    /// Move to `to` if the lifecycle allows it
    ///
    /// # Errors
    /// Returns [`StateMachineError`] and leaves the status unchanged if the
    /// transition is illegal.
    pub fn transition(&mut self, to: TaskStatus) -> Result<(), StateMachineError> {
        validate_transition(self.status, to)?;
        tracing::debug!(task_id = %self.id, from = %self.status, to = %to, "status change");
        self.status = to;
        Ok(())
    }
}

/// A batch of tasks as written by a planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    /// Tasks in file order
    #[serde(default)]
    pub tasks: Vec<FixTask>,
}

/// Final record of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Task id
    pub id: TaskId,
    /// Final status
    pub status: TaskStatus,
    /// Attempts made
    pub attempts: u32,
    /// Last error, if any attempt failed
    pub last_error: Option<String>,
    /// Classification of the last error
    pub failure_reason: Option<FailureReason>,
    /// Pipeline stage that failed
    pub failed_stage: Option<String>,
    /// Failed ancestor that caused a skip
    pub skipped_because: Option<TaskId>,
    /// Strategy that placed the patch
    pub strategy: Option<PatchStrategy>,
    /// Isolation branch holding the change
    pub branch: Option<String>,
    /// Commit recording the change
    pub commit_ref: Option<String>,
}

impl TaskOutcome {
    /// Outcome with nothing recorded yet
    #[must_use]
    pub fn new(id: TaskId, status: TaskStatus) -> Self {
        Self {
            id,
            status,
            attempts: 0,
            last_error: None,
            failure_reason: None,
            failed_stage: None,
            skipped_because: None,
            strategy: None,
            branch: None,
            commit_ref: None,
        }
    }

    /// Outcome of a task skipped because `ancestor` failed
    #[must_use]
    pub fn skipped(id: TaskId, ancestor: TaskId) -> Self {
        Self {
            skipped_because: Some(ancestor),
            ..Self::new(id, TaskStatus::Skipped)
        }
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Plan that was executed
    pub plan: ExecutionPlan,
    /// Outcome per task
    pub outcomes: BTreeMap<TaskId, TaskOutcome>,
    /// Tickets raised for failed tasks
    pub tickets: Vec<ManualReviewTicket>,
}

impl RunReport {
    /// Task id → final status
    #[must_use]
    pub fn statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.outcomes
            .iter()
            .map(|(id, outcome)| (id.clone(), outcome.status))
            .collect()
    }

    /// Outcome of one task
    #[must_use]
    pub fn outcome(&self, id: &TaskId) -> Option<&TaskOutcome> {
        self.outcomes.get(id)
    }

    /// Number of tasks that ended in `status`
    #[must_use]
    pub fn count(&self, status: TaskStatus) -> usize {
        self.outcomes.values().filter(|o| o.status == status).count()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} task(s): {} succeeded, {} failed, {} need regeneration, {} skipped",
            self.outcomes.len(),
            self.count(TaskStatus::Success),
            self.count(TaskStatus::Failed),
            self.count(TaskStatus::PendingRegeneration),
            self.count(TaskStatus::Skipped),
        )
    }
}
