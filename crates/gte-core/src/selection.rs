//! Picking a subset of tasks to run

use crate::types::{FixTask, RiskLevel};
use gte_syntax::Language;

/// Filter over a task list
///
/// All set criteria must match. Results are ordered by descending priority;
/// equal priorities keep their input order.
#[derive(Debug, Clone, Default)]
pub struct TaskSelector {
    language: Option<String>,
    rule_ids: Vec<String>,
    min_risk: Option<RiskLevel>,
    limit: Option<usize>,
}

impl TaskSelector {
    /// Selector matching every task
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep tasks in this language (`"py"` and `"python"` are the same)
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Keep tasks flagged by one of these rules
    #[must_use]
    pub fn rule_ids<I, S>(mut self, rule_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule_ids = rule_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Keep tasks at or above this risk
    #[must_use]
    pub fn min_risk(mut self, level: RiskLevel) -> Self {
        self.min_risk = Some(level);
        self
    }

    /// Return at most `limit` tasks
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `task` passes every filter
    #[must_use]
    pub fn matches(&self, task: &FixTask) -> bool {
        if let Some(wanted) = &self.language {
            if !language_matches(wanted, task) {
                return false;
            }
        }
        if !self.rule_ids.is_empty() && !self.rule_ids.contains(&task.issue.rule_id) {
            return false;
        }
        if let Some(min) = self.min_risk {
            if task.issue.risk_level < min {
                return false;
            }
        }
        true
    }

    /// Matching tasks, highest priority first
    #[must_use]
    pub fn select<'a>(&self, tasks: &'a [FixTask]) -> Vec<&'a FixTask> {
        let mut selected: Vec<&FixTask> = tasks.iter().filter(|t| self.matches(t)).collect();
        selected.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

fn language_matches(wanted: &str, task: &FixTask) -> bool {
    match (Language::from_name(wanted), task.issue.language()) {
        (Some(wanted), Some(actual)) => wanted.name() == actual.name(),
        (None, _) => task
            .issue
            .language
            .as_deref()
            .is_some_and(|hint| hint.eq_ignore_ascii_case(wanted)),
        (Some(_), None) => false,
    }
}
