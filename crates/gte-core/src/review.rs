//! Manual review tickets for tasks that need a human

use crate::types::FixTask;
use chrono::{DateTime, Utc};
use gte_kernel::TaskId;
use serde::{Deserialize, Serialize};

/// Labels carried by every ticket
pub const BASE_LABELS: [&str; 3] = ["gte", "manual-review", "governance"];

/// Request for a human to look at a failed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReviewTicket {
    /// Task that failed
    pub task_id: TaskId,
    /// One-line title
    pub title: String,
    /// Body with the task, issue, error and location
    pub description: String,
    /// Base labels plus the failure reason
    pub labels: Vec<String>,
    /// When the ticket was raised
    pub created_at: DateTime<Utc>,
}

impl ManualReviewTicket {
    /// Ticket for `task`, which failed with `error` in `stage`
    ///
    /// `reason` becomes the last label.
    #[must_use]
    pub fn for_task(task: &FixTask, error: &str, stage: Option<&str>, reason: &str) -> Self {
        let issue = if task.issue.description.is_empty() {
            "No description"
        } else {
            task.issue.description.as_str()
        };
        let mut description = format!(
            "Task ID: {}\nIssue: {issue}\nError: {error}\n",
            task.id
        );
        if let Some(stage) = stage {
            description.push_str(&format!("Stage: {stage}\n"));
        }
        description.push_str(&format!("File: {}\n", task.issue.location()));

        let mut labels: Vec<String> = BASE_LABELS.iter().map(ToString::to_string).collect();
        labels.push(reason.to_string());

        Self {
            task_id: task.id.clone(),
            title: format!("Manual review needed for {}", task.id),
            description,
            labels,
            created_at: Utc::now(),
        }
    }
}
