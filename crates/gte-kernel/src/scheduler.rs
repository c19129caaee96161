//! Dependency-ordered batch planning
//!
//! A plan is structural: a task lands in the first batch after all of its
//! dependencies were *scheduled*. Whether those dependencies succeed is the
//! orchestrator's concern, handled by skipping dependents at run time.

use crate::error::GraphError;
use crate::graph::TaskGraph;
use crate::types::TaskId;
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered batches of task ids
///
/// Tasks in one batch have no dependency on each other and may run
/// concurrently; batches run one after another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    batches: Vec<Vec<TaskId>>,
}

impl ExecutionPlan {
    /// Batches in execution order
    #[inline]
    #[must_use]
    pub fn batches(&self) -> &[Vec<TaskId>] {
        &self.batches
    }

    /// Number of batches
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the plan has no batches
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of planned tasks
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Index of the batch holding `id`
    #[must_use]
    pub fn batch_of(&self, id: &TaskId) -> Option<usize> {
        self.batches.iter().position(|batch| batch.contains(id))
    }

    /// Iterate over batches
    pub fn iter(&self) -> std::slice::Iter<'_, Vec<TaskId>> {
        self.batches.iter()
    }
}

impl IntoIterator for ExecutionPlan {
    type Item = Vec<TaskId>;
    type IntoIter = std::vec::IntoIter<Vec<TaskId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a Vec<TaskId>;
    type IntoIter = std::slice::Iter<'a, Vec<TaskId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.iter()
    }
}

/// Builds execution plans over a [`TaskGraph`]
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    graph: TaskGraph,
}

impl Scheduler {
    /// Create a scheduler with an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task with its priority (higher runs first) and dependencies
    ///
    /// # Errors
    /// See [`TaskGraph::add_task`].
    pub fn add_task(
        &mut self,
        id: impl Into<TaskId>,
        priority: f64,
        dependencies: &[TaskId],
    ) -> Result<(), GraphError> {
        self.graph.add_task(id.into(), priority, dependencies)
    }

    /// The underlying graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Transitive dependents of a task
    ///
    /// # Errors
    /// Returns [`GraphError::TaskNotFound`] for an unknown id.
    pub fn dependents_of(&self, id: &TaskId) -> Result<Vec<TaskId>, GraphError> {
        self.graph.dependents_of(id)
    }

    /// Layer the graph into batches
    ///
    /// Placeholders are treated as already satisfied and never planned.
    /// Within a batch tasks are ordered by descending priority, ties broken
    /// by id.
    ///
    /// # Errors
    /// Returns [`GraphError::Deadlock`] if tasks remain but none is ready.
    pub fn build_plan(&self) -> Result<ExecutionPlan, GraphError> {
        let graph = &self.graph.graph;

        let mut waiting: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .filter(|&n| !graph[n].is_placeholder())
            .map(|n| {
                let deps = graph
                    .neighbors_directed(n, Direction::Incoming)
                    .filter(|&d| !graph[d].is_placeholder())
                    .count();
                (n, deps)
            })
            .collect();

        let mut batches = Vec::new();
        while !waiting.is_empty() {
            let mut ready: Vec<NodeIndex> = waiting
                .iter()
                .filter(|(_, deps)| **deps == 0)
                .map(|(&n, _)| n)
                .collect();

            if ready.is_empty() {
                tracing::warn!(remaining = waiting.len(), "No task is ready to run");
                return Err(GraphError::Deadlock {
                    remaining: waiting.len(),
                });
            }

            ready.sort_by(|&a, &b| {
                let (a, b) = (&graph[a], &graph[b]);
                let pa = a.priority.unwrap_or_default();
                let pb = b.priority.unwrap_or_default();
                pb.total_cmp(&pa).then_with(|| a.id.cmp(&b.id))
            });

            for &node in &ready {
                waiting.remove(&node);
                for dependent in graph.neighbors_directed(node, Direction::Outgoing) {
                    if let Some(deps) = waiting.get_mut(&dependent) {
                        *deps = deps.saturating_sub(1);
                    }
                }
            }

            batches.push(ready.into_iter().map(|n| graph[n].id.clone()).collect());
        }

        tracing::debug!(
            batches = batches.len(),
            tasks = self.graph.len(),
            "Execution plan built"
        );
        Ok(ExecutionPlan { batches })
    }
}
