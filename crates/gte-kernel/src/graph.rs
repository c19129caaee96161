//! Task dependency graph
//!
//! Edges point from a dependency to its dependent. A dependency that has
//! not been added yet is held as a placeholder node; a later
//! [`TaskGraph::add_task`] with that id fills it in.

use crate::error::GraphError;
use crate::types::TaskId;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Bfs;
use petgraph::Direction;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) struct TaskNode {
    pub(crate) id: TaskId,
    /// `None` marks a placeholder
    pub(crate) priority: Option<f64>,
}

impl TaskNode {
    #[inline]
    pub(crate) fn is_placeholder(&self) -> bool {
        self.priority.is_none()
    }
}

/// Directed acyclic graph of tasks
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    pub(crate) graph: StableDiGraph<TaskNode, ()>,
    index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task and its dependency edges
    ///
    /// The graph is left untouched when an error is returned.
    ///
    /// # Errors
    /// - [`GraphError::DuplicateTask`] if `id` was already added
    /// - [`GraphError::CycleDetected`] if `id` depends on itself, directly
    ///   or through tasks already in the graph
    pub fn add_task(
        &mut self,
        id: TaskId,
        priority: f64,
        dependencies: &[TaskId],
    ) -> Result<(), GraphError> {
        if dependencies.contains(&id) {
            return Err(GraphError::CycleDetected { task: id });
        }

        if let Some(&node) = self.index.get(&id) {
            if !self.graph[node].is_placeholder() {
                return Err(GraphError::DuplicateTask(id));
            }
            // Only an existing node can already reach one of its new dependencies.
            let closes_cycle = dependencies
                .iter()
                .filter_map(|dep| self.index.get(dep))
                .any(|&dep| has_path_connecting(&self.graph, node, dep, None));
            if closes_cycle {
                return Err(GraphError::CycleDetected { task: id });
            }
        }

        let node = self.node_for(&id);
        self.graph[node].priority = Some(priority);

        for dep in dependencies {
            let dep_node = self.node_for(dep);
            if self.graph.find_edge(dep_node, node).is_none() {
                self.graph.add_edge(dep_node, node, ());
            }
        }

        tracing::debug!(
            task_id = %id,
            priority,
            dependencies = dependencies.len(),
            "Task added to graph"
        );
        Ok(())
    }

    fn node_for(&mut self, id: &TaskId) -> NodeIndex {
        if let Some(&node) = self.index.get(id) {
            return node;
        }
        let node = self.graph.add_node(TaskNode {
            id: id.clone(),
            priority: None,
        });
        self.index.insert(id.clone(), node);
        node
    }

    /// Whether a task (not a placeholder) with this id was added
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.index
            .get(id)
            .is_some_and(|&node| !self.graph[node].is_placeholder())
    }

    /// Priority of an added task
    #[must_use]
    pub fn priority(&self, id: &TaskId) -> Option<f64> {
        self.index.get(id).and_then(|&node| self.graph[node].priority)
    }

    /// Number of added tasks, placeholders excluded
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|n| !n.is_placeholder())
            .count()
    }

    /// Whether no task has been added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids referenced as dependencies but never added
    #[must_use]
    pub fn placeholders(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .graph
            .node_weights()
            .filter(|n| n.is_placeholder())
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Direct dependencies of a task, in id order
    ///
    /// # Errors
    /// Returns [`GraphError::TaskNotFound`] for an unknown id.
    pub fn dependencies_of(&self, id: &TaskId) -> Result<Vec<TaskId>, GraphError> {
        let node = self.lookup(id)?;
        let mut deps: Vec<TaskId> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|n| self.graph[n].id.clone())
            .collect();
        deps.sort();
        Ok(deps)
    }

    /// Every task that depends on `id`, directly or transitively, in id order
    ///
    /// # Errors
    /// Returns [`GraphError::TaskNotFound`] for an unknown id.
    pub fn dependents_of(&self, id: &TaskId) -> Result<Vec<TaskId>, GraphError> {
        let start = self.lookup(id)?;
        let mut bfs = Bfs::new(&self.graph, start);
        let mut dependents = Vec::new();
        while let Some(node) = bfs.next(&self.graph) {
            let weight = &self.graph[node];
            if node != start && !weight.is_placeholder() {
                dependents.push(weight.id.clone());
            }
        }
        dependents.sort();
        Ok(dependents)
    }

    fn lookup(&self, id: &TaskId) -> Result<NodeIndex, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::TaskNotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        TaskId::new(s)
    }

    #[test]
    fn placeholder_is_filled_in_later() {
        let mut graph = TaskGraph::new();
        graph.add_task(id("b"), 1.0, &[id("a")]).unwrap();
        assert!(!graph.contains(&id("a")));
        assert_eq!(graph.placeholders(), vec![id("a")]);

        graph.add_task(id("a"), 2.0, &[]).unwrap();
        assert!(graph.contains(&id("a")));
        assert!(graph.placeholders().is_empty());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn filling_placeholder_checks_for_cycles() {
        let mut graph = TaskGraph::new();
        graph.add_task(id("b"), 1.0, &[id("a")]).unwrap();
        let err = graph.add_task(id("a"), 1.0, &[id("b")]).unwrap_err();
        assert_eq!(err, GraphError::CycleDetected { task: id("a") });
        // Rejected insert leaves the placeholder in place
        assert_eq!(graph.placeholders(), vec![id("a")]);
        assert_eq!(graph.dependencies_of(&id("a")).unwrap(), Vec::<TaskId>::new());
    }

    #[test]
    fn repeated_dependency_adds_one_edge() {
        let mut graph = TaskGraph::new();
        graph.add_task(id("b"), 1.0, &[id("a"), id("a")]).unwrap();
        assert_eq!(graph.graph.edge_count(), 1);
    }

    #[test]
    fn unknown_task_lookup_fails() {
        let graph = TaskGraph::new();
        assert_eq!(
            graph.dependents_of(&id("x")),
            Err(GraphError::TaskNotFound(id("x")))
        );
    }
}
