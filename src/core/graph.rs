//! Reverse-edge dependency index.
//!
//! Tracks which tasks are waiting on which, so a completion can trigger its
//! dependents without scanning the whole task table. Edges point from a
//! dependency to the tasks that depend on it.
//!
//! Nodes are created lazily: a task may declare a dependency on an id the
//! queue has never seen. Readiness is re-checked against the completed set,
//! never against the graph, so such a task simply stays pending until the
//! id completes (which may be never). Cycles, however, are rejected at
//! registration time instead of leaving both tasks silently stuck.

use petgraph::algo::is_cyclic_directed;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::HashMap;

use crate::core::task::TaskId;
use crate::error::{Error, Result};

/// Dependency graph over task ids.
///
/// Uses a `StableDiGraph` so node indices survive removals when terminal
/// tasks are cleared.
pub struct DependencyGraph {
    graph: StableDiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    fn ensure_node(&mut self, id: TaskId, created: &mut Vec<NodeIndex>) -> NodeIndex {
        if let Some(&node) = self.index.get(&id) {
            return node;
        }
        let node = self.graph.add_node(id);
        self.index.insert(id, node);
        created.push(node);
        node
    }

    /// Register a task and its dependency edges.
    ///
    /// Dependency ids not yet known to the queue are allowed and get
    /// placeholder nodes. Registration is rolled back and rejected if the
    /// new edges would close a cycle.
    pub fn register(&mut self, id: TaskId, dependencies: &std::collections::HashSet<TaskId>) -> Result<()> {
        let mut created = Vec::new();
        let node = self.ensure_node(id, &mut created);

        let mut added = Vec::new();
        for dep in dependencies {
            let dep_node = self.ensure_node(*dep, &mut created);
            if self.graph.find_edge(dep_node, node).is_none() {
                added.push(self.graph.add_edge(dep_node, node, ()));
            }
        }

        if is_cyclic_directed(&self.graph) {
            for edge in added {
                self.graph.remove_edge(edge);
            }
            for node in created {
                if let Some(removed) = self.graph.remove_node(node) {
                    self.index.remove(&removed);
                }
            }
            return Err(Error::DependencyCycle { id });
        }

        Ok(())
    }

    /// Ids of the tasks that depend on `id`.
    pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
        match self.index.get(id) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .filter_map(|n| self.graph.node_weight(n).copied())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove a task and its incident edges.
    pub fn remove(&mut self, id: &TaskId) {
        if let Some(node) = self.index.remove(id) {
            self.graph.remove_node(node);
        }
    }

    /// Check if a task id is known to the graph.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of tracked task ids (including placeholder dependencies).
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("tasks", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
