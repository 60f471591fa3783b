//! Dependency graph and layer partition for a plan.
//!
//! The graph is built once from validated tasks. Nodes are plan positions
//! and an edge `a -> b` means `b` depends on `a`. Building fails if the
//! relation is cyclic: a topological sort that cannot order every node is
//! reported as a cycle.

use crate::core::task::{Task, TaskId};
use crate::error::PlanningError;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Layered view of a plan's dependency DAG.
///
/// Layer 0 holds tasks without dependencies; layer `k` holds tasks whose
/// dependencies all sit in layers below `k` (longest-path depth). Within a
/// layer, tasks keep plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Plan positions grouped by layer.
    layers: Vec<Vec<usize>>,
    /// Layer number for each plan position.
    depth: Vec<usize>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Build the graph for `tasks`.
    ///
    /// `index` maps every task id to its plan position; every dependency
    /// must already be known to it.
    pub fn build(
        tasks: &[Task],
        index: &HashMap<TaskId, usize>,
    ) -> Result<Self, PlanningError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(tasks.len(), 0);
        let nodes: Vec<NodeIndex> = (0..tasks.len()).map(|pos| graph.add_node(pos)).collect();

        for (pos, task) in tasks.iter().enumerate() {
            for dep in &task.depends_on {
                let dep_pos = *index.get(dep).ok_or_else(|| PlanningError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                })?;
                graph.add_edge(nodes[dep_pos], nodes[pos], ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| PlanningError::CyclicDependency {
            task: tasks[graph[cycle.node_id()]].id.clone(),
        })?;

        let mut depth = vec![0usize; tasks.len()];
        for node in order {
            let pos = graph[node];
            depth[pos] = graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .map(|dep| depth[graph[dep]] + 1)
                .max()
                .unwrap_or(0);
        }

        let layer_count = depth.iter().map(|d| d + 1).max().unwrap_or(0);
        let mut layers = vec![Vec::new(); layer_count];
        for (pos, d) in depth.iter().enumerate() {
            layers[*d].push(pos);
        }

        Ok(Self {
            layers,
            depth,
            edge_count: graph.edge_count(),
        })
    }

    /// Plan positions grouped by layer, lowest layer first.
    pub fn layers(&self) -> &[Vec<usize>] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer that the task at `pos` belongs to.
    pub fn layer_of(&self, pos: usize) -> Option<usize> {
        self.depth.get(pos).copied()
    }

    pub fn dependency_count(&self) -> usize {
        self.edge_count
    }
}
