//! Dependency graph over the tasks of one job.

pub mod cycle;
pub mod service;
pub mod topo;

use std::collections::{BTreeMap, BTreeSet};

pub use cycle::{find_cycles, would_create_cycle};
pub use service::{
    AddedDependency, BlockingDependency, DependencyGraphService, StartCheck, TraversalHit,
};
pub use topo::kahn_order;

/// Node and edge snapshot of a job's dependencies. Edges run
/// predecessor → successor.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: BTreeSet<String>,
    pub edges: Vec<(String, String)>,
}

impl DependencyGraph {
    pub fn new(nodes: impl IntoIterator<Item = String>, edges: Vec<(String, String)>) -> Self {
        let mut nodes: BTreeSet<String> = nodes.into_iter().collect();
        for (from, to) in &edges {
            nodes.insert(from.clone());
            nodes.insert(to.clone());
        }
        Self { nodes, edges }
    }

    /// Every node appears as a key, successors sorted.
    pub fn adjacency(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut adj: BTreeMap<&str, Vec<&str>> =
            self.nodes.iter().map(|n| (n.as_str(), Vec::new())).collect();
        for (from, to) in &self.edges {
            adj.entry(from.as_str()).or_default().push(to.as_str());
        }
        for successors in adj.values_mut() {
            successors.sort_unstable();
        }
        adj
    }
}

#[cfg(test)]
pub(crate) fn graph_of(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
    DependencyGraph::new(
        nodes.iter().map(|n| n.to_string()),
        edges.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
    )
}
