use std::collections::{BTreeSet, HashMap};

use super::DependencyGraph;

/// Kahn's algorithm. Ready nodes are taken in id order so the result is
/// stable. `None` when a cycle keeps some nodes from ever becoming ready.
pub fn kahn_order(graph: &DependencyGraph) -> Option<Vec<String>> {
    let adj = graph.adjacency();
    let mut in_degree: HashMap<&str, usize> = adj.keys().map(|&n| (n, 0)).collect();
    for successors in adj.values() {
        for &succ in successors {
            *in_degree.entry(succ).or_default() += 1;
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&node, _)| node)
        .collect();
    let mut order = Vec::with_capacity(adj.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        for &succ in &adj[node] {
            if let Some(degree) = in_degree.get_mut(succ) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(succ);
                }
            }
        }
    }

    (order.len() == adj.len()).then_some(order)
}
