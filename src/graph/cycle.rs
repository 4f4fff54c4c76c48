use std::collections::HashMap;

use super::DependencyGraph;

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find cycles with an iterative 3-color DFS. Each cycle is the path from
/// the node where it was entered around to the node that closes it, without
/// repeating the entry. Every node is visited, including ones that only
/// appear as edge targets.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let adj = graph.adjacency();
    let mut color: HashMap<&str, Color> = adj.keys().map(|&n| (n, Color::White)).collect();
    let mut cycles = Vec::new();

    for &root in adj.keys() {
        if color[root] != Color::White {
            continue;
        }
        // (node, index of the next successor to look at)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        let mut path: Vec<&str> = vec![root];
        color.insert(root, Color::Gray);

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let successors = &adj[node];
            if top.1 < successors.len() {
                let succ = successors[top.1];
                top.1 += 1;
                match color[succ] {
                    Color::White => {
                        color.insert(succ, Color::Gray);
                        stack.push((succ, 0));
                        path.push(succ);
                    }
                    Color::Gray => {
                        if let Some(pos) = path.iter().position(|&n| n == succ) {
                            cycles.push(path[pos..].iter().map(|n| n.to_string()).collect());
                        }
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
                path.pop();
            }
        }
    }
    cycles
}

/// Check whether adding `predecessor → successor` would close a loop.
pub fn would_create_cycle(graph: &DependencyGraph, predecessor: &str, successor: &str) -> bool {
    let mut edges = graph.edges.clone();
    edges.push((predecessor.to_string(), successor.to_string()));
    let candidate = DependencyGraph::new(graph.nodes.iter().cloned(), edges);
    !find_cycles(&candidate).is_empty()
}
