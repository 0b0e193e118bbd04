//! Traversal helpers shared by the layering passes and their tests.

use crate::{DiGraph, NodeId};
use std::collections::VecDeque;

/// Kahn topological order over the live nodes; ties broken by ascending id.
/// Returns `None` when the graph contains a directed cycle.
pub fn topological_order<N, E>(g: &DiGraph<N, E>) -> Option<Vec<NodeId>> {
    let mut in_deg = vec![0usize; g.node_bound()];
    for v in g.node_ids() {
        in_deg[v.index()] = g.in_degree(v);
    }

    let mut queue: VecDeque<NodeId> = g.node_ids().filter(|v| in_deg[v.index()] == 0).collect();
    let mut order = Vec::with_capacity(g.node_count());

    while let Some(v) = queue.pop_front() {
        order.push(v);
        for w in g.successors(v) {
            in_deg[w.index()] -= 1;
            if in_deg[w.index()] == 0 {
                queue.push_back(w);
            }
        }
    }

    (order.len() == g.node_count()).then_some(order)
}

pub fn is_acyclic<N, E>(g: &DiGraph<N, E>) -> bool {
    topological_order(g).is_some()
}

/// Weakly connected components, each listed in ascending node id order.
pub fn components<N, E>(g: &DiGraph<N, E>) -> Vec<Vec<NodeId>> {
    let mut seen = vec![false; g.node_bound()];
    let mut out = Vec::new();

    for root in g.node_ids() {
        if seen[root.index()] {
            continue;
        }
        let mut comp = Vec::new();
        let mut stack = vec![root];
        seen[root.index()] = true;
        while let Some(v) = stack.pop() {
            comp.push(v);
            for w in g.successors(v).chain(g.predecessors(v)) {
                if !seen[w.index()] {
                    seen[w.index()] = true;
                    stack.push(w);
                }
            }
        }
        comp.sort();
        out.push(comp);
    }
    out
}
