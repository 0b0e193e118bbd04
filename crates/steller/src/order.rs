//! Crossing reduction: orders the children of every compound node to
//! minimize `(cluster crossings, edge crossings)`.
//!
//! Per compound, pairwise costs for both relative orders of every child
//! pair are counted from the adjacency records and crossing witnesses, the
//! order forced by the same cluster on the adjacent layer is seeded as hard
//! constraints, and the remaining pairs are placed greedily (largest
//! benefit first) into an acyclic ordering graph. Its topological numbering
//! becomes the new child order.

use crate::acyclic::LeveledDag;
use crate::layer_tree::{Adjacency, LhId, LhTree};
use crate::model::RcCrossings;
use crate::nesting_graph::ExtendedNestingGraph;

/// Processes layers `1..n` against their upper neighbours.
pub fn top_down_sweep(trees: &mut [LhTree], eng: &mut ExtendedNestingGraph) -> RcCrossings {
    let mut total = RcCrossings::ZERO;
    for i in 1..trees.len() {
        total += reduce_layer(trees, eng, i, true);
    }
    total
}

/// Processes layers `n-2..0` against their lower neighbours.
pub fn bottom_up_sweep(trees: &mut [LhTree], eng: &mut ExtendedNestingGraph) -> RcCrossings {
    let mut total = RcCrossings::ZERO;
    for i in (0..trees.len().saturating_sub(1)).rev() {
        total += reduce_layer(trees, eng, i, false);
    }
    total
}

pub fn reduce_layer(
    trees: &mut [LhTree],
    eng: &mut ExtendedNestingGraph,
    i: usize,
    top_down: bool,
) -> RcCrossings {
    let (neighbour, tree) = if top_down {
        let (head, tail) = trees.split_at_mut(i);
        (&head[i - 1], &mut tail[0])
    } else {
        let (head, tail) = trees.split_at_mut(i + 1);
        (&tail[0], &mut head[i])
    };

    let mut total = RcCrossings::ZERO;
    for compound in tree.compounds() {
        total += reduce_compound(tree, neighbour, eng, compound, top_down);
    }
    tree.assign_pos(&mut eng.pos);
    total
}

struct RcEdge {
    src: usize,
    tgt: usize,
    cost: RcCrossings,
    reverse_cost: RcCrossings,
}

fn reduce_compound(
    tree: &mut LhTree,
    neighbour: &LhTree,
    eng: &ExtendedNestingGraph,
    compound: LhId,
    top_down: bool,
) -> RcCrossings {
    let n = tree.node(compound).children.len();
    if n < 2 {
        return RcCrossings::ZERO;
    }
    tree.set_child_pos(compound);

    // Pair-cost matrix, row-major: cn[j*n + k] counts crossings caused by
    // placing child j left of child k.
    let mut cn = vec![RcCrossings::ZERO; n * n];

    let mut adj: Vec<Vec<Adjacency>> = vec![Vec::new(); n];
    {
        let list = if top_down {
            &tree.node(compound).upper_adj
        } else {
            &tree.node(compound).lower_adj
        };
        for a in list {
            adj[tree.node(a.v).pos].push(*a);
        }
    }

    for j in 0..n {
        for aj in &adj[j] {
            let pos_j = eng.pos[aj.u.index()];
            for (k, bucket) in adj.iter().enumerate().skip(j + 1) {
                for ak in bucket {
                    let pos_k = eng.pos[ak.u.index()];
                    let weight = aj.weight * ak.weight;
                    if pos_j > pos_k {
                        cn[j * n + k].inc_edges(weight);
                    }
                    if pos_k > pos_j {
                        cn[k * n + j].inc_edges(weight);
                    }
                }
            }
        }
    }

    {
        let crossings = if top_down {
            &tree.node(compound).upper_cross
        } else {
            &tree.node(compound).lower_cross
        };
        for cc in crossings {
            let j = tree.node(cc.c_node).pos;
            let k = tree.node(cc.u_node).pos;
            let pos_j = eng.pos[cc.uc.index()];
            let pos_k = eng.pos[cc.u.index()];
            debug_assert!(j != k);
            debug_assert!(pos_j != pos_k);

            if pos_j > pos_k {
                cn[j * n + k].inc_clusters();
            } else {
                cn[k * n + j].inc_clusters();
            }
        }
    }

    // Ordering graph; vertex j stands for the child currently at position j.
    let mut ordering = LeveledDag::new(n);

    // Hard constraints: the same cluster on the adjacent layer has already
    // ordered its children there; children existing on both layers must
    // keep that relative order.
    let sibling = if top_down {
        tree.node(compound).up
    } else {
        tree.node(compound).down
    };
    if let Some(sibling) = sibling {
        let mut prev: Option<usize> = None;
        for &child in &neighbour.node(sibling).children {
            let link = if top_down {
                neighbour.node(child).down
            } else {
                neighbour.node(child).up
            };
            let Some(here) = link else {
                continue;
            };
            let tgt = tree.node(here).pos;
            if let Some(src) = prev {
                let accepted = ordering.try_edge(src, tgt, false);
                debug_assert!(accepted.is_some(), "adjacent-layer order is acyclic");
            }
            prev = Some(tgt);
        }
    }

    // Preference edges, oriented toward the cheaper relative order and
    // processed in order of decreasing benefit.
    let mut edges: Vec<RcEdge> = Vec::with_capacity(n * (n - 1) / 2);
    for j in 0..n {
        for k in j + 1..n {
            let (src, tgt) = if cn[j * n + k] <= cn[k * n + j] {
                (j, k)
            } else {
                (k, j)
            };
            edges.push(RcEdge {
                src,
                tgt,
                cost: cn[src * n + tgt],
                reverse_cost: cn[tgt * n + src],
            });
        }
    }
    edges.sort_by(|a, b| {
        let benefit_a = a.reverse_cost.diff(a.cost);
        let benefit_b = b.reverse_cost.diff(b.cost);
        benefit_b
            .cmp(&benefit_a)
            .then_with(|| (a.src, a.tgt).cmp(&(b.src, b.tgt)))
    });

    let mut total = RcCrossings::ZERO;
    for e in &edges {
        if ordering.try_edge(e.src, e.tgt, false).is_some() {
            total += e.cost;
        } else {
            total += e.reverse_cost;
        }
    }

    // Emit: child at position j moves to its topological number.
    let numbering = ordering.topological_numbering();
    let old = tree.node(compound).children.clone();
    let mut reordered = old.clone();
    for (j, &child) in old.iter().enumerate() {
        reordered[numbering[j]] = child;
    }
    tree.node_mut(compound).children = reordered;

    total
}
