//! Long-edge normalization: every chain segment must span exactly one layer.
//!
//! Original-edge chains are split with `Dummy` vertices, preliminarily
//! parked in the endpoints' LCA cluster and then pulled into the tightest
//! cluster the rank layout permits. `top(c) -> bottom(c)` chains are split
//! with `ClusterTopBottom` vertices owned by `c`.

use crate::cluster::{ClusterGraph, ClusterId};
use crate::model::NodeKind;
use crate::nesting_graph::{EdgeKind, EngEdge, EngNode, ExtendedNestingGraph};

pub fn run(eng: &mut ExtendedNestingGraph, cg: &ClusterGraph) {
    for e in cg.graph().edge_ids() {
        split_chain(eng, cg, e);
    }

    for c in cg.cluster_ids() {
        if cg.parent(c).is_some() {
            split_top_bottom(eng, c);
        }
    }
}

fn split_chain(eng: &mut ExtendedNestingGraph, cg: &ClusterGraph, e: steller_graphlib::EdgeId) {
    let first = eng.chains[e.index()][0];
    let (u_h, v_h) = eng.g.endpoints(first);
    let span = eng.rank(v_h) - eng.rank(u_h);
    debug_assert!(span >= 1);
    if span < 2 {
        return;
    }

    // Chain-direction endpoints; a reversed chain swaps them relative to e.
    let u = eng.g.node(u_h).orig.expect("chain starts at a vertex copy");
    let v = eng.g.node(v_h).orig.expect("chain ends at a vertex copy");

    let c_top = cg.lca_cluster(u, v);
    let c_top_copy = eng.cgc.copy(c_top);

    let mut last = first;
    for i in eng.rank(u_h) + 1..eng.rank(v_h) {
        let (w, f) = eng.g.split_edge(
            last,
            EngNode {
                kind: NodeKind::Dummy,
                orig: None,
                cluster: None,
                rank: i,
            },
            EngEdge {
                kind: EdgeKind::Orig(e),
            },
        );
        eng.cgc.set_parent(w, c_top_copy);
        eng.chains[e.index()].push(f);
        last = f;
    }

    improve_assignment(eng, cg, e, u, v, u_h, v_h);
}

/// Walks both endpoint clusters upward until every dummy can sit in the
/// narrowest cluster that legally contains its rank, then reassigns the
/// chain prefix (from the tail side) and suffix (from the head side).
fn improve_assignment(
    eng: &mut ExtendedNestingGraph,
    cg: &ClusterGraph,
    e: steller_graphlib::EdgeId,
    u: steller_graphlib::NodeId,
    v: steller_graphlib::NodeId,
    u_h: steller_graphlib::NodeId,
    v_h: steller_graphlib::NodeId,
) {
    let root = cg.root();
    let c1_start = cg.cluster_of(u);
    let c2_start = cg.cluster_of(v);

    let rank_top = |eng: &ExtendedNestingGraph, c: ClusterId| {
        eng.rank(eng.top_of(c).expect("non-root cluster keeps its markers"))
    };
    let rank_bottom = |eng: &ExtendedNestingGraph, c: ClusterId| {
        eng.rank(eng.bottom_of(c).expect("non-root cluster keeps its markers"))
    };

    let mut c1 = Some(c1_start);
    let mut c2 = Some(c2_start);

    if c1_start == root
        || c2_start == root
        || rank_bottom(eng, c1_start) >= rank_top(eng, c2_start)
    {
        if c2_start != root && eng.rank(u_h) < rank_top(eng, c2_start) {
            // The chain enters c2's span from above; only the head side
            // constrains the dummies.
            c1 = None;
            let mut c = c2_start;
            while let Some(p) = cg.parent(c) {
                if p == root || eng.rank(u_h) >= rank_top(eng, p) {
                    break;
                }
                c = p;
            }
            c2 = Some(c);
        } else if c1_start != root && eng.rank(v_h) > rank_bottom(eng, c1_start) {
            c2 = None;
            let mut c = c1_start;
            while let Some(p) = cg.parent(c) {
                if p == root || eng.rank(v_h) <= rank_bottom(eng, p) {
                    break;
                }
                c = p;
            }
            c1 = Some(c);
        } else {
            // Every dummy stays in the LCA cluster.
            return;
        }
    } else {
        // Both sides climb until their spans no longer leave a gap.
        let mut a = c1_start;
        let mut b = c2_start;
        loop {
            let mut advanced = false;
            if let Some(p) = cg.parent(a) {
                if p != root && rank_bottom(eng, p) < rank_top(eng, b) {
                    a = p;
                    advanced = true;
                }
            }
            if let Some(p) = cg.parent(b) {
                if p != root && rank_bottom(eng, a) < rank_top(eng, p) {
                    b = p;
                    advanced = true;
                }
            }
            if !advanced {
                break;
            }
        }
        c1 = Some(a);
        c2 = Some(b);
    }

    let chain_len = eng.chains[e.index()].len();

    if let Some(stop_below) = c1 {
        let stop = cg.parent(stop_below);
        let mut c = c1_start;
        let mut it = 0usize;
        while Some(c) != stop {
            while it < chain_len {
                let seg = eng.chains[e.index()][it];
                let d = eng.g.target(seg);
                if eng.rank(d) > rank_bottom(eng, c) {
                    break;
                }
                let mirror = eng.cgc.copy(c);
                eng.cgc.set_parent(d, mirror);
                it += 1;
            }
            match cg.parent(c) {
                Some(p) => c = p,
                None => break,
            }
        }
    }

    if let Some(stop_below) = c2 {
        let stop = cg.parent(stop_below);
        let mut c = c2_start;
        let mut it = chain_len - 1;
        'climb: while Some(c) != stop {
            loop {
                let seg = eng.chains[e.index()][it];
                let d = eng.g.source(seg);
                if eng.rank(d) < rank_top(eng, c) {
                    break;
                }
                let mirror = eng.cgc.copy(c);
                eng.cgc.set_parent(d, mirror);
                if it == 0 {
                    break 'climb;
                }
                it -= 1;
            }
            match cg.parent(c) {
                Some(p) => c = p,
                None => break,
            }
        }
    }
}

fn split_top_bottom(eng: &mut ExtendedNestingGraph, c: ClusterId) {
    let first = eng.tb_chains[c.index()][0];
    let (t, b) = eng.g.endpoints(first);
    let span = eng.rank(b) - eng.rank(t);
    debug_assert!(span >= 1);
    if span < 2 {
        return;
    }

    let mirror = eng.cgc.copy(c);
    let mut last = first;
    for i in eng.rank(t) + 1..eng.rank(b) {
        let (w, f) = eng.g.split_edge(
            last,
            EngNode {
                kind: NodeKind::ClusterTopBottom,
                orig: None,
                cluster: Some(c),
                rank: i,
            },
            EngEdge {
                kind: EdgeKind::TopBottom(c),
            },
        );
        eng.cgc.set_parent(w, mirror);
        eng.tb_chains[c.index()].push(f);
        last = f;
    }
}
