//! Extended nesting graph construction and the ranking stage.
//!
//! The extended nesting graph (ENG) is a DAG holding a copy of every input
//! vertex plus a top and bottom boundary marker per cluster. Containment
//! edges force every member between its cluster's markers; adjacency edges
//! mirror the input edges (reversed when nesting constraints leave no other
//! choice); cluster-order edges transfer inter-cluster adjacency onto the
//! boundary markers so sibling clusters stack instead of interleave.
//!
//! Acyclicity is preserved edge by edge through a leveled-DAG mirror; the
//! levels are construction scaffolding and are dropped afterwards.

use crate::acyclic::LeveledDag;
use crate::cluster::{ClusterGraph, ClusterGraphCopy, ClusterId};
use crate::model::{LayeringError, NodeKind, self_loop};
use crate::rank::{RankProblem, Ranking};
use steller_graphlib::{DiGraph, EdgeId, NodeId, alg};

/// Per-vertex attributes of the ENG.
#[derive(Debug, Clone)]
pub struct EngNode {
    pub kind: NodeKind,
    /// The mirrored input vertex, for `NodeKind::Node`.
    pub orig: Option<NodeId>,
    /// Owning cluster of a boundary marker or top-bottom dummy.
    pub cluster: Option<ClusterId>,
    pub rank: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Containment or cluster-order edge; pruned after ranking.
    Nesting,
    /// Segment of an original edge's chain.
    Orig(EdgeId),
    /// Segment of a `top(c) -> bottom(c)` chain.
    TopBottom(ClusterId),
}

#[derive(Debug, Clone, Copy)]
pub struct EngEdge {
    pub kind: EdgeKind,
}

impl EngEdge {
    pub fn orig_edge(&self) -> Option<EdgeId> {
        match self.kind {
            EdgeKind::Orig(e) => Some(e),
            _ => None,
        }
    }
}

/// The session-owned auxiliary graph, its cluster mirror, and the chain and
/// layer bookkeeping shared by every later stage.
pub struct ExtendedNestingGraph {
    pub g: DiGraph<EngNode, EngEdge>,
    pub cgc: ClusterGraphCopy,
    /// Input vertex -> ENG copy.
    pub copy: Vec<NodeId>,
    /// Input cluster -> boundary markers; `None` for the root once the
    /// ranking stage removes its markers.
    pub top: Vec<Option<NodeId>>,
    pub bottom: Vec<Option<NodeId>>,
    /// Input edge -> ordered chain of ENG segments. Until dummy
    /// materialization the chain is a single (possibly long) segment.
    pub chains: Vec<Vec<EdgeId>>,
    /// Input cluster -> chain of its `top -> bottom` edge (empty for root).
    pub tb_chains: Vec<Vec<EdgeId>>,
    /// ENG vertex -> position within its layer; meaningful once the layer
    /// trees exist.
    pub pos: Vec<usize>,
    pub num_layers: usize,
}

impl ExtendedNestingGraph {
    /// Builds the ENG for `cg`, rejecting self-loops and cyclic inputs.
    pub fn build(cg: &ClusterGraph) -> Result<Self, LayeringError> {
        for e in cg.graph().edge_ids() {
            let (u, v) = cg.graph().endpoints(e);
            if u == v {
                return Err(self_loop(u));
            }
        }
        if !alg::is_acyclic(cg.graph()) {
            return Err(LayeringError::CyclicInput);
        }

        let mut g: DiGraph<EngNode, EngEdge> = DiGraph::with_capacity(
            cg.graph().node_count() + 2 * cg.cluster_count(),
            cg.graph().edge_count() + 4 * cg.cluster_count(),
        );
        let mut cgc = ClusterGraphCopy::new(cg);

        // Vertex copies.
        let mut copy = Vec::with_capacity(cg.graph().node_bound());
        for v in cg.graph().node_ids() {
            let v_h = g.add_node(EngNode {
                kind: NodeKind::Node,
                orig: Some(v),
                cluster: None,
                rank: 0,
            });
            debug_assert_eq!(copy.len(), v.index());
            copy.push(v_h);
            cgc.set_parent(v_h, cgc.copy(cg.cluster_of(v)));
        }

        // Boundary markers.
        let mut top = Vec::with_capacity(cg.cluster_count());
        let mut bottom = Vec::with_capacity(cg.cluster_count());
        for c in cg.cluster_ids() {
            let t = g.add_node(EngNode {
                kind: NodeKind::ClusterTop,
                orig: None,
                cluster: Some(c),
                rank: 0,
            });
            let b = g.add_node(EngNode {
                kind: NodeKind::ClusterBottom,
                orig: None,
                cluster: Some(c),
                rank: 0,
            });
            cgc.set_parent(t, cgc.copy(c));
            cgc.set_parent(b, cgc.copy(c));
            top.push(Some(t));
            bottom.push(Some(b));
        }
        let top_of = |c: ClusterId| top[c.index()].expect("marker exists during construction");
        let bottom_of = |c: ClusterId| bottom[c.index()].expect("marker exists during construction");

        // Containment edges.
        let mut dag = LeveledDag::new(g.node_bound());
        let nesting = EngEdge {
            kind: EdgeKind::Nesting,
        };
        let connect = |g: &mut DiGraph<EngNode, EngEdge>,
                           dag: &mut LeveledDag,
                           u: NodeId,
                           v: NodeId,
                           weight: EngEdge| {
            dag.add_edge_unchecked(u.index(), v.index());
            g.add_edge(u, v, weight)
        };

        for v in cg.graph().node_ids() {
            let c = cg.cluster_of(v);
            connect(&mut g, &mut dag, top_of(c), copy[v.index()], nesting);
            connect(&mut g, &mut dag, copy[v.index()], bottom_of(c), nesting);
        }

        let mut tb_chains = vec![Vec::new(); cg.cluster_count()];
        for c in cg.cluster_ids() {
            if let Some(parent) = cg.parent(c) {
                connect(&mut g, &mut dag, top_of(parent), top_of(c), nesting);
                connect(&mut g, &mut dag, bottom_of(c), bottom_of(parent), nesting);
                let tb = connect(
                    &mut g,
                    &mut dag,
                    top_of(c),
                    bottom_of(c),
                    EngEdge {
                        kind: EdgeKind::TopBottom(c),
                    },
                );
                tb_chains[c.index()] = vec![tb];
            }
        }

        // Seed the levels with a containment-consistent topological order.
        let mut counter = 0;
        assign_ae_level(cg, &copy, &top, &bottom, &mut dag, cg.root(), &mut counter);

        // Adjacency edges. With reversal allowed the insertion always
        // succeeds; a reversed chain is recognized later by comparing the
        // first segment's source against the copy of the input source.
        let mut chains = vec![Vec::new(); cg.graph().edge_bound()];
        for e in cg.graph().edge_ids() {
            let (u, v) = cg.graph().endpoints(e);
            let (a, b) = dag
                .try_edge(copy[u.index()].index(), copy[v.index()].index(), true)
                .expect("reversal is allowed");
            let e_h = g.add_edge(
                NodeId::new(a),
                NodeId::new(b),
                EngEdge {
                    kind: EdgeKind::Orig(e),
                },
            );
            chains[e.index()].push(e_h);
        }

        // Cluster-order edges: prefer ordering the witness clusters under
        // the LCA; fall back to vertex/marker edges when that would cycle.
        for e in cg.graph().edge_ids() {
            let (mut u, mut v) = cg.graph().endpoints(e);
            if g.source(chains[e.index()][0]) != copy[u.index()] {
                std::mem::swap(&mut u, &mut v);
            }
            if cg.cluster_of(u) == cg.cluster_of(v) {
                continue;
            }

            let lca = cg.lca_with_witnesses(u, v);
            let (c_from, c_to) = (lca.from_u, lca.from_v);

            let mut added = false;
            if c_from != lca.lca && c_to != lca.lca {
                if let Some((a, b)) =
                    dag.try_edge(bottom_of(c_from).index(), top_of(c_to).index(), false)
                {
                    g.add_edge(NodeId::new(a), NodeId::new(b), nesting);
                    added = true;
                }
            }
            if !added {
                if let Some((a, b)) =
                    dag.try_edge(copy[u.index()].index(), top_of(c_to).index(), false)
                {
                    g.add_edge(NodeId::new(a), NodeId::new(b), nesting);
                }
                if let Some((a, b)) =
                    dag.try_edge(bottom_of(c_from).index(), copy[v.index()].index(), false)
                {
                    g.add_edge(NodeId::new(a), NodeId::new(b), nesting);
                }
            }
        }

        debug_assert!(alg::is_acyclic(&g));

        Ok(Self {
            g,
            cgc,
            copy,
            top,
            bottom,
            chains,
            tb_chains,
            pos: Vec::new(),
            num_layers: 0,
        })
    }

    pub fn kind(&self, v: NodeId) -> NodeKind {
        self.g.node(v).kind
    }

    pub fn rank(&self, v: NodeId) -> i32 {
        self.g.node(v).rank
    }

    pub fn orig_edge(&self, e: EdgeId) -> Option<EdgeId> {
        self.g.edge(e).orig_edge()
    }

    pub fn is_long_edge_dummy(&self, v: NodeId) -> bool {
        self.kind(v) == NodeKind::Dummy
    }

    pub fn chain(&self, e: EdgeId) -> &[EdgeId] {
        &self.chains[e.index()]
    }

    /// Whether the chain of input edge `e` runs opposite to the edge.
    pub fn chain_reversed(&self, cg: &ClusterGraph, e: EdgeId) -> bool {
        let first = self.chains[e.index()][0];
        self.g.source(first) != self.copy[cg.graph().source(e).index()]
    }

    pub fn top_of(&self, c: ClusterId) -> Option<NodeId> {
        self.top[c.index()]
    }

    pub fn bottom_of(&self, c: ClusterId) -> Option<NodeId> {
        self.bottom[c.index()]
    }

    /// Ranking stage: rank via the injected capability, tighten cluster
    /// boundaries, prune the scaffolding edges, drop the root markers, and
    /// compact ranks to `0..num_layers`.
    pub fn compute_ranking(&mut self, cg: &ClusterGraph, ranker: &dyn Ranking) {
        let mut problem = RankProblem::new(self.g.node_bound());
        for e in self.g.edge_ids() {
            let (u, v) = self.g.endpoints(e);
            let u_is_node = self.kind(u) == NodeKind::Node;
            let v_is_node = self.kind(v) == NodeKind::Node;
            let length = if u_is_node == v_is_node { 2 } else { 1 };
            let cost = if self.orig_edge(e).is_some() { 2.0 } else { 1.0 };
            problem.constrain(u.index(), v.index(), length, cost);
        }
        let ranks = ranker.rank(&problem);
        let node_ids: Vec<_> = self.g.node_ids().collect();
        for v in node_ids {
            self.g.node_mut(v).rank = ranks[v.index()];
        }

        self.tighten_cluster_spans(cg);
        self.prune_and_compact(cg);
    }

    /// Pulls every cluster's markers as close to its content as the
    /// containment offsets allow: members at offset 1, child markers at
    /// offset 2. Children first (post-order), so parents see tightened
    /// child spans.
    fn tighten_cluster_spans(&mut self, cg: &ClusterGraph) {
        for c in cg.post_order() {
            let mut t = i32::MAX;
            let mut b = i32::MIN;

            for &v in cg.nodes_of(c) {
                let r = self.rank(self.copy[v.index()]);
                t = t.min(r - 1);
                b = b.max(r + 1);
            }
            for &child in cg.children(c) {
                let rt = self.rank(self.top[child.index()].expect("child marker"));
                let rb = self.rank(self.bottom[child.index()].expect("child marker"));
                t = t.min(rt - 2);
                b = b.max(rb + 2);
            }

            if t < i32::MAX {
                let ct = self.top[c.index()].expect("marker exists before compaction");
                let cb = self.bottom[c.index()].expect("marker exists before compaction");
                debug_assert!(self.rank(ct) <= t && b <= self.rank(cb));
                self.g.node_mut(ct).rank = t;
                self.g.node_mut(cb).rank = b;
            }
        }
    }

    fn prune_and_compact(&mut self, cg: &ClusterGraph) {
        let scaffolding: Vec<EdgeId> = self
            .g
            .edge_ids()
            .filter(|&e| self.g.edge(e).kind == EdgeKind::Nesting)
            .collect();
        for e in scaffolding {
            self.g.remove_edge(e);
        }

        let root = cg.root();
        self.g
            .remove_node(self.top[root.index()].take().expect("root top marker"));
        self.g
            .remove_node(self.bottom[root.index()].take().expect("root bottom marker"));

        // Compact: occupied ranks become the contiguous layers 0..n.
        let mut occupied: Vec<i32> = self.g.node_ids().map(|v| self.rank(v)).collect();
        occupied.sort_unstable();
        occupied.dedup();
        let remap: rustc_hash::FxHashMap<i32, i32> = occupied
            .iter()
            .enumerate()
            .map(|(i, &r)| (r, i as i32))
            .collect();
        for v in self.g.node_ids().collect::<Vec<_>>() {
            let r = self.rank(v);
            self.g.node_mut(v).rank = remap[&r];
        }
        self.num_layers = occupied.len();

        debug_assert!(alg::is_acyclic(&self.g));
    }
}

/// Depth-first level seeding: `top(c)`, then `c`'s direct members, then each
/// child cluster, then `bottom(c)`.
fn assign_ae_level(
    cg: &ClusterGraph,
    copy: &[NodeId],
    top: &[Option<NodeId>],
    bottom: &[Option<NodeId>],
    dag: &mut LeveledDag,
    c: ClusterId,
    counter: &mut i32,
) {
    dag.set_level(top[c.index()].expect("marker").index(), *counter);
    *counter += 1;

    for &v in cg.nodes_of(c) {
        dag.set_level(copy[v.index()].index(), *counter);
        *counter += 1;
    }
    for &child in cg.children(c) {
        assign_ae_level(cg, copy, top, bottom, dag, child, counter);
    }

    dag.set_level(bottom[c.index()].expect("marker").index(), *counter);
    *counter += 1;
}
