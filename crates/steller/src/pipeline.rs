//! The layering session: construction through teardown.
//!
//! `ClusterLayering::build` runs every stage — nesting-graph construction,
//! ranking, dummy materialization, layer trees, the runs/fails reduction
//! loop, vertical-edge classification, and auxiliary teardown — and hands
//! the results to the coordinate-assignment collaborator through accessors
//! and a serializable snapshot.

use crate::cluster::{ClusterGraph, ClusterGraphCopy, ClusterId};
use crate::layer_tree::{self, LhTree};
use crate::model::{LayeringError, LayeringOptions, NodeKind, RcCrossings};
use crate::nesting_graph::ExtendedNestingGraph;
use crate::normalize;
use crate::order;
use crate::rank::{NetworkSimplex, Ranking};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use steller_graphlib::{EdgeId, NodeId};

/// The finished layering. Owns the extended nesting graph, the cluster
/// mirror, and every layer tree; dropping the session releases all of it.
pub struct ClusterLayering {
    eng: ExtendedNestingGraph,
    layers: Vec<LhTree>,
    crossings: RcCrossings,
    vertical: Vec<bool>,
}

impl ClusterLayering {
    /// Runs the full pipeline with the default network-simplex ranker.
    pub fn build(cg: &ClusterGraph, options: &LayeringOptions) -> Result<Self, LayeringError> {
        Self::build_with_ranker(cg, options, &NetworkSimplex)
    }

    pub fn build_with_ranker(
        cg: &ClusterGraph,
        options: &LayeringOptions,
        ranker: &dyn Ranking,
    ) -> Result<Self, LayeringError> {
        assert!(options.runs >= 1, "at least one reduction run is required");

        let mut eng = ExtendedNestingGraph::build(cg)?;
        eng.compute_ranking(cg, ranker);
        normalize::run(&mut eng, cg);
        let mut layers = layer_tree::build_layers(&mut eng);

        let mut rng = SmallRng::seed_from_u64(options.seed);
        let crossings = reduce_crossings(&mut layers, &mut eng, options, &mut rng);
        restore_pos(&mut layers, &mut eng);

        let vertical = classify_vertical(&mut layers, &eng, cg);
        remove_aux(&mut layers, &mut eng);

        Ok(Self {
            eng,
            layers,
            crossings,
            vertical,
        })
    }

    pub fn num_layers(&self) -> usize {
        self.eng.num_layers
    }

    pub fn crossings(&self) -> RcCrossings {
        self.crossings
    }

    pub fn eng(&self) -> &ExtendedNestingGraph {
        &self.eng
    }

    pub fn cgc(&self) -> &ClusterGraphCopy {
        &self.eng.cgc
    }

    pub fn rank(&self, v: NodeId) -> i32 {
        self.eng.rank(v)
    }

    pub fn pos(&self, v: NodeId) -> usize {
        self.eng.pos[v.index()]
    }

    pub fn kind(&self, v: NodeId) -> NodeKind {
        self.eng.kind(v)
    }

    /// The ENG copy of an input vertex.
    pub fn copy(&self, v: NodeId) -> NodeId {
        self.eng.copy[v.index()]
    }

    /// The chain of unit segments an input edge was subdivided into.
    pub fn chain(&self, e: EdgeId) -> &[EdgeId] {
        self.eng.chain(e)
    }

    pub fn is_vertical(&self, segment: EdgeId) -> bool {
        self.vertical[segment.index()]
    }

    /// The vertices of layer `i`, left to right.
    pub fn layer(&self, i: usize) -> Vec<NodeId> {
        let mut row: Vec<NodeId> = self
            .eng
            .g
            .node_ids()
            .filter(|&v| self.eng.rank(v) as usize == i)
            .collect();
        row.sort_by_key(|&v| self.eng.pos[v.index()]);
        row
    }

    pub fn snapshot(&self) -> LayeringSnapshot {
        let layers = (0..self.num_layers())
            .map(|i| {
                self.layer(i)
                    .into_iter()
                    .map(|v| VertexRecord {
                        id: v.index(),
                        kind: self.kind(v),
                        rank: self.rank(v),
                        pos: self.pos(v),
                        orig: self.eng.g.node(v).orig.map(|o| o.index()),
                    })
                    .collect()
            })
            .collect();

        let edges = (0..self.eng.chains.len())
            .map(|ix| {
                let e = EdgeId::new(ix);
                EdgeRecord {
                    id: ix,
                    segments: self
                        .chain(e)
                        .iter()
                        .map(|&seg| SegmentRecord {
                            source: self.eng.g.source(seg).index(),
                            target: self.eng.g.target(seg).index(),
                            vertical: self.is_vertical(seg),
                        })
                        .collect(),
                }
            })
            .collect();

        LayeringSnapshot {
            num_layers: self.num_layers(),
            crossings: (self.crossings.clusters, self.crossings.edges),
            layers,
            edges,
        }
    }
}

/// Serializable dump of a finished layering, for diffing runs and golden
/// tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayeringSnapshot {
    pub num_layers: usize,
    pub crossings: (u64, u64),
    pub layers: Vec<Vec<VertexRecord>>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexRecord {
    pub id: usize,
    pub kind: NodeKind,
    pub rank: i32,
    pub pos: usize,
    pub orig: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub id: usize,
    pub segments: Vec<SegmentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub source: usize,
    pub target: usize,
    pub vertical: bool,
}

fn store_pos(layers: &mut [LhTree]) {
    for tree in layers.iter_mut() {
        tree.store();
    }
}

fn restore_pos(layers: &mut [LhTree], eng: &mut ExtendedNestingGraph) {
    for tree in layers.iter_mut() {
        tree.restore();
        tree.assign_pos(&mut eng.pos);
    }
}

fn permute_pos<R: Rng>(layers: &mut [LhTree], eng: &mut ExtendedNestingGraph, rng: &mut R) {
    for tree in layers.iter_mut() {
        tree.permute(rng);
    }
    if let Some(first) = layers.first() {
        first.assign_pos(&mut eng.pos);
    }
}

/// Alternates top-down and bottom-up sweeps, keeps the best order seen, and
/// restarts from random permutations up to `runs` times.
fn reduce_crossings<R: Rng>(
    layers: &mut [LhTree],
    eng: &mut ExtendedNestingGraph,
    options: &LayeringOptions,
    rng: &mut R,
) -> RcCrossings {
    let mut best = RcCrossings::infinity();

    let mut run = 1;
    loop {
        let mut old = RcCrossings::infinity();
        // Signed: both sweeps of an iteration decrement on failure, so the
        // counter can dip below zero before the loop notices.
        let mut remaining = options.fails as i64 + 1;

        while remaining > 0 {
            let new = order::top_down_sweep(layers, eng);
            if new < old {
                if new < best {
                    store_pos(layers);
                    best = new;
                    if best.is_zero() {
                        break;
                    }
                }
                old = new;
                remaining = options.fails as i64 + 1;
            } else {
                remaining -= 1;
            }

            let new = order::bottom_up_sweep(layers, eng);
            if new < old {
                if new < best {
                    store_pos(layers);
                    best = new;
                    if best.is_zero() {
                        break;
                    }
                }
                old = new;
                remaining = options.fails as i64 + 1;
            } else {
                remaining -= 1;
            }
        }

        if best.is_zero() || run >= options.runs {
            break;
        }
        permute_pos(layers, eng, rng);
        run += 1;
    }

    best
}

/// A segment is drawn vertical when both ends are long-edge dummies whose
/// clusters coincide, or are parent/child/sibling with the endpoint sitting
/// exactly on the shared boundary rank. A cluster-crossing whose chosen
/// child order disagrees with the adjacent-layer positions flips its edge
/// back to non-vertical.
fn classify_vertical(
    layers: &mut [LhTree],
    eng: &ExtendedNestingGraph,
    cg: &ClusterGraph,
) -> Vec<bool> {
    let mut vertical = vec![false; eng.g.edge_bound()];

    let rank_top =
        |c: ClusterId| eng.rank(eng.top_of(c).expect("non-root cluster keeps its markers"));
    let rank_bottom =
        |c: ClusterId| eng.rank(eng.bottom_of(c).expect("non-root cluster keeps its markers"));

    for e in eng.g.edge_ids() {
        if eng.orig_edge(e).is_none() {
            continue;
        }
        let (u, v) = eng.g.endpoints(e);
        if !eng.is_long_edge_dummy(u) || !eng.is_long_edge_dummy(v) {
            continue;
        }

        let cu = eng.cgc.non_virtual(eng.cgc.node_parent(u));
        let cv = eng.cgc.non_virtual(eng.cgc.node_parent(v));
        let vert = if cu == cv {
            true
        } else {
            let cu_orig = eng.cgc.original(cu).expect("non-virtual cluster");
            let cv_orig = eng.cgc.original(cv).expect("non-virtual cluster");
            let cu_parent = cg.parent(cu_orig);
            let cv_parent = cg.parent(cv_orig);

            (cv_parent == Some(cu_orig) && eng.rank(v) == rank_top(cv_orig))
                || (cu_parent == Some(cv_orig) && eng.rank(u) == rank_bottom(cu_orig))
                || (cu_parent == cv_parent
                    && cu_parent.is_some()
                    && eng.rank(u) == rank_bottom(cu_orig)
                    && eng.rank(v) == rank_top(cv_orig))
        };
        vertical[e.index()] = vert;
    }

    for i in 1..layers.len() {
        let compounds = layers[i].compounds();
        for &c in &compounds {
            layers[i].set_child_pos(c);
        }
        for &c in &compounds {
            let tree = &layers[i];
            for cc in &tree.node(c).upper_cross {
                let j = tree.node(cc.c_node).pos;
                let k = tree.node(cc.u_node).pos;
                let pos_j = eng.pos[cc.uc.index()];
                let pos_k = eng.pos[cc.u.index()];
                debug_assert!(j != k);
                debug_assert!(pos_j != pos_k);

                if (j < k && pos_j > pos_k) || (j > k && pos_j < pos_k) {
                    vertical[cc.edge.index()] = false;
                }
            }
        }
    }

    vertical
}

/// Drops the auxiliary top-bottom vertices from the layer trees and the
/// graph, then renumbers each layer's positions to stay contiguous.
fn remove_aux(layers: &mut [LhTree], eng: &mut ExtendedNestingGraph) {
    for tree in layers.iter_mut() {
        tree.remove_aux_nodes();
    }

    let aux: Vec<NodeId> = eng
        .g
        .node_ids()
        .filter(|&v| eng.kind(v) == NodeKind::ClusterTopBottom)
        .collect();
    for v in aux {
        eng.g.remove_node(v);
    }
    for chain in eng.tb_chains.iter_mut() {
        chain.clear();
    }

    for tree in layers.iter() {
        tree.assign_pos(&mut eng.pos);
    }
}
