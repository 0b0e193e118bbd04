//! Layer hierarchy trees.
//!
//! Each layer gets an arena-allocated tree: one compound node per cluster
//! active on the layer, one leaf per graph vertex on it. Compound nodes for
//! the same cluster on adjacent layers are linked `up`/`down`, which is what
//! lets crossing reduction carry a cluster's child order from one layer to
//! the next. Compounds also collect the adjacency records and the
//! cluster-crossing witnesses that drive the reduction objective.

use crate::cluster::CgcClusterId;
use crate::model::NodeKind;
use crate::nesting_graph::ExtendedNestingGraph;
use rand::Rng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use steller_graphlib::{EdgeId, NodeId};

/// Index of a tree node within its layer's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LhId(u32);

impl LhId {
    pub fn new(ix: usize) -> Self {
        LhId(ix as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A tree node reference across layers: `(layer, index)`.
pub type LhRef = (usize, LhId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LhKind {
    Compound(CgcClusterId),
    Leaf { vertex: NodeId, aux: bool },
}

/// An edge endpoint on the adjacent layer (`u`) pulling on a child (`v`) of
/// the compound holding this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacency {
    pub u: NodeId,
    pub v: LhId,
    pub weight: u64,
}

/// Witness of a potential crossing between a `top->bottom` chain and a
/// foreign original-edge segment, recorded on their common compound.
#[derive(Debug, Clone, Copy)]
pub struct ClusterCrossing {
    /// Endpoint of the top-bottom segment on the adjacent layer.
    pub uc: NodeId,
    /// Child whose subtree holds the top-bottom dummy on this layer.
    pub c_node: LhId,
    /// Endpoint of the foreign segment on the adjacent layer.
    pub u: NodeId,
    /// Child whose subtree holds the foreign segment's endpoint here.
    pub u_node: LhId,
    /// The foreign segment itself.
    pub edge: EdgeId,
}

#[derive(Debug, Clone)]
pub struct LhTreeNode {
    pub kind: LhKind,
    pub parent: Option<LhId>,
    pub children: Vec<LhId>,
    /// Index among the parent's children.
    pub pos: usize,
    /// Same cluster's compound on the previous layer.
    pub up: Option<LhId>,
    /// Same cluster's compound on the next layer.
    pub down: Option<LhId>,
    pub upper_adj: Vec<Adjacency>,
    pub lower_adj: Vec<Adjacency>,
    pub upper_cross: Vec<ClusterCrossing>,
    pub lower_cross: Vec<ClusterCrossing>,
    stored: Vec<LhId>,
}

impl LhTreeNode {
    fn new(kind: LhKind, parent: Option<LhId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            pos: 0,
            up: None,
            down: None,
            upper_adj: Vec::new(),
            lower_adj: Vec::new(),
            upper_cross: Vec::new(),
            lower_cross: Vec::new(),
            stored: Vec::new(),
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.kind, LhKind::Compound(_))
    }

    pub fn cluster(&self) -> Option<CgcClusterId> {
        match self.kind {
            LhKind::Compound(c) => Some(c),
            LhKind::Leaf { .. } => None,
        }
    }
}

/// One layer's hierarchy tree; the arena owns every node of the layer.
#[derive(Debug, Clone, Default)]
pub struct LhTree {
    pub nodes: Vec<LhTreeNode>,
    pub root: LhId,
}

impl LhTree {
    fn push(&mut self, node: LhTreeNode) -> LhId {
        let id = LhId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: LhId) -> &LhTreeNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: LhId) -> &mut LhTreeNode {
        &mut self.nodes[id.index()]
    }

    /// Compound nodes, root first, in breadth-first order.
    pub fn compounds(&self) -> Vec<LhId> {
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            if !self.node(id).is_compound() {
                continue;
            }
            out.push(id);
            for &child in &self.node(id).children {
                queue.push_back(child);
            }
        }
        out
    }

    /// Rewrites every child's `pos` to its index under its parent.
    pub fn set_child_pos(&mut self, compound: LhId) {
        let children = self.node(compound).children.clone();
        for (i, child) in children.into_iter().enumerate() {
            self.node_mut(child).pos = i;
        }
    }

    fn set_all_pos(&mut self) {
        for c in self.compounds() {
            self.set_child_pos(c);
        }
    }

    /// In-order leaf numbering into the per-vertex position table.
    pub fn assign_pos(&self, pos: &mut [usize]) {
        let mut count = 0usize;
        self.assign_pos_from(self.root, pos, &mut count);
    }

    fn assign_pos_from(&self, id: LhId, pos: &mut [usize], count: &mut usize) {
        match self.node(id).kind {
            LhKind::Compound(_) => {
                let children = &self.node(id).children;
                for &child in children {
                    self.assign_pos_from(child, pos, count);
                }
            }
            LhKind::Leaf { vertex, .. } => {
                pos[vertex.index()] = *count;
                *count += 1;
            }
        }
    }

    /// Snapshots every compound's child order.
    pub fn store(&mut self) {
        for id in self.compounds() {
            let children = self.node(id).children.clone();
            self.node_mut(id).stored = children;
        }
    }

    /// Re-materializes the snapshotted child orders.
    pub fn restore(&mut self) {
        for id in self.compounds() {
            let stored = self.node(id).stored.clone();
            if !stored.is_empty() {
                self.node_mut(id).children = stored;
            }
            self.set_child_pos(id);
        }
    }

    /// Fresh uniform permutation of every compound's children.
    pub fn permute<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for id in self.compounds() {
            self.node_mut(id).children.shuffle(rng);
            self.set_child_pos(id);
        }
    }

    /// Drops every auxiliary (top-bottom dummy) leaf.
    pub fn remove_aux_nodes(&mut self) {
        for id in self.compounds() {
            let aux = |n: &LhTreeNode| matches!(n.kind, LhKind::Leaf { aux: true, .. });
            let kept: Vec<LhId> = self
                .node(id)
                .children
                .iter()
                .copied()
                .filter(|&c| !aux(self.node(c)))
                .collect();
            self.node_mut(id).children = kept;
            self.set_child_pos(id);
        }
    }

    /// Sorts and coalesces both adjacency lists of every node: entries are
    /// ordered by the adjacent endpoint, compound children before leaves,
    /// and equal `(u, v)` runs merge into one weighted record. A second
    /// call leaves the lists unchanged.
    pub fn simplify_adjacencies(&mut self) {
        for ix in 0..self.nodes.len() {
            let id = LhId::new(ix);
            let upper = std::mem::take(&mut self.node_mut(id).upper_adj);
            let upper = self.simplify_list(upper);
            self.node_mut(id).upper_adj = upper;

            let lower = std::mem::take(&mut self.node_mut(id).lower_adj);
            let lower = self.simplify_list(lower);
            self.node_mut(id).lower_adj = lower;
        }
    }

    fn simplify_list(&self, mut adj: Vec<Adjacency>) -> Vec<Adjacency> {
        let classify = |a: &Adjacency| match self.node(a.v).kind {
            LhKind::Compound(c) => (a.u.index(), 0usize, c.index()),
            LhKind::Leaf { vertex, .. } => (a.u.index(), 1, vertex.index()),
        };
        adj.sort_by_key(classify);

        let mut out: Vec<Adjacency> = Vec::with_capacity(adj.len());
        for a in adj {
            match out.last_mut() {
                Some(last) if last.u == a.u && last.v == a.v => last.weight += a.weight,
                _ => out.push(a),
            }
        }
        out
    }
}

/// Builds one hierarchy tree per layer, collects adjacencies and
/// cluster-crossing witnesses, and assigns initial positions on layer 0.
pub fn build_layers(eng: &mut ExtendedNestingGraph) -> Vec<LhTree> {
    let num_layers = eng.num_layers;
    eng.pos = vec![0; eng.g.node_bound()];
    if num_layers == 0 {
        return Vec::new();
    }

    let mut by_layer: Vec<Vec<NodeId>> = vec![Vec::new(); num_layers];
    for v in eng.g.node_ids() {
        by_layer[eng.rank(v) as usize].push(v);
    }

    let (top_rank, bottom_rank) = cluster_spans(eng, &by_layer);

    let mut cluster_begin: Vec<Vec<CgcClusterId>> = vec![Vec::new(); num_layers];
    let mut cluster_end: Vec<Vec<CgcClusterId>> = vec![Vec::new(); num_layers];
    for c in eng.cgc.cluster_ids() {
        let ix = c.index();
        if top_rank[ix] > bottom_rank[ix] {
            continue;
        }
        cluster_begin[top_rank[ix] as usize].push(c);
        cluster_end[bottom_rank[ix] as usize].push(c);
    }

    let mut trees: Vec<LhTree> = Vec::with_capacity(num_layers);
    let mut leaf: Vec<Option<LhRef>> = vec![None; eng.g.node_bound()];
    let mut active: BTreeSet<CgcClusterId> = BTreeSet::from([eng.cgc.root()]);
    let mut prev_compound: Vec<Option<LhId>> = vec![None; eng.cgc.cluster_count()];

    for i in 0..num_layers {
        for &c in &cluster_begin[i] {
            active.insert(c);
        }

        let mut tree = LhTree::default();
        let mut compound_of: Vec<Option<LhId>> = vec![None; eng.cgc.cluster_count()];

        for &c in active.iter() {
            let id = tree.push(LhTreeNode::new(LhKind::Compound(c), None));
            compound_of[c.index()] = Some(id);
            if let Some(prev) = prev_compound[c.index()] {
                trees[i - 1].node_mut(prev).down = Some(id);
                tree.node_mut(id).up = Some(prev);
            }
        }

        for &c in active.iter() {
            let Some(parent_cluster) = eng.cgc.parent(c) else {
                continue;
            };
            let id = compound_of[c.index()].expect("compound was just created");
            let parent = compound_of[parent_cluster.index()]
                .expect("a cluster's span is contained in its parent's span");
            tree.node_mut(id).parent = Some(parent);
            tree.node_mut(parent).children.push(id);
        }
        tree.root = compound_of[eng.cgc.root().index()].expect("root is always active");

        for &v in &by_layer[i] {
            let c = eng.cgc.node_parent(v);
            let aux = eng.kind(v) == NodeKind::ClusterTopBottom;
            let parent = compound_of[c.index()].expect("vertex cluster is active on its layer");
            let id = tree.push(LhTreeNode::new(LhKind::Leaf { vertex: v, aux }, Some(parent)));
            tree.node_mut(parent).children.push(id);
            leaf[v.index()] = Some((i, id));
        }

        tree.set_all_pos();

        let mut next_prev = vec![None; eng.cgc.cluster_count()];
        for &c in active.iter() {
            next_prev[c.index()] = compound_of[c.index()];
        }
        prev_compound = next_prev;

        for &c in &cluster_end[i] {
            active.remove(&c);
        }

        trees.push(tree);
    }

    collect_adjacencies(eng, &mut trees, &leaf);
    for tree in &mut trees {
        tree.simplify_adjacencies();
    }
    collect_cluster_crossings(eng, &mut trees, &leaf, &by_layer);

    trees[0].assign_pos(&mut eng.pos);
    trees
}

/// First and last layer on which each mirror cluster is active: the span of
/// its own vertices widened by its children's spans, children first.
fn cluster_spans(eng: &ExtendedNestingGraph, by_layer: &[Vec<NodeId>]) -> (Vec<i32>, Vec<i32>) {
    let n = eng.cgc.cluster_count();
    let mut top = vec![i32::MAX; n];
    let mut bottom = vec![i32::MIN; n];

    for layer in by_layer {
        for &v in layer {
            let c = eng.cgc.node_parent(v).index();
            let r = eng.rank(v);
            top[c] = top[c].min(r);
            bottom[c] = bottom[c].max(r);
        }
    }
    for c in eng.cgc.post_order() {
        if let Some(p) = eng.cgc.parent(c) {
            top[p.index()] = top[p.index()].min(top[c.index()]);
            bottom[p.index()] = bottom[p.index()].max(bottom[c.index()]);
        }
    }
    (top, bottom)
}

/// For every original-edge segment `(u, v)`, records `u` as an upper pull on
/// the path above `v`'s leaf, and `v` as a lower pull on the path above
/// `u`'s leaf.
fn collect_adjacencies(eng: &ExtendedNestingGraph, trees: &mut [LhTree], leaf: &[Option<LhRef>]) {
    for e in eng.g.edge_ids() {
        if eng.orig_edge(e).is_none() {
            continue;
        }
        let (u, v) = eng.g.endpoints(e);

        let (layer, mut nd) = leaf[v.index()].expect("edge endpoint has a leaf");
        let tree = &mut trees[layer];
        while let Some(p) = tree.node(nd).parent {
            tree.node_mut(p).upper_adj.push(Adjacency { u, v: nd, weight: 1 });
            nd = p;
        }

        let (layer, mut nd) = leaf[u.index()].expect("edge endpoint has a leaf");
        let tree = &mut trees[layer];
        while let Some(p) = tree.node(nd).parent {
            tree.node_mut(p).lower_adj.push(Adjacency { u: v, v: nd, weight: 1 });
            nd = p;
        }
    }
}

/// Pairs every top-bottom segment with the original-edge segments of the
/// same layer pair whose common compound lies strictly above the dummy's
/// own cluster, and whose far endpoint sits in a different cluster.
fn collect_cluster_crossings(
    eng: &ExtendedNestingGraph,
    trees: &mut [LhTree],
    leaf: &[Option<LhRef>],
    by_layer: &[Vec<NodeId>],
) {
    let num_layers = trees.len();
    for i in 0..num_layers.saturating_sub(1) {
        // Original-edge segments leaving this layer, keyed by the cluster of
        // the common compound of their endpoints.
        let mut segments: FxHashMap<CgcClusterId, Vec<EdgeId>> = FxHashMap::default();
        for &u in &by_layer[i] {
            for &e in eng.g.out_edges(u) {
                if eng.orig_edge(e).is_none() {
                    continue;
                }
                let v = eng.g.target(e);
                let (c_ref, _, _) = tree_lca(trees, leaf_ref(leaf, u), leaf_ref(leaf, v));
                let cluster = trees[c_ref.0]
                    .node(c_ref.1)
                    .cluster()
                    .expect("LCA of two leaves is a compound");
                segments.entry(cluster).or_default().push(e);
            }
        }

        let mut pending: Vec<(usize, LhId, ClusterCrossing, bool)> = Vec::new();
        for &u in &by_layer[i] {
            for &e in eng.g.out_edges(u) {
                if eng.orig_edge(e).is_some() {
                    continue;
                }
                let t = eng.g.target(e);

                // Upper witnesses live on layer i+1, where the chain enters.
                witnesses_for_side(trees, leaf, &segments, leaf_ref(leaf, t), u, true, eng, &mut pending);

                // Lower witnesses live on layer i, where the chain leaves.
                witnesses_for_side(trees, leaf, &segments, leaf_ref(leaf, u), t, false, eng, &mut pending);
            }
        }

        for (layer, id, cc, upper) in pending {
            if upper {
                trees[layer].node_mut(id).upper_cross.push(cc);
            } else {
                trees[layer].node_mut(id).lower_cross.push(cc);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn witnesses_for_side(
    trees: &[LhTree],
    leaf: &[Option<LhRef>],
    segments: &FxHashMap<CgcClusterId, Vec<EdgeId>>,
    a_ref: LhRef,
    adjacent_end: NodeId,
    upper: bool,
    eng: &ExtendedNestingGraph,
    pending: &mut Vec<(usize, LhId, ClusterCrossing, bool)>,
) {
    let tree = &trees[a_ref.0];
    let a_parent = tree.node(a_ref.1).parent.expect("leaf has a compound parent");
    let ca = tree
        .node(a_parent)
        .cluster()
        .expect("leaf parent is a compound");

    let mut ancestor = tree.node(a_parent).parent;
    while let Some(ap) = ancestor {
        let ap_cluster = tree.node(ap).cluster().expect("compound ancestor");
        if let Some(list) = segments.get(&ap_cluster) {
            for &e_tup in list {
                let (near, far) = if upper {
                    (eng.g.target(e_tup), eng.g.source(e_tup))
                } else {
                    (eng.g.source(e_tup), eng.g.target(e_tup))
                };

                let (c_ref, a_child, v_child) = tree_lca(trees, a_ref, leaf_ref(leaf, near));
                if c_ref == (a_ref.0, a_parent) {
                    continue;
                }
                let (far_ref, _, _) = tree_lca(trees, a_ref, leaf_ref(leaf, far));
                if trees[far_ref.0].node(far_ref.1).cluster() == Some(ca) {
                    continue;
                }

                pending.push((
                    c_ref.0,
                    c_ref.1,
                    ClusterCrossing {
                        uc: adjacent_end,
                        c_node: a_child.1,
                        u: far,
                        u_node: v_child.1,
                        edge: e_tup,
                    },
                    upper,
                ));
            }
        }
        ancestor = tree.node(ap).parent;
    }
}

fn leaf_ref(leaf: &[Option<LhRef>], v: NodeId) -> LhRef {
    leaf[v.index()].expect("vertex has a leaf on its layer")
}

/// Lowest common compound of two leaves, walking both parent chains
/// alternately and marking each visited cluster with the child it was
/// entered from. Returns the common compound plus the child on each side.
pub fn tree_lca(trees: &[LhTree], a: LhRef, b: LhRef) -> (LhRef, LhRef, LhRef) {
    debug_assert!(!trees[a.0].node(a.1).is_compound());
    debug_assert!(!trees[b.0].node(b.1).is_compound());

    let mut mark: FxHashMap<CgcClusterId, LhRef> = FxHashMap::default();

    let parent = |r: LhRef| -> Option<LhRef> {
        trees[r.0].node(r.1).parent.map(|p| (r.0, p))
    };
    let cluster = |r: LhRef| -> CgcClusterId {
        trees[r.0].node(r.1).cluster().expect("walk stays on compounds")
    };

    let mut cu = parent(a);
    let mut cv = parent(b);
    let mut u_pred = a;
    let mut v_pred = b;

    while cu.is_some() || cv.is_some() {
        if let Some(cun) = cu {
            if let Some(&other) = mark.get(&cluster(cun)) {
                return (cun, u_pred, other);
            }
            mark.insert(cluster(cun), u_pred);
            u_pred = cun;
            cu = parent(cun);
        }
        if let Some(cvn) = cv {
            if let Some(&other) = mark.get(&cluster(cvn)) {
                return (cvn, other, v_pred);
            }
            mark.insert(cluster(cvn), v_pred);
            v_pred = cvn;
            cv = parent(cvn);
        }
    }

    unreachable!("both chains end at the shared root cluster");
}
