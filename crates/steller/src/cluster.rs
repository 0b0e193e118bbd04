//! Input cluster graph and its mutable mirror.
//!
//! `ClusterGraph` is the immutable input: a directed graph plus a rooted
//! tree of clusters partitioning its vertices. The builder API cannot
//! express a non-tree cluster shape or an unassigned vertex, so only
//! adjacency-level defects (self-loops, cycles) are left to be rejected at
//! session construction.
//!
//! `ClusterGraphCopy` mirrors the cluster tree for the layering session. It
//! additionally tracks, for every extended-nesting-graph vertex, the mirror
//! cluster the vertex currently belongs to; dummy materialization moves
//! vertices between mirror clusters without touching the input.

use steller_graphlib::{DiGraph, EdgeId, NodeId};

/// Handle to an input cluster. Index 0 is always the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct ClusterInfo {
    parent: Option<ClusterId>,
    children: Vec<ClusterId>,
    nodes: Vec<NodeId>,
}

/// The input: a directed graph whose vertices are partitioned by a rooted
/// cluster tree.
#[derive(Debug, Clone)]
pub struct ClusterGraph {
    graph: DiGraph<(), ()>,
    clusters: Vec<ClusterInfo>,
    node_cluster: Vec<ClusterId>,
}

impl Default for ClusterGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            clusters: vec![ClusterInfo {
                parent: None,
                children: Vec::new(),
                nodes: Vec::new(),
            }],
            node_cluster: Vec::new(),
        }
    }

    pub fn root(&self) -> ClusterId {
        ClusterId(0)
    }

    pub fn add_cluster(&mut self, parent: ClusterId) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters.push(ClusterInfo {
            parent: Some(parent),
            children: Vec::new(),
            nodes: Vec::new(),
        });
        self.clusters[parent.index()].children.push(id);
        id
    }

    pub fn add_node(&mut self, cluster: ClusterId) -> NodeId {
        let v = self.graph.add_node(());
        self.clusters[cluster.index()].nodes.push(v);
        self.node_cluster.push(cluster);
        debug_assert_eq!(self.node_cluster.len(), self.graph.node_bound());
        v
    }

    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> EdgeId {
        self.graph.add_edge(source, target, ())
    }

    pub fn graph(&self) -> &DiGraph<(), ()> {
        &self.graph
    }

    pub fn cluster_of(&self, v: NodeId) -> ClusterId {
        self.node_cluster[v.index()]
    }

    pub fn parent(&self, c: ClusterId) -> Option<ClusterId> {
        self.clusters[c.index()].parent
    }

    pub fn children(&self, c: ClusterId) -> &[ClusterId] {
        &self.clusters[c.index()].children
    }

    pub fn nodes_of(&self, c: ClusterId) -> &[NodeId] {
        &self.clusters[c.index()].nodes
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = ClusterId> {
        (0..self.clusters.len() as u32).map(ClusterId)
    }

    /// Clusters in post-order: every cluster after all of its descendants.
    pub fn post_order(&self) -> Vec<ClusterId> {
        let mut out = Vec::with_capacity(self.clusters.len());
        self.post_order_from(self.root(), &mut out);
        out
    }

    fn post_order_from(&self, c: ClusterId, out: &mut Vec<ClusterId>) {
        for &child in self.children(c) {
            self.post_order_from(child, out);
        }
        out.push(c);
    }

    /// Lowest common ancestor of the clusters containing `u` and `v`,
    /// together with the witness children: the direct child of the LCA on
    /// each endpoint's side. A witness equals the LCA itself when that
    /// endpoint's cluster is an ancestor of (or equal to) the other's.
    ///
    /// The climb is the alternating two-pointer walk: each visited cluster
    /// is marked with the cluster it was entered from (the start marks
    /// itself), and the first re-visit is the LCA.
    pub fn lca_with_witnesses(&self, u: NodeId, v: NodeId) -> ClusterLca {
        let mut mark: Vec<Option<ClusterId>> = vec![None; self.clusters.len()];

        let mut c1 = Some(self.cluster_of(u));
        let mut pred1 = self.cluster_of(u);
        let mut c2 = Some(self.cluster_of(v));
        let mut pred2 = self.cluster_of(v);

        loop {
            if let Some(c) = c1 {
                if let Some(other_side) = mark[c.index()] {
                    return ClusterLca {
                        lca: c,
                        from_u: pred1,
                        from_v: other_side,
                    };
                }
                mark[c.index()] = Some(pred1);
                pred1 = c;
                c1 = self.parent(c);
            }
            if let Some(c) = c2 {
                if let Some(other_side) = mark[c.index()] {
                    return ClusterLca {
                        lca: c,
                        from_u: other_side,
                        from_v: pred2,
                    };
                }
                mark[c.index()] = Some(pred2);
                pred2 = c;
                c2 = self.parent(c);
            }
        }
    }

    pub fn lca_cluster(&self, u: NodeId, v: NodeId) -> ClusterId {
        self.lca_with_witnesses(u, v).lca
    }
}

/// Result of the two-pointer LCA climb over the input cluster tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterLca {
    pub lca: ClusterId,
    /// Witness on the side of the first endpoint.
    pub from_u: ClusterId,
    /// Witness on the side of the second endpoint.
    pub from_v: ClusterId,
}

/// Handle to a mirror cluster. Index 0 is always the mirror root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CgcClusterId(u32);

impl CgcClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct CgcCluster {
    parent: Option<CgcClusterId>,
    children: Vec<CgcClusterId>,
    /// `None` for virtual clusters created after construction.
    original: Option<ClusterId>,
}

/// Mutable mirror of the input cluster tree.
#[derive(Debug, Clone)]
pub struct ClusterGraphCopy {
    clusters: Vec<CgcCluster>,
    /// Input cluster -> mirror cluster.
    copy: Vec<CgcClusterId>,
    /// Extended-nesting-graph vertex -> mirror cluster. Grows as dummy
    /// vertices are materialized.
    node_parent: Vec<CgcClusterId>,
}

impl ClusterGraphCopy {
    /// Builds a mirror isomorphic to the input tree. Vertex assignments are
    /// registered afterwards, as the nesting graph creates its vertices.
    pub fn new(cg: &ClusterGraph) -> Self {
        let mut cgc = Self {
            clusters: vec![CgcCluster {
                parent: None,
                children: Vec::new(),
                original: Some(cg.root()),
            }],
            copy: vec![CgcClusterId(0); cg.cluster_count()],
            node_parent: Vec::new(),
        };
        cgc.create_cluster_tree(cg, cg.root());
        cgc
    }

    fn create_cluster_tree(&mut self, cg: &ClusterGraph, c_orig: ClusterId) {
        let c = self.copy[c_orig.index()];
        for &child_orig in cg.children(c_orig) {
            let child = CgcClusterId(self.clusters.len() as u32);
            self.clusters.push(CgcCluster {
                parent: Some(c),
                children: Vec::new(),
                original: Some(child_orig),
            });
            self.clusters[c.index()].children.push(child);
            self.copy[child_orig.index()] = child;
            self.create_cluster_tree(cg, child_orig);
        }
    }

    pub fn root(&self) -> CgcClusterId {
        CgcClusterId(0)
    }

    pub fn copy(&self, c: ClusterId) -> CgcClusterId {
        self.copy[c.index()]
    }

    pub fn original(&self, c: CgcClusterId) -> Option<ClusterId> {
        self.clusters[c.index()].original
    }

    pub fn is_virtual(&self, c: CgcClusterId) -> bool {
        self.clusters[c.index()].original.is_none()
    }

    pub fn parent(&self, c: CgcClusterId) -> Option<CgcClusterId> {
        self.clusters[c.index()].parent
    }

    pub fn children(&self, c: CgcClusterId) -> &[CgcClusterId] {
        &self.clusters[c.index()].children
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = CgcClusterId> {
        (0..self.clusters.len() as u32).map(CgcClusterId)
    }

    /// Nearest non-virtual ancestor-or-self.
    pub fn non_virtual(&self, mut c: CgcClusterId) -> CgcClusterId {
        while self.is_virtual(c) {
            c = self.parent(c).expect("virtual clusters never become root");
        }
        c
    }

    /// Assigns (or reassigns) a nesting-graph vertex to a mirror cluster.
    pub fn set_parent(&mut self, v: NodeId, c: CgcClusterId) {
        if v.index() >= self.node_parent.len() {
            self.node_parent.resize(v.index() + 1, self.root());
        }
        self.node_parent[v.index()] = c;
    }

    pub fn node_parent(&self, v: NodeId) -> CgcClusterId {
        self.node_parent[v.index()]
    }

    /// Groups `nodes` under a fresh virtual cluster parented at `parent`.
    pub fn create_virtual_cluster(&mut self, nodes: &[NodeId], parent: CgcClusterId) -> CgcClusterId {
        let id = CgcClusterId(self.clusters.len() as u32);
        self.clusters.push(CgcCluster {
            parent: Some(parent),
            children: Vec::new(),
            original: None,
        });
        self.clusters[parent.index()].children.push(id);
        for &v in nodes {
            self.set_parent(v, id);
        }
        id
    }

    /// Mirror clusters in post-order.
    pub fn post_order(&self) -> Vec<CgcClusterId> {
        let mut out = Vec::with_capacity(self.clusters.len());
        self.post_order_from(self.root(), &mut out);
        out
    }

    fn post_order_from(&self, c: CgcClusterId, out: &mut Vec<CgcClusterId>) {
        let children = self.clusters[c.index()].children.clone();
        for child in children {
            self.post_order_from(child, out);
        }
        out.push(c);
    }
}
