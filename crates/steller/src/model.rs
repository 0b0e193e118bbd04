//! Core label types and the crossing-count objective.

use steller_graphlib::NodeId;

/// What an extended-nesting-graph vertex stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum NodeKind {
    /// Mirror of an original vertex.
    Node,
    /// Upper boundary marker of a cluster.
    ClusterTop,
    /// Lower boundary marker of a cluster.
    ClusterBottom,
    /// Long-edge split vertex.
    Dummy,
    /// Split vertex on a `top(c) -> bottom(c)` edge.
    ClusterTopBottom,
}

/// Crossing count ordered lexicographically: a cluster–edge crossing always
/// outweighs any number of edge–edge crossings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct RcCrossings {
    pub clusters: u64,
    pub edges: u64,
}

impl RcCrossings {
    pub const ZERO: RcCrossings = RcCrossings {
        clusters: 0,
        edges: 0,
    };

    pub fn infinity() -> Self {
        RcCrossings {
            clusters: u64::MAX,
            edges: u64::MAX,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    pub fn inc_clusters(&mut self) {
        self.clusters += 1;
    }

    pub fn inc_edges(&mut self, weight: u64) {
        self.edges += weight;
    }

    /// Componentwise signed difference, compared lexicographically by the
    /// preference-edge sort. Signed because the smaller pair under the
    /// lexicographic order may still have the larger edge component.
    pub fn diff(self, other: RcCrossings) -> (i64, i64) {
        (
            self.clusters as i64 - other.clusters as i64,
            self.edges as i64 - other.edges as i64,
        )
    }
}

impl std::ops::AddAssign for RcCrossings {
    fn add_assign(&mut self, rhs: Self) {
        self.clusters = self.clusters.saturating_add(rhs.clusters);
        self.edges = self.edges.saturating_add(rhs.edges);
    }
}

impl std::fmt::Display for RcCrossings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.clusters, self.edges)
    }
}

/// Tunables for the layering session.
#[derive(Debug, Clone)]
pub struct LayeringOptions {
    /// Number of crossing-reduction runs; each run after the first starts
    /// from a random permutation of every layer.
    pub runs: u32,
    /// Consecutive non-improving sweeps tolerated before a run ends.
    pub fails: u32,
    /// Seed for the session-owned permutation source.
    pub seed: u64,
}

impl Default for LayeringOptions {
    fn default() -> Self {
        Self {
            runs: 15,
            fails: 4,
            seed: 0x73_74_65_6c_6c_65_72,
        }
    }
}

/// Rejections raised while adopting the input graph.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayeringError {
    #[error("input graph contains a self-loop at node {0}")]
    SelfLoop(usize),
    #[error("input graph contains a directed cycle")]
    CyclicInput,
}

pub(crate) fn self_loop(v: NodeId) -> LayeringError {
    LayeringError::SelfLoop(v.index())
}
