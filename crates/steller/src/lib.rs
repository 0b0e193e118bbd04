//! Clustered Sugiyama layering core.
//!
//! Given a directed graph whose vertices are partitioned by a rooted tree
//! of clusters, this crate assigns every vertex an integer layer, gives
//! every cluster a contiguous vertical span strictly containing its
//! content, subdivides long edges so every segment spans one layer, and
//! orders each layer to minimize cluster–edge crossings first and
//! edge–edge crossings second.
//!
//! The stages mirror the classic pipeline: an extended nesting graph
//! combines adjacency with containment, an optimal ranker assigns layers,
//! dummy vertices materialize long chains, per-layer hierarchy trees track
//! the clusters active on each layer, and an iterated two-directional sweep
//! reduces crossings compound by compound.

pub use steller_graphlib as graphlib;

pub mod acyclic;
pub mod cluster;
pub mod layer_tree;
pub mod model;
pub mod nesting_graph;
pub mod normalize;
pub mod order;
pub mod pipeline;
pub mod rank;

pub use cluster::{CgcClusterId, ClusterGraph, ClusterGraphCopy, ClusterId};
pub use model::{LayeringError, LayeringOptions, NodeKind, RcCrossings};
pub use pipeline::{ClusterLayering, LayeringSnapshot};

/// Runs the whole pipeline with the default network-simplex ranker.
pub fn layer(
    cg: &ClusterGraph,
    options: &LayeringOptions,
) -> Result<ClusterLayering, LayeringError> {
    ClusterLayering::build(cg, options)
}
