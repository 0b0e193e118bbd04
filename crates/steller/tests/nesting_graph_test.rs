use steller::graphlib::alg;
use steller::nesting_graph::{EdgeKind, ExtendedNestingGraph};
use steller::rank::NetworkSimplex;
use steller::{ClusterGraph, LayeringError, NodeKind};

#[test]
fn rejects_a_self_loop() {
    let mut cg = ClusterGraph::new();
    let a = cg.add_node(cg.root());
    cg.add_edge(a, a);
    assert_eq!(
        ExtendedNestingGraph::build(&cg).err(),
        Some(LayeringError::SelfLoop(a.index()))
    );
}

#[test]
fn rejects_a_cyclic_input() {
    let mut cg = ClusterGraph::new();
    let a = cg.add_node(cg.root());
    let b = cg.add_node(cg.root());
    cg.add_edge(a, b);
    cg.add_edge(b, a);
    assert_eq!(
        ExtendedNestingGraph::build(&cg).err(),
        Some(LayeringError::CyclicInput)
    );
}

#[test]
fn builds_copies_markers_and_containment() {
    let mut cg = ClusterGraph::new();
    let a = cg.add_node(cg.root());
    let b = cg.add_node(cg.root());
    cg.add_edge(a, b);

    let eng = ExtendedNestingGraph::build(&cg).unwrap();

    // Two copies plus the root marker pair.
    assert_eq!(eng.g.node_count(), 4);
    assert_eq!(eng.kind(eng.copy[a.index()]), NodeKind::Node);
    assert_eq!(eng.kind(eng.top_of(cg.root()).unwrap()), NodeKind::ClusterTop);

    // Four containment edges plus the adjacency edge.
    assert_eq!(eng.g.edge_count(), 5);
    let e = cg.graph().edge_ids().next().unwrap();
    assert_eq!(eng.chain(e).len(), 1);
    assert!(!eng.chain_reversed(&cg, e));
    assert!(alg::is_acyclic(&eng.g));
}

#[test]
fn nested_cluster_gets_boundary_and_order_edges() {
    let mut cg = ClusterGraph::new();
    let c = cg.add_cluster(cg.root());
    let a = cg.add_node(cg.root());
    let b = cg.add_node(c);
    cg.add_edge(a, b);

    let eng = ExtendedNestingGraph::build(&cg).unwrap();

    // a, b, and two marker pairs.
    assert_eq!(eng.g.node_count(), 6);

    // Containment: top(r)->a, a->bottom(r), top(c)->b, b->bottom(c),
    // top(r)->top(c), bottom(c)->bottom(r), plus the top->bottom edge, the
    // adjacency edge, and the relaxed cluster-order edge a->top(c).
    assert_eq!(eng.g.edge_count(), 9);

    let t_c = eng.top_of(c).unwrap();
    let a_h = eng.copy[a.index()];
    assert!(
        eng.g
            .out_edges(a_h)
            .iter()
            .any(|&e| eng.g.target(e) == t_c && eng.g.edge(e).kind == EdgeKind::Nesting),
        "expected the relaxed order edge a -> top(c)"
    );
    assert!(alg::is_acyclic(&eng.g));
}

#[test]
fn sibling_clusters_are_ordered_through_their_markers() {
    let mut cg = ClusterGraph::new();
    let c1 = cg.add_cluster(cg.root());
    let c2 = cg.add_cluster(cg.root());
    let a = cg.add_node(c1);
    let x = cg.add_node(c2);
    cg.add_edge(a, x);

    let eng = ExtendedNestingGraph::build(&cg).unwrap();

    let b_c1 = eng.bottom_of(c1).unwrap();
    let t_c2 = eng.top_of(c2).unwrap();
    assert!(
        eng.g
            .out_edges(b_c1)
            .iter()
            .any(|&e| eng.g.target(e) == t_c2),
        "expected bottom(c1) -> top(c2)"
    );
}

#[test]
fn ranking_stage_tightens_prunes_and_compacts() {
    // One vertex above a one-vertex cluster: the canonical four-layer case.
    let mut cg = ClusterGraph::new();
    let c = cg.add_cluster(cg.root());
    let a = cg.add_node(cg.root());
    let b = cg.add_node(c);
    cg.add_edge(a, b);

    let mut eng = ExtendedNestingGraph::build(&cg).unwrap();
    eng.compute_ranking(&cg, &NetworkSimplex);

    assert_eq!(eng.num_layers, 4);
    assert_eq!(eng.rank(eng.copy[a.index()]), 0);
    assert_eq!(eng.rank(eng.top_of(c).unwrap()), 1);
    assert_eq!(eng.rank(eng.copy[b.index()]), 2);
    assert_eq!(eng.rank(eng.bottom_of(c).unwrap()), 3);

    // Root markers are gone, and so is every scaffolding edge.
    assert!(eng.top_of(cg.root()).is_none());
    assert!(eng.bottom_of(cg.root()).is_none());
    for e in eng.g.edge_ids() {
        assert_ne!(eng.g.edge(e).kind, EdgeKind::Nesting);
    }
    assert!(alg::is_acyclic(&eng.g));
}

#[test]
fn cluster_spans_strictly_contain_members_after_ranking() {
    let mut cg = ClusterGraph::new();
    let outer = cg.add_cluster(cg.root());
    let inner = cg.add_cluster(outer);
    let a = cg.add_node(outer);
    let b = cg.add_node(inner);
    let w = cg.add_node(cg.root());
    cg.add_edge(a, b);
    cg.add_edge(b, w);

    let mut eng = ExtendedNestingGraph::build(&cg).unwrap();
    eng.compute_ranking(&cg, &NetworkSimplex);

    let r = |v| eng.rank(v);
    let (t_o, b_o) = (eng.top_of(outer).unwrap(), eng.bottom_of(outer).unwrap());
    let (t_i, b_i) = (eng.top_of(inner).unwrap(), eng.bottom_of(inner).unwrap());

    assert!(r(t_o) < r(eng.copy[a.index()]) && r(eng.copy[a.index()]) < r(b_o));
    assert!(r(t_i) < r(eng.copy[b.index()]) && r(eng.copy[b.index()]) < r(b_i));
    assert!(r(t_o) < r(t_i) && r(b_i) < r(b_o));
}
