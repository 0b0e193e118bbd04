use steller_graphlib::{DiGraph, alg};

fn path(n: usize) -> DiGraph<&'static str, u32> {
    let mut g = DiGraph::new();
    let ids: Vec<_> = (0..n).map(|_| g.add_node("v")).collect();
    for w in ids.windows(2) {
        g.add_edge(w[0], w[1], 1);
    }
    g
}

#[test]
fn ids_stay_stable_across_removal() {
    let mut g: DiGraph<u32, ()> = DiGraph::new();
    let a = g.add_node(0);
    let b = g.add_node(1);
    let c = g.add_node(2);
    let ab = g.add_edge(a, b, ());
    g.add_edge(b, c, ());

    g.remove_node(b);
    assert_eq!(g.node_count(), 2);
    assert_eq!(g.edge_count(), 0);
    assert!(!g.contains_node(b));
    assert!(!g.contains_edge(ab));
    assert_eq!(*g.node(c), 2);
    assert_eq!(g.node_bound(), 3);

    let d = g.add_node(3);
    assert_eq!(d.index(), 3);
}

#[test]
fn multigraph_keeps_parallel_edges() {
    let mut g: DiGraph<(), u32> = DiGraph::new();
    let a = g.add_node(());
    let b = g.add_node(());
    let e1 = g.add_edge(a, b, 1);
    let e2 = g.add_edge(a, b, 2);
    assert_eq!(g.out_edges(a), &[e1, e2]);
    assert_eq!(g.edge_count(), 2);
    g.remove_edge(e1);
    assert_eq!(g.out_edges(a), &[e2]);
    assert!(g.contains_edge(e2));
}

#[test]
fn split_edge_subdivides_in_place() {
    let mut g: DiGraph<&'static str, u32> = DiGraph::new();
    let a = g.add_node("a");
    let b = g.add_node("b");
    let e = g.add_edge(a, b, 7);

    let (w, f) = g.split_edge(e, "dummy", 7);
    assert_eq!(g.endpoints(e), (a, w));
    assert_eq!(g.endpoints(f), (w, b));
    assert_eq!(g.in_edges(b), &[f]);
    assert_eq!(g.in_edges(w), &[e]);
    assert_eq!(g.out_edges(w), &[f]);

    // Splitting the tail edge again extends the chain.
    let (w2, f2) = g.split_edge(f, "dummy", 7);
    assert_eq!(g.endpoints(f), (w, w2));
    assert_eq!(g.endpoints(f2), (w2, b));
}

#[test]
fn topological_order_is_id_deterministic() {
    let g = path(4);
    let order = alg::topological_order(&g).unwrap();
    let ixs: Vec<usize> = order.iter().map(|v| v.index()).collect();
    assert_eq!(ixs, vec![0, 1, 2, 3]);
    assert!(alg::is_acyclic(&g));
}

#[test]
fn cycle_is_detected() {
    let mut g: DiGraph<(), ()> = DiGraph::new();
    let a = g.add_node(());
    let b = g.add_node(());
    g.add_edge(a, b, ());
    g.add_edge(b, a, ());
    assert!(!alg::is_acyclic(&g));
    assert!(alg::topological_order(&g).is_none());
}

#[test]
fn components_split_and_merge() {
    let mut g: DiGraph<(), ()> = DiGraph::new();
    let a = g.add_node(());
    let b = g.add_node(());
    let c = g.add_node(());
    g.add_edge(a, b, ());
    assert_eq!(alg::components(&g).len(), 2);
    g.add_edge(c, b, ());
    assert_eq!(alg::components(&g).len(), 1);
}
