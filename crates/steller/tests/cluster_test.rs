use steller::cluster::ClusterGraphCopy;
use steller::ClusterGraph;

fn nested() -> ClusterGraph {
    let mut cg = ClusterGraph::new();
    let outer = cg.add_cluster(cg.root());
    let _inner = cg.add_cluster(outer);
    let _ = cg.add_node(cg.root());
    cg
}

#[test]
fn the_mirror_is_isomorphic_and_maps_both_ways() {
    let cg = nested();
    let cgc = ClusterGraphCopy::new(&cg);

    assert_eq!(cgc.cluster_count(), cg.cluster_count());
    for c in cg.cluster_ids() {
        let mirror = cgc.copy(c);
        assert_eq!(cgc.original(mirror), Some(c));
        assert_eq!(
            cgc.parent(mirror).map(|p| cgc.original(p).unwrap()),
            cg.parent(c)
        );
    }
}

#[test]
fn post_order_lists_children_before_parents() {
    let cg = nested();
    let cgc = ClusterGraphCopy::new(&cg);

    let order = cgc.post_order();
    assert_eq!(order.len(), 3);
    assert_eq!(order.last().copied(), Some(cgc.root()));
    for (i, &c) in order.iter().enumerate() {
        if let Some(p) = cgc.parent(c) {
            let parent_at = order.iter().position(|&x| x == p).unwrap();
            assert!(parent_at > i);
        }
    }
}

#[test]
fn vertex_reassignment_moves_between_mirror_clusters() {
    let cg = nested();
    let mut cgc = ClusterGraphCopy::new(&cg);
    let v = steller::graphlib::NodeId::new(0);

    cgc.set_parent(v, cgc.root());
    assert_eq!(cgc.node_parent(v), cgc.root());

    let outer = cgc.copy(cg.cluster_ids().nth(1).unwrap());
    cgc.set_parent(v, outer);
    assert_eq!(cgc.node_parent(v), outer);
}

#[test]
fn virtual_clusters_group_vertices_under_a_fresh_mirror() {
    let cg = nested();
    let mut cgc = ClusterGraphCopy::new(&cg);
    let v0 = steller::graphlib::NodeId::new(0);
    let v1 = steller::graphlib::NodeId::new(1);
    cgc.set_parent(v0, cgc.root());
    cgc.set_parent(v1, cgc.root());

    let virt = cgc.create_virtual_cluster(&[v0, v1], cgc.root());

    assert!(cgc.is_virtual(virt));
    assert_eq!(cgc.original(virt), None);
    assert_eq!(cgc.parent(virt), Some(cgc.root()));
    assert_eq!(cgc.node_parent(v0), virt);
    assert_eq!(cgc.node_parent(v1), virt);
    assert_eq!(cgc.non_virtual(virt), cgc.root());
}

#[test]
fn lca_witnesses_identify_both_sides() {
    let mut cg = ClusterGraph::new();
    let c1 = cg.add_cluster(cg.root());
    let c2 = cg.add_cluster(cg.root());
    let inner = cg.add_cluster(c1);
    let u = cg.add_node(inner);
    let v = cg.add_node(c2);

    let lca = cg.lca_with_witnesses(u, v);
    assert_eq!(lca.lca, cg.root());
    assert_eq!(lca.from_u, c1);
    assert_eq!(lca.from_v, c2);
}

#[test]
fn lca_of_nested_clusters_is_the_ancestor_itself() {
    let mut cg = ClusterGraph::new();
    let c1 = cg.add_cluster(cg.root());
    let inner = cg.add_cluster(c1);
    let u = cg.add_node(c1);
    let v = cg.add_node(inner);

    let lca = cg.lca_with_witnesses(u, v);
    assert_eq!(lca.lca, c1);
    assert_eq!(lca.from_u, c1);
    assert_eq!(lca.from_v, inner);
}
