use super::*;
use crate::ai::collection::ChildEdge;
use crate::ai::registry::CollectionRegistry;
use crate::ai::waypoint::{Waypoint, WaypointType};
use bevy::math::Vec3;

fn waypoints(graph: &mut WaypointGraph, count: usize) -> Vec<WaypointId> {
    (0..count)
        .map(|i| graph.create_waypoint(Vec3::new(i as f32, 0.0, 0.0), WaypointType::DEFAULT).expect("free id"))
        .collect()
}

fn link(graph: &mut WaypointGraph, a: WaypointId, b: WaypointId) {
    assert!(graph.add_edge(a, b));
    assert!(graph.add_edge(b, a));
}

fn link_all(graph: &mut WaypointGraph, ids: &[WaypointId]) {
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            link(graph, a, b);
        }
    }
}

#[test]
fn test_k4_forms_single_collection() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 4);
    link_all(&mut graph, &ids);

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(!builder.create_next_search_level(0), "a single collection means no further level");

    let level = builder.last_search_level().expect("level recorded");
    assert_eq!(level.level_num, 1);
    assert_eq!(level.collection_count(), 1);
    assert_eq!(level.stats.four_cliques, 1);
    let wc = level.collections[0];

    let wc = graph.collection(wc).expect("collection inserted");
    assert_eq!(wc.degree(), 4);
    // LIFO: the last inserted waypoint seeds the clique.
    assert_eq!(wc.children(), &[ids[3], ids[1], ids[2], ids[0]]);
    for &id in &ids {
        assert_eq!(graph.get_parent(id), Some(wc.id()));
    }
    assert_eq!(registry.created_count(), 1);
}

#[test]
fn test_disjoint_pairs_form_two_collections() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 4);
    link(&mut graph, ids[0], ids[1]);
    link(&mut graph, ids[2], ids[3]);

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(builder.create_next_search_level(0));

    let stats = builder.last_search_level().map(|l| l.stats).unwrap_or_default();
    assert_eq!(stats.two_cliques, 2);
    assert_eq!(stats.four_cliques, 0);

    assert_eq!(graph.get_parent(ids[0]), graph.get_parent(ids[1]));
    assert_eq!(graph.get_parent(ids[2]), graph.get_parent(ids[3]));
    assert_ne!(graph.get_parent(ids[0]), graph.get_parent(ids[2]));
    // No edge between the pairs, so none between their collections.
    assert!(graph.nav_mesh_at_level(1).map(|m| m.is_empty()).unwrap_or(false));
}

#[test]
fn test_one_way_edge_leaves_both_ends_unplaced() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 2);
    assert!(graph.add_edge(ids[0], ids[1]));

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(!builder.create_next_search_level(0));

    let mut unplaced = builder.unplaced().to_vec();
    unplaced.sort();
    assert_eq!(unplaced, ids);
    assert_eq!(builder.last_search_level().map(|l| l.collection_count()), Some(0));
    assert!(graph.get_parent(ids[0]).is_none());
    assert!(graph.get_parent(ids[1]).is_none());
}

#[test]
fn test_star_leaves_are_adopted_by_hub_collection() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 6);
    let hub = ids[0];
    for &leaf in &ids[1..] {
        link(&mut graph, hub, leaf);
    }

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(!builder.create_next_search_level(0));

    let stats = builder.last_search_level().map(|l| l.stats).unwrap_or_default();
    assert_eq!(stats.four_cliques, 0);
    assert_eq!(stats.two_cliques, 1);
    assert_eq!(stats.adopted, 4);
    assert_eq!(stats.unplaced, 0);

    let parent = graph.get_parent(hub).expect("hub grouped");
    let wc = graph.collection(parent).expect("collection");
    assert_eq!(wc.degree(), 6);
    assert_eq!(&wc.children()[..2], &[hub, ids[1]]);
}

#[test]
fn test_clique_takes_at_most_three_siblings() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 5);
    link_all(&mut graph, &ids);

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(!builder.create_next_search_level(0));

    let stats = builder.last_search_level().map(|l| l.stats).unwrap_or_default();
    assert_eq!(stats.four_cliques, 1);
    assert_eq!(stats.adopted, 1, "fifth node joins through the fallback pass");

    let wc = graph.collection(graph.get_parent(ids[0]).expect("grouped")).expect("collection");
    assert_eq!(wc.children(), &[ids[4], ids[1], ids[2], ids[3], ids[0]]);
}

#[test]
fn test_config_controls_clique_thresholds() {
    // A triangle only has two clique members, below a minimum of three.
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 3);
    link_all(&mut graph, &ids);

    let config = BuilderConfig { min_clique_candidates: 3, ..Default::default() };
    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::with_config(&mut registry, &mut graph, config);
    assert!(!builder.create_next_search_level(0));
    let stats = builder.last_search_level().map(|l| l.stats).unwrap_or_default();
    assert_eq!((stats.four_cliques, stats.two_cliques, stats.adopted), (0, 1, 1));

    // A K4 split by a one-sibling limit.
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 4);
    link_all(&mut graph, &ids);

    let config = BuilderConfig { max_clique_siblings: 1, ..Default::default() };
    let mut builder = WaypointGraphBuilder::with_config(&mut registry, &mut graph, config);
    assert!(builder.create_next_search_level(0));
    let level = builder.take_last_search_level().expect("level recorded");
    assert_eq!(level.collection_count(), 2);
    assert_eq!((level.stats.four_cliques, level.stats.two_cliques), (1, 1));
    assert_eq!(graph.collection(level.collections[0]).map(|wc| wc.children().to_vec()), Some(vec![ids[3], ids[1]]));
    assert_eq!(graph.collection(level.collections[1]).map(|wc| wc.children().to_vec()), Some(vec![ids[0], ids[2]]));
}

#[test]
fn test_bridge_creates_abstract_edges_and_child_edges() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 4);
    link(&mut graph, ids[0], ids[1]);
    link(&mut graph, ids[2], ids[3]);
    link(&mut graph, ids[1], ids[2]);

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(builder.create_next_search_level(0));

    let level = builder.last_search_level().expect("level recorded");
    let (left, right) = (level.collections[0], level.collections[1]);
    assert!(level.nav_mesh.contains_edge(left, right));
    assert!(level.nav_mesh.contains_edge(right, left));
    assert_eq!(level.nav_mesh.edge_count(), 2);

    assert!(!builder.create_search_level(2), "two linked collections become one");
    let top = builder.last_search_level().expect("level recorded").collections[0];

    let left_wc = graph.collection(left).expect("left collection");
    assert_eq!(left_wc.children(), &[ids[0], ids[1]]);
    assert_eq!(left_wc.child_edges(right), &[ChildEdge::new(ids[1], ids[2])]);
    assert_eq!(left_wc.child_edges(left), &[ChildEdge::new(ids[0], ids[1]), ChildEdge::new(ids[1], ids[0])]);
    assert_eq!(graph.get_parent(left), Some(top));
    assert_eq!(graph.get_parent(right), Some(top));
    assert!(graph.has_path(ids[0], ids[3]));
}

#[test]
fn test_rebuilding_a_level_discards_previous_collections() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 4);
    link(&mut graph, ids[0], ids[1]);
    link(&mut graph, ids[2], ids[3]);
    link(&mut graph, ids[1], ids[2]);

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(builder.create_next_search_level(0));
    assert!(builder.create_next_search_level(0));
    assert!(!builder.create_next_search_level(1));
    assert!(builder.unplaced().is_empty());

    assert_eq!(graph.nodes_at_level(1).len(), 2);
    for &wc in graph.nodes_at_level(1) {
        assert!(graph.collection(wc).map(|c| c.degree()).unwrap_or(0) >= 1, "collection {} is empty", wc);
    }
    assert_eq!(graph.nodes_at_level(2).len(), 1);
    assert!(graph.has_path(ids[0], ids[3]));
}

#[test]
fn test_max_waypoint_id_still_builds() {
    let mut graph = WaypointGraph::new();
    let (low, high) = (WaypointId(1), WaypointId(u32::MAX));
    graph.insert_waypoint(Waypoint::new(low, Vec3::ZERO));
    graph.insert_waypoint(Waypoint::new(high, Vec3::X));
    link(&mut graph, low, high);

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(!builder.create_next_search_level(0));

    let level = builder.last_search_level().expect("level recorded");
    assert_eq!(level.collections, vec![WaypointId(0)]);
    assert_eq!(graph.get_parent(low), Some(WaypointId(0)));
    assert_eq!(graph.get_parent(high), Some(WaypointId(0)));
}

#[test]
fn test_level_zero_and_missing_levels_are_rejected() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 2);
    link(&mut graph, ids[0], ids[1]);

    let mut registry = CollectionRegistry::default();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(!builder.create_search_level(0));
    assert!(!builder.create_next_search_level(3));
    assert!(builder.last_search_level().is_none());
    assert_eq!(graph.num_search_levels(), 1);
}

#[test]
fn test_unknown_collection_type_creates_nothing() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 4);
    link_all(&mut graph, &ids);

    let mut registry = CollectionRegistry::empty();
    let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
    assert!(!builder.create_next_search_level(0));
    assert_eq!(builder.unplaced().len(), 4);
    assert!(ids.iter().all(|&id| graph.get_parent(id).is_none()));
}

#[test]
fn test_disconnected_components_never_share_a_root() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 8);
    link_all(&mut graph, &ids[..4]);
    link_all(&mut graph, &ids[4..]);

    let mut registry = CollectionRegistry::default();
    let stats = WaypointGraphBuilder::new(&mut registry, &mut graph).create_search_graph(10);

    assert_eq!(stats.nodes_per_level, vec![8, 2]);
    assert!(graph.has_path(ids[0], ids[3]));
    assert!(graph.has_path(ids[4], ids[7]));
    assert!(!graph.has_path(ids[0], ids[7]));
    assert!(graph.find_common_parent(ids[0], ids[7]).is_none());
}

#[test]
fn test_rebuilding_replaces_previous_hierarchy() {
    let mut graph = WaypointGraph::new();
    let ids = waypoints(&mut graph, 6);
    for pair in ids.windows(2) {
        link(&mut graph, pair[0], pair[1]);
    }

    let mut registry = CollectionRegistry::default();
    let first = WaypointGraphBuilder::new(&mut registry, &mut graph).build();
    let second = WaypointGraphBuilder::new(&mut registry, &mut graph).build();

    assert_eq!(first, second);
    assert_eq!(second.collection_count, graph.stats().collection_count);
    assert_eq!(graph.nodes_at_level(0).len(), 6);
}

#[test]
fn test_random_meshes_partition_every_level() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for trial in 0..25 {
        let mut graph = WaypointGraph::new();
        let count = rng.usize(2..40);
        let ids = waypoints(&mut graph, count);

        // Random spanning tree plus extra links keeps the mesh connected.
        for i in 1..count {
            let j = rng.usize(0..i);
            link(&mut graph, ids[i], ids[j]);
        }
        for _ in 0..count {
            let (a, b) = (rng.usize(0..count), rng.usize(0..count));
            if a != b {
                graph.add_edge(ids[a], ids[b]);
                graph.add_edge(ids[b], ids[a]);
            }
        }

        let mut registry = CollectionRegistry::default();
        let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
        let mut level = 1;
        loop {
            let more = builder.create_search_level(level);
            let built = builder.last_search_level().expect("level recorded").clone();
            let below = builder.graph().nodes_at_level(level - 1).to_vec();

            assert!(builder.unplaced().is_empty(), "trial {trial}: connected meshes place every node");
            let member_total: usize = built
                .collections
                .iter()
                .map(|&wc| builder.graph().collection(wc).map(|c| c.degree()).unwrap_or(0))
                .sum();
            assert_eq!(member_total, below.len(), "trial {trial}: each node in exactly one collection");
            for &wc in &built.collections {
                let degree = builder.graph().collection(wc).map(|c| c.degree()).unwrap_or(0);
                assert!(degree >= 2, "trial {trial}: collection {wc} has {degree} children");
            }
            for pair in built.nav_mesh.iter() {
                assert!(!built.nav_mesh.is_one_way(pair), "trial {trial}: abstract edges stay bidirectional");
            }

            if !more {
                assert_eq!(built.collection_count(), 1, "trial {trial}: converges to a single root");
                break;
            }
            level += 1;
        }

        for &id in &ids {
            assert!(graph.has_path(ids[0], id), "trial {trial}: {id} unreachable");
        }
    }
}
