//! Hierarchical waypoint graphs for AI navigation.
//!
//! A flat navigation mesh of waypoints is abstracted level by level into a
//! pyramid of [`ai::WaypointCollection`]s, each grouping a small clique of
//! mutually reachable nodes from the level below. The hierarchy answers
//! "is there a path" in O(depth) and drives coarse-to-fine A* refinement.
//!
//! ```no_run
//! use bevy::math::Vec3;
//! use waypoint_hierarchy::ai::{CollectionRegistry, WaypointGraph, WaypointGraphBuilder, WaypointType};
//!
//! let mut graph = WaypointGraph::default();
//! let a = graph.create_waypoint(Vec3::ZERO, WaypointType::DEFAULT).expect("free id");
//! let b = graph.create_waypoint(Vec3::X, WaypointType::DEFAULT).expect("free id");
//! graph.add_edge(a, b);
//! graph.add_edge(b, a);
//!
//! let mut registry = CollectionRegistry::default();
//! let mut builder = WaypointGraphBuilder::new(&mut registry, &mut graph);
//! builder.create_search_graph(10);
//! assert!(graph.has_path(a, b));
//! ```

pub mod ai;
