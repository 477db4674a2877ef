use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use super::waypoint::WaypointId;

/// A directed traversability link between two nodes of the same search level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaypointPair {
    from: WaypointId,
    to: WaypointId,
    /// Straight-line distance between the endpoints at insertion time.
    cost: f32,
}

impl WaypointPair {
    pub fn new(from: WaypointId, to: WaypointId, cost: f32) -> Self {
        Self { from, to, cost }
    }

    #[inline]
    pub fn waypoint_from(&self) -> WaypointId {
        self.from
    }

    #[inline]
    pub fn waypoint_to(&self) -> WaypointId {
        self.to
    }

    #[inline]
    pub fn cost(&self) -> f32 {
        self.cost
    }
}

/// Directed edges of one search level, grouped by source node.
///
/// Edges of a node iterate in insertion order, keys in id order, so every
/// traversal over the mesh is deterministic.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NavMesh {
    edges: BTreeMap<WaypointId, SmallVec<[WaypointPair; 8]>>,
}

impl NavMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `from -> to`. Returns false if that directed edge already exists.
    pub fn add_edge(&mut self, from: WaypointId, to: WaypointId, cost: f32) -> bool {
        let edges = self.edges.entry(from).or_default();
        if edges.iter().any(|pair| pair.to == to) {
            return false;
        }
        edges.push(WaypointPair::new(from, to, cost));
        true
    }

    pub fn remove_edge(&mut self, from: WaypointId, to: WaypointId) -> bool {
        let Some(edges) = self.edges.get_mut(&from) else {
            return false;
        };
        let before = edges.len();
        edges.retain(|pair| pair.to != to);
        let removed = edges.len() != before;
        if edges.is_empty() {
            self.edges.remove(&from);
        }
        removed
    }

    /// Remove every edge leaving or entering `waypoint`.
    pub fn remove_all_edges(&mut self, waypoint: WaypointId) {
        self.edges.remove(&waypoint);
        self.edges.retain(|_, edges| {
            edges.retain(|pair| pair.to != waypoint);
            !edges.is_empty()
        });
    }

    /// Remove only the edges leaving `waypoint`.
    pub fn remove_edges_from(&mut self, waypoint: WaypointId) {
        self.edges.remove(&waypoint);
    }

    /// Outgoing edges of `waypoint`, in insertion order.
    pub fn edges_from(&self, waypoint: WaypointId) -> &[WaypointPair] {
        self.edges
            .get(&waypoint)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_edge(&self, from: WaypointId, to: WaypointId) -> bool {
        self.edges_from(from).iter().any(|pair| pair.to == to)
    }

    /// An edge is one-way when the mesh holds no edge in the opposite direction.
    pub fn is_one_way(&self, pair: &WaypointPair) -> bool {
        !self.contains_edge(pair.to, pair.from)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|edges| edges.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    /// All edges, grouped by source id.
    pub fn iter(&self) -> impl Iterator<Item = &WaypointPair> {
        self.edges.values().flat_map(|edges| edges.iter())
    }
}
