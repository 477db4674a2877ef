use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

use super::waypoint::{WaypointId, WaypointType};

/// A concrete edge one level down that leaves a collection (or stays inside it).
///
/// Stored on the source collection under the destination collection so a
/// coarse step `A -> B` can be refined into the child edges that realize it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEdge {
    pub from: WaypointId,
    pub to: WaypointId,
}

impl ChildEdge {
    pub fn new(from: WaypointId, to: WaypointId) -> Self {
        Self { from, to }
    }
}

/// A node one search level above its children.
///
/// The position is the representative (first) child's position; the radius
/// always encloses every child's bounding sphere.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaypointCollection {
    id: WaypointId,
    kind: WaypointType,
    position: Vec3,
    radius: f32,
    children: SmallVec<[WaypointId; 4]>,
    child_edges: BTreeMap<WaypointId, SmallVec<[ChildEdge; 4]>>,
}

impl WaypointCollection {
    pub fn new(id: WaypointId) -> Self {
        Self::with_kind(id, WaypointType::COLLECTION)
    }

    pub fn with_kind(id: WaypointId, kind: WaypointType) -> Self {
        Self {
            id,
            kind,
            position: Vec3::ZERO,
            radius: 0.0,
            children: SmallVec::new(),
            child_edges: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> WaypointId {
        self.id
    }

    pub fn kind(&self) -> &WaypointType {
        &self.kind
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn children(&self) -> &[WaypointId] {
        &self.children
    }

    /// Number of direct children.
    pub fn degree(&self) -> usize {
        self.children.len()
    }

    pub fn contains_child(&self, id: WaypointId) -> bool {
        self.children.contains(&id)
    }

    /// Add a child, growing the bounds to contain it. The first child becomes
    /// the representative position. Returns false if it was already a child.
    pub(crate) fn insert_child(&mut self, id: WaypointId, position: Vec3, radius: f32) -> bool {
        if self.children.contains(&id) {
            return false;
        }
        if self.children.is_empty() {
            self.position = position;
            self.radius = radius;
        } else {
            self.radius = self.radius.max(position.distance(self.position) + radius);
        }
        self.children.push(id);
        true
    }

    pub(crate) fn remove_child(&mut self, id: WaypointId) -> bool {
        let Some(index) = self.children.iter().position(|&c| c == id) else {
            return false;
        };
        self.children.remove(index);
        self.child_edges.retain(|_, edges| {
            edges.retain(|e| e.from != id);
            !edges.is_empty()
        });
        true
    }

    /// Recompute the radius from scratch around the current position.
    pub(crate) fn recalculate(&mut self, children: impl IntoIterator<Item = (Vec3, f32)>) {
        let mut radius = 0.0f32;
        for (position, child_radius) in children {
            radius = radius.max(position.distance(self.position) + child_radius);
        }
        self.radius = radius;
    }

    pub fn add_child_edge(&mut self, destination: WaypointId, edge: ChildEdge) {
        let edges = self.child_edges.entry(destination).or_default();
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    /// Child edges leading toward `destination` (a sibling collection or self).
    pub fn child_edges(&self, destination: WaypointId) -> &[ChildEdge] {
        self.child_edges
            .get(&destination)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn clear_edges(&mut self) {
        self.child_edges.clear();
    }
}

impl fmt::Display for WaypointCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {}, {}) [{} children]",
            self.kind,
            self.id,
            self.position.x,
            self.position.y,
            self.position.z,
            self.children.len()
        )
    }
}
