use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use super::collection::WaypointCollection;

/// Unique identifier shared by waypoints and collections in one graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaypointId(pub u32);

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a concrete waypoint/collection type, as registered with a
/// [`CollectionRegistry`](super::CollectionRegistry).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointType(pub Cow<'static, str>);

impl WaypointType {
    pub const DEFAULT: WaypointType = WaypointType(Cow::Borrowed("Waypoint"));
    pub const COLLECTION: WaypointType = WaypointType(Cow::Borrowed("WaypointCollection"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for WaypointType {
    fn default() -> Self {
        WaypointType::DEFAULT
    }
}

impl fmt::Display for WaypointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single navigable point, the leaf of the hierarchy (search level 0).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    pub position: Vec3,
    pub kind: WaypointType,
}

impl Waypoint {
    pub fn new(id: WaypointId, position: Vec3) -> Self {
        Self { id, position, kind: WaypointType::DEFAULT }
    }

    pub fn with_kind(id: WaypointId, position: Vec3, kind: WaypointType) -> Self {
        Self { id, position, kind }
    }

    #[inline]
    pub fn id(&self) -> WaypointId {
        self.id
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {}, {})",
            self.kind, self.id, self.position.x, self.position.y, self.position.z
        )
    }
}

/// What the graph stores for one id: a concrete waypoint or a collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WaypointNode {
    Waypoint(Waypoint),
    Collection(WaypointCollection),
}

impl WaypointNode {
    pub fn id(&self) -> WaypointId {
        match self {
            WaypointNode::Waypoint(wp) => wp.id,
            WaypointNode::Collection(wc) => wc.id(),
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            WaypointNode::Waypoint(wp) => wp.position,
            WaypointNode::Collection(wc) => wc.position(),
        }
    }

    /// Bounding radius; zero for a concrete waypoint.
    pub fn radius(&self) -> f32 {
        match self {
            WaypointNode::Waypoint(_) => 0.0,
            WaypointNode::Collection(wc) => wc.radius(),
        }
    }

    pub fn kind(&self) -> &WaypointType {
        match self {
            WaypointNode::Waypoint(wp) => &wp.kind,
            WaypointNode::Collection(wc) => wc.kind(),
        }
    }

    pub fn as_collection(&self) -> Option<&WaypointCollection> {
        match self {
            WaypointNode::Collection(wc) => Some(wc),
            WaypointNode::Waypoint(_) => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut WaypointCollection> {
        match self {
            WaypointNode::Collection(wc) => Some(wc),
            WaypointNode::Waypoint(_) => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, WaypointNode::Collection(_))
    }
}

impl fmt::Display for WaypointNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaypointNode::Waypoint(wp) => wp.fmt(f),
            WaypointNode::Collection(wc) => wc.fmt(f),
        }
    }
}
