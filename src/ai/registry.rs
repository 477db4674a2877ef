use bevy::prelude::*;
use rustc_hash::FxHashMap;

use super::collection::WaypointCollection;
use super::waypoint::{WaypointId, WaypointType};

/// Builds an empty collection of one registered concrete type.
pub type CollectionConstructor = fn(WaypointId, &WaypointType) -> WaypointCollection;

/// Allocates collection nodes without inserting them into a graph.
///
/// The builder asks for a node of a given type and inserts it into the graph
/// itself; which concrete collection is produced is up to the implementor.
pub trait CollectionFactory {
    /// Create a collection of type `kind` with the given id, or `None` if no
    /// such type is known to the factory.
    fn create_no_insert(&mut self, id: WaypointId, kind: &WaypointType) -> Option<WaypointCollection>;
}

/// Default [`CollectionFactory`]: a table of constructors keyed by type name.
#[derive(Resource, Clone)]
pub struct CollectionRegistry {
    constructors: FxHashMap<WaypointType, CollectionConstructor>,
    created: usize,
}

impl CollectionRegistry {
    /// A registry with no types at all.
    pub fn empty() -> Self {
        Self {
            constructors: FxHashMap::default(),
            created: 0,
        }
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: WaypointType, constructor: CollectionConstructor) {
        if self.constructors.insert(kind.clone(), constructor).is_some() {
            warn!("Replacing collection constructor for type '{}'", kind);
        }
    }

    pub fn is_registered(&self, kind: &WaypointType) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Number of collections this registry has handed out.
    pub fn created_count(&self) -> usize {
        self.created
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(WaypointType::COLLECTION, |id, kind| {
            WaypointCollection::with_kind(id, kind.clone())
        });
        registry
    }
}

impl CollectionFactory for CollectionRegistry {
    fn create_no_insert(&mut self, id: WaypointId, kind: &WaypointType) -> Option<WaypointCollection> {
        let constructor = self.constructors.get(kind)?;
        self.created += 1;
        Some(constructor(id, kind))
    }
}
