use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::waypoint::WaypointType;

pub const DEFAULT_CONFIG_PATH: &str = "assets/builder_config.ron";

/// Tuning for [`WaypointGraphBuilder`](super::WaypointGraphBuilder).
///
/// Missing fields in the RON file fall back to the defaults below, so a config
/// file only needs to name what it changes.
#[derive(Resource, Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BuilderConfig {
    /// Upper bound passed to `create_search_graph` by [`WaypointGraphBuilder::build`](super::WaypointGraphBuilder::build).
    pub max_search_levels: u32,
    /// Clique members taken into a new collection besides the seed.
    pub max_clique_siblings: usize,
    /// Clique members needed before the 4-clique pass founds a collection.
    pub min_clique_candidates: usize,
    /// Registered collection type the builder asks the factory for.
    pub collection_type: WaypointType,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_search_levels: 10,
            max_clique_siblings: 3,
            min_clique_candidates: 2,
            collection_type: WaypointType::COLLECTION,
        }
    }
}

impl BuilderConfig {
    /// Clamp values that would stop the builder from making progress.
    pub fn sanitized(mut self) -> Self {
        // A collection always needs at least one member besides its seed.
        self.min_clique_candidates = self.min_clique_candidates.max(1);
        self.max_clique_siblings = self.max_clique_siblings.max(1);
        self
    }

    pub fn from_ron(contents: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str::<BuilderConfig>(contents).map(Self::sanitized)
    }

    /// Read a config file, logging and falling back to defaults on any failure.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_ron(&contents) {
                Ok(config) => {
                    info!("Loaded builder config from {}", path.display());
                    config
                }
                Err(e) => {
                    error!("Failed to parse builder config {}: {}", path.display(), e);
                    error!("Using default BuilderConfig");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                error!("Using default BuilderConfig");
                Self::default()
            }
        }
    }
}
