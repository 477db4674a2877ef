use bevy::prelude::*;
use std::path::PathBuf;

mod astar;
mod builder;
mod collection;
pub mod config;
mod graph;
mod nav_mesh;
mod registry;
mod systems;
mod waypoint;
pub mod waypoint_file;


// ============================================================================
// PUBLIC API
// ============================================================================

pub use astar::WaypointGraphAStar;
pub use builder::{BuilderSearchLevel, LevelBuildStats, WaypointGraphBuilder};
pub use collection::{ChildEdge, WaypointCollection};
pub use config::BuilderConfig;
pub use graph::{GraphStats, SearchLevel, WaypointGraph};
pub use nav_mesh::{NavMesh, WaypointPair};
pub use registry::{CollectionConstructor, CollectionFactory, CollectionRegistry};
pub use systems::{BuildSearchGraph, SearchGraphBuilt};
pub use waypoint::{Waypoint, WaypointId, WaypointNode, WaypointType};

/// Registers the waypoint graph resources and the rebuild-on-request system.
///
/// Send a [`BuildSearchGraph`] message to (re)build the hierarchy of the
/// [`WaypointGraph`] resource; a [`SearchGraphBuilt`] message follows once the
/// build has run.
///
/// With a `config_path` the [`BuilderConfig`] is read from that RON file while
/// the plugin is added; otherwise an existing resource or the defaults are used.
#[derive(Default)]
pub struct WaypointGraphPlugin {
    pub config_path: Option<PathBuf>,
}

impl WaypointGraphPlugin {
    pub fn with_config_file(path: impl Into<PathBuf>) -> Self {
        Self { config_path: Some(path.into()) }
    }
}

impl Plugin for WaypointGraphPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<BuildSearchGraph>();
        app.add_message::<SearchGraphBuilt>();
        app.init_resource::<WaypointGraph>();
        app.init_resource::<CollectionRegistry>();
        match &self.config_path {
            Some(path) => {
                app.insert_resource(BuilderConfig::load_or_default(path));
            }
            None => {
                app.init_resource::<BuilderConfig>();
            }
        }
        app.add_systems(Update, systems::build_search_graph);
    }
}
