use serde::{Deserialize, Serialize};

use crate::ai::graph::SearchLevel;
use crate::ai::nav_mesh::NavMesh;
use crate::ai::waypoint::WaypointId;

/// Counters for one `create_next_search_level` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBuildStats {
    /// Nodes read from the level below.
    pub input_nodes: usize,
    /// Collections founded by the 4-clique pass (3 or 4 members each).
    pub four_cliques: usize,
    /// Collections founded by the 2-clique pass (2 members each).
    pub two_cliques: usize,
    /// Leftover nodes adopted by a neighbour's collection.
    pub adopted: usize,
    /// Nodes that could not be placed at all.
    pub unplaced: usize,
}

/// The collections one builder pass created, with the abstract edges among them.
#[derive(Debug, Clone, Default)]
pub struct BuilderSearchLevel {
    pub level_num: u32,
    pub collections: Vec<WaypointId>,
    pub nav_mesh: NavMesh,
    pub stats: LevelBuildStats,
}

impl BuilderSearchLevel {
    pub fn new(level_num: u32) -> Self {
        Self { level_num, ..Default::default() }
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    /// The record pathfinding consumes for this level.
    pub fn to_search_level(&self) -> SearchLevel {
        SearchLevel {
            level_num: self.level_num,
            nodes: self.collections.clone(),
            nav_mesh: self.nav_mesh.clone(),
        }
    }
}

impl From<BuilderSearchLevel> for SearchLevel {
    fn from(level: BuilderSearchLevel) -> Self {
        SearchLevel {
            level_num: level.level_num,
            nodes: level.collections,
            nav_mesh: level.nav_mesh,
        }
    }
}
