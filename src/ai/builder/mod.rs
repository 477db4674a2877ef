use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use waypoint_macros::profile;

use super::config::BuilderConfig;
use super::graph::{GraphStats, WaypointGraph};
use super::nav_mesh::NavMesh;
use super::registry::CollectionFactory;
use super::waypoint::WaypointId;

mod clique;
mod search_level;

#[cfg(test)]
mod tests;

pub use search_level::{BuilderSearchLevel, LevelBuildStats};

/// Builds the search levels of a [`WaypointGraph`] one abstraction at a time.
///
/// # Algorithm
///
/// Each [`create_next_search_level`](Self::create_next_search_level) call
/// partitions the nodes of one level into new collections one level up:
///
/// 1. **4-clique pass:** pop a node, find its triangle clique; with at least
///    two members the node founds a collection with up to three of them
/// 2. **2-clique pass:** nodes left over pair with any unclaimed direct
///    bidirectional neighbour
/// 3. **Fallback pass:** nodes still left join the collection of the first
///    bidirectional neighbour that has one; otherwise they are logged as
///    unplaceable
/// 4. **Finalize:** abstract edges are derived for the new level
///
/// Worklists are LIFO stacks seeded in the level's node order, so results are
/// deterministic for a given insertion order.
///
/// The builder borrows the graph and the collection factory for its whole
/// lifetime and resets its bookkeeping on every call, so one builder can build
/// successive levels but must not be shared.
pub struct WaypointGraphBuilder<'a> {
    factory: &'a mut dyn CollectionFactory,
    graph: &'a mut WaypointGraph,
    config: BuilderConfig,
    current_level: u32,

    // Per-pass bookkeeping, reset by `reset`.
    level_nodes: Vec<WaypointId>,
    node_index: FxHashMap<WaypointId, usize>,
    unassigned_nodes: Vec<WaypointId>,
    assigned_nodes: FixedBitSet,
    nodes_unmatched: Vec<WaypointId>,
    unplaced: Vec<WaypointId>,

    last_level: Option<BuilderSearchLevel>,
}

impl<'a> WaypointGraphBuilder<'a> {
    pub fn new(factory: &'a mut dyn CollectionFactory, graph: &'a mut WaypointGraph) -> Self {
        Self::with_config(factory, graph, BuilderConfig::default())
    }

    pub fn with_config(
        factory: &'a mut dyn CollectionFactory,
        graph: &'a mut WaypointGraph,
        config: BuilderConfig,
    ) -> Self {
        Self {
            factory,
            graph,
            config: config.sanitized(),
            current_level: 0,
            level_nodes: Vec::new(),
            node_index: FxHashMap::default(),
            unassigned_nodes: Vec::new(),
            assigned_nodes: FixedBitSet::new(),
            nodes_unmatched: Vec::new(),
            unplaced: Vec::new(),
            last_level: None,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn graph(&self) -> &WaypointGraph {
        &*self.graph
    }

    /// Level created by the most recent call.
    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    /// Nodes the most recent call could not place in any collection.
    pub fn unplaced(&self) -> &[WaypointId] {
        &self.unplaced
    }

    /// What the most recent call produced.
    pub fn last_search_level(&self) -> Option<&BuilderSearchLevel> {
        self.last_level.as_ref()
    }

    pub fn take_last_search_level(&mut self) -> Option<BuilderSearchLevel> {
        self.last_level.take()
    }

    /// Drop any previous hierarchy and build levels `1..max_levels`, stopping
    /// as soon as a level converges to a single collection.
    #[profile(10)]
    pub fn create_search_graph(&mut self, max_levels: u32) -> GraphStats {
        self.graph.clear_abstraction();
        info!("=== SEARCH GRAPH BUILD START ===");
        info!(
            "  {} waypoints, {} edges, max {} levels",
            self.graph.nodes_at_level(0).len(),
            self.graph.nav_mesh_at_level(0).map(|m| m.edge_count()).unwrap_or(0),
            max_levels
        );

        let mut level = 1;
        let mut success = true;
        while level < max_levels && success {
            success = self.create_search_level(level);
            level += 1;
        }

        let stats = self.graph.stats();
        info!(
            "=== SEARCH GRAPH BUILD DONE: {} levels, nodes per level {:?}, {} unparented ===",
            stats.search_level_count, stats.nodes_per_level, stats.unparented_count
        );
        stats
    }

    /// [`create_search_graph`](Self::create_search_graph) with the configured level limit.
    pub fn build(&mut self) -> GraphStats {
        let max_levels = self.config.max_search_levels;
        self.create_search_graph(max_levels)
    }

    /// Build `level` from `level - 1`. Level 0 is the concrete waypoints and
    /// cannot be built.
    pub fn create_search_level(&mut self, level: u32) -> bool {
        if level == 0 {
            error!("Cannot create search level 0, search level 0 represents the concrete waypoints.");
            return false;
        }
        self.create_next_search_level(level - 1)
    }

    /// Group the nodes of `previous_level` into collections at the level above.
    ///
    /// Levels already built above `previous_level` are discarded first.
    /// Returns true when more than one collection was created, i.e. another
    /// level of abstraction is worth building.
    #[profile(5)]
    pub fn create_next_search_level(&mut self, previous_level: u32) -> bool {
        let Some(previous) = self.graph.search_level(previous_level) else {
            warn!("Search level {} does not exist, nothing to abstract.", previous_level);
            self.reset(Vec::new());
            self.last_level = None;
            return false;
        };
        let nodes = previous.nodes.clone();
        self.graph.clear_levels_above(previous_level);
        self.reset(nodes);
        self.current_level = previous_level + 1;

        let mut level = BuilderSearchLevel::new(self.current_level);
        level.stats.input_nodes = self.level_nodes.len();

        let nav_mesh = self.graph.take_nav_mesh(previous_level);
        self.match_four_cliques(&nav_mesh, &mut level);
        self.match_two_cliques(&nav_mesh, &mut level);
        self.assign_remaining(&nav_mesh, &mut level);
        self.graph.restore_nav_mesh(previous_level, nav_mesh);

        if !level.collections.is_empty() {
            self.graph.create_abstract_edges_at_level(self.current_level);
            if let Some(mesh) = self.graph.nav_mesh_at_level(self.current_level) {
                level.nav_mesh = mesh.clone();
            }
        }

        info!(
            "Search level {}: {} nodes -> {} collections ({} four-cliques, {} two-cliques, {} adopted, {} unplaced)",
            self.current_level,
            level.stats.input_nodes,
            level.collections.len(),
            level.stats.four_cliques,
            level.stats.two_cliques,
            level.stats.adopted,
            level.stats.unplaced
        );

        let more_levels = level.collections.len() > 1;
        self.last_level = Some(level);
        more_levels
    }

    fn reset(&mut self, nodes: Vec<WaypointId>) {
        self.node_index = nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        self.assigned_nodes = FixedBitSet::with_capacity(nodes.len());
        self.unassigned_nodes = nodes.clone();
        self.level_nodes = nodes;
        self.nodes_unmatched.clear();
        self.unplaced.clear();
    }

    /// Nodes outside the level being built are never available.
    fn is_assigned(&self, id: WaypointId) -> bool {
        match self.node_index.get(&id) {
            Some(&index) => self.assigned_nodes.contains(index),
            None => true,
        }
    }

    fn match_four_cliques(&mut self, nav_mesh: &NavMesh, level: &mut BuilderSearchLevel) {
        while let Some(wp) = self.unassigned_nodes.pop() {
            if self.is_assigned(wp) {
                continue;
            }

            let clique = clique::find_cliques(wp, nav_mesh, |c| self.is_assigned(c));
            if clique.len() < self.config.min_clique_candidates {
                self.nodes_unmatched.push(wp);
                continue;
            }

            let Some(wc) = self.create_collection(wp) else {
                self.nodes_unmatched.push(wp);
                continue;
            };
            self.assign_to(wp, wc);
            for &member in clique.iter().take(self.config.max_clique_siblings) {
                self.assign_to(member, wc);
            }

            level.collections.push(wc);
            level.stats.four_cliques += 1;
        }
    }

    fn match_two_cliques(&mut self, nav_mesh: &NavMesh, level: &mut BuilderSearchLevel) {
        while let Some(wp) = self.nodes_unmatched.pop() {
            if self.is_assigned(wp) {
                continue;
            }

            let partner = clique::find_candidates(wp, nav_mesh)
                .into_iter()
                .find(|&c| c != wp && !self.is_assigned(c));

            let Some(partner) = partner else {
                self.unassigned_nodes.push(wp);
                continue;
            };
            let Some(wc) = self.create_collection(wp) else {
                self.unassigned_nodes.push(wp);
                continue;
            };
            self.assign_to(wp, wc);
            self.assign_to(partner, wc);

            level.collections.push(wc);
            level.stats.two_cliques += 1;
        }
    }

    fn assign_remaining(&mut self, nav_mesh: &NavMesh, level: &mut BuilderSearchLevel) {
        while let Some(wp) = self.unassigned_nodes.pop() {
            if self.is_assigned(wp) {
                continue;
            }

            let adopter = nav_mesh
                .edges_from(wp)
                .iter()
                .filter(|pair| !nav_mesh.is_one_way(pair))
                .filter(|pair| self.node_index.contains_key(&pair.waypoint_to()))
                .find_map(|pair| {
                    self.graph
                        .get_parent(pair.waypoint_to())
                        .filter(|&parent| self.graph.search_level_num(parent) == Some(self.current_level))
                });

            if let Some(parent) = adopter {
                if self.assign_to(wp, parent) {
                    level.stats.adopted += 1;
                    continue;
                }
            } else {
                error!(
                    "Unable to place waypoint '{}' at search level {}, no bidirectional neighbour has a parent.",
                    self.graph.describe(wp),
                    self.current_level
                );
            }
            self.unplaced.push(wp);
            level.stats.unplaced += 1;
        }
    }

    fn create_collection(&mut self, seed: WaypointId) -> Option<WaypointId> {
        let Some(id) = self.graph.allocate_id() else {
            error!("No free waypoint id left, cannot group waypoint '{}'.", self.graph.describe(seed));
            return None;
        };
        let Some(mut wc) = self.factory.create_no_insert(id, &self.config.collection_type) else {
            error!(
                "No collection type '{}' registered, cannot group waypoint '{}'.",
                self.config.collection_type,
                self.graph.describe(seed)
            );
            return None;
        };

        if let Some(position) = self.graph.position(seed) {
            wc.set_position(position);
        }
        let id = wc.id();
        if !self.graph.insert_collection(wc, self.current_level) {
            error!("Collection id {} is already in use, cannot group waypoint '{}'.", id, self.graph.describe(seed));
            return None;
        }
        Some(id)
    }

    /// Claim `wp` for `collection` in this pass. Refuses (and logs) when `wp`
    /// is not a still-pending node of the level being built.
    fn assign_to(&mut self, wp: WaypointId, collection: WaypointId) -> bool {
        let Some(&index) = self.node_index.get(&wp) else {
            error!(
                "Waypoint '{}' is not a node of search level {}, cannot assign it to collection {}.",
                self.graph.describe(wp),
                self.current_level.saturating_sub(1),
                collection
            );
            return false;
        };
        if self.assigned_nodes.contains(index) {
            error!(
                "Waypoint '{}' was already claimed at search level {}, cannot assign it to collection {}.",
                self.graph.describe(wp),
                self.current_level,
                collection
            );
            return false;
        }

        if !self.graph.assign(wp, collection) {
            return false;
        }
        self.assigned_nodes.insert(index);
        true
    }
}
