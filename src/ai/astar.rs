use bevy::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::graph::WaypointGraph;
use super::waypoint::WaypointId;

#[derive(Copy, Clone, Debug)]
struct State {
    cost: f32,
    node: WaypointId,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties broken by id for determinism.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* over the search levels of a [`WaypointGraph`].
///
/// Edge costs are the stored [`NavMesh`](super::NavMesh) costs (distances) and
/// the heuristic is the straight-line distance to the goal, which stays
/// admissible at every level because collections sit on their first child.
pub struct WaypointGraphAStar<'a> {
    graph: &'a WaypointGraph,
}

impl<'a> WaypointGraphAStar<'a> {
    pub fn new(graph: &'a WaypointGraph) -> Self {
        Self { graph }
    }

    /// Shortest path between two nodes of the same search level, both ends
    /// included.
    pub fn find_path(&self, from: WaypointId, to: WaypointId) -> Option<Vec<WaypointId>> {
        let level = self.shared_level(from, to)?;
        if from == to {
            return Some(vec![from]);
        }
        self.search(level, from, to, None)
    }

    /// Coarse-to-fine search through the hierarchy.
    ///
    /// Plans among the children of the lowest common collection, then refines
    /// one level at a time, each level only allowed to visit children of the
    /// nodes on the coarser path. Falls back to [`find_path`](Self::find_path)
    /// if a refinement step finds nothing or the nodes were never grouped.
    pub fn hierarchical_find_path(&self, from: WaypointId, to: WaypointId) -> Option<Vec<WaypointId>> {
        let level = self.shared_level(from, to)?;
        if from == to {
            return Some(vec![from]);
        }
        if self.graph.get_parent(from).is_none() || self.graph.get_parent(to).is_none() {
            return self.search(level, from, to, None);
        }

        // Different roots: no path at any level.
        let common = self.graph.find_common_parent(from, to)?;
        let from_chain = self.graph.node_path(from, common)?;
        let to_chain = self.graph.node_path(to, common)?;
        if from_chain.len() != to_chain.len() {
            warn!("Ancestor chains of {} and {} differ in length, searching without hierarchy.", from, to);
            return self.search(level, from, to, None);
        }

        let mut corridor: FxHashSet<WaypointId> = self.graph.collection(common)?.children().iter().copied().collect();
        let mut path = Vec::new();

        for depth in (0..from_chain.len()).rev() {
            let search_level = level + depth as u32;
            match self.search(search_level, from_chain[depth], to_chain[depth], Some(&corridor)) {
                Some(refined) => path = refined,
                None => {
                    debug!(
                        "Corridor refinement failed at level {} ({} -> {}), searching without hierarchy.",
                        search_level, from_chain[depth], to_chain[depth]
                    );
                    return self.search(level, from, to, None);
                }
            }

            if depth > 0 {
                corridor = path
                    .iter()
                    .filter_map(|&id| self.graph.collection(id))
                    .flat_map(|wc| wc.children().iter().copied())
                    .collect();
            }
        }

        Some(path)
    }

    fn shared_level(&self, from: WaypointId, to: WaypointId) -> Option<u32> {
        let (Some(from_level), Some(to_level)) = (self.graph.search_level_num(from), self.graph.search_level_num(to)) else {
            warn!("Cannot find a path between unknown waypoints {} and {}.", from, to);
            return None;
        };
        if from_level != to_level {
            warn!(
                "Cannot find a path between '{}' on level {} and '{}' on level {}.",
                self.graph.describe(from),
                from_level,
                self.graph.describe(to),
                to_level
            );
            return None;
        }
        Some(from_level)
    }

    fn search(
        &self,
        level: u32,
        start: WaypointId,
        goal: WaypointId,
        corridor: Option<&FxHashSet<WaypointId>>,
    ) -> Option<Vec<WaypointId>> {
        let nav_mesh = self.graph.nav_mesh_at_level(level)?;
        let goal_position = self.graph.position(goal)?;
        let heuristic = |id: WaypointId| {
            self.graph
                .position(id)
                .map(|p| p.distance(goal_position))
                .unwrap_or(0.0)
        };

        let mut open_set = BinaryHeap::new();
        open_set.push(State { cost: heuristic(start), node: start });

        let mut came_from: FxHashMap<WaypointId, WaypointId> = FxHashMap::default();
        let mut g_score: FxHashMap<WaypointId, f32> = FxHashMap::default();
        let mut closed: FxHashSet<WaypointId> = FxHashSet::default();
        g_score.insert(start, 0.0);

        while let Some(State { cost: _, node: current }) = open_set.pop() {
            if current == goal {
                return Some(reconstruct_path(&came_from, current));
            }
            if !closed.insert(current) {
                continue;
            }
            let Some(&current_g) = g_score.get(&current) else {
                continue;
            };

            for pair in nav_mesh.edges_from(current) {
                let next = pair.waypoint_to();
                if corridor.is_some_and(|allowed| !allowed.contains(&next)) || closed.contains(&next) {
                    continue;
                }

                let tentative_g_score = current_g + pair.cost();
                if tentative_g_score < g_score.get(&next).copied().unwrap_or(f32::INFINITY) {
                    came_from.insert(next, current);
                    g_score.insert(next, tentative_g_score);
                    open_set.push(State { cost: tentative_g_score + heuristic(next), node: next });
                }
            }
        }
        None
    }
}

fn reconstruct_path(came_from: &FxHashMap<WaypointId, WaypointId>, mut current: WaypointId) -> Vec<WaypointId> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        current = prev;
        path.push(current);
    }
    path.reverse();
    path
}
