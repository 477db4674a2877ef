use bevy::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::collection::{ChildEdge, WaypointCollection};
use super::nav_mesh::NavMesh;
use super::waypoint::{Waypoint, WaypointId, WaypointNode, WaypointType};

/// One layer of the hierarchy: its nodes and the edges among them.
///
/// Level 0 holds the concrete waypoints; level N+1 holds the collections
/// grouping level N.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchLevel {
    pub level_num: u32,
    pub nodes: Vec<WaypointId>,
    pub nav_mesh: NavMesh,
}

impl SearchLevel {
    pub fn new(level_num: u32) -> Self {
        Self { level_num, nodes: Vec::new(), nav_mesh: NavMesh::new() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WaypointHolder {
    level: u32,
    parent: Option<WaypointId>,
    node: WaypointNode,
}

/// Hierarchical waypoint graph.
///
/// # Architecture
///
/// 1. **Ownership map:** every waypoint and collection by id, with its search
///    level and its parent collection (if assigned)
/// 2. **Search levels:** per-level node lists and [`NavMesh`]es, sorted by level
/// 3. **Abstract edges:** collections at level N+1 are linked whenever any of
///    their children are linked at level N ([`Self::create_abstract_edges_at_level`])
///
/// The graph never builds the hierarchy itself; see
/// [`WaypointGraphBuilder`](super::WaypointGraphBuilder).
#[derive(Resource, Clone, Debug, Default, Serialize, Deserialize)]
pub struct WaypointGraph {
    ownership: FxHashMap<WaypointId, WaypointHolder>,
    search_levels: Vec<SearchLevel>,
    next_id: u32,
}

impl WaypointGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every waypoint, collection and level. Ids are not reused.
    pub fn clear(&mut self) {
        self.ownership.clear();
        self.search_levels.clear();
    }

    /// Hand out an id that no node in this graph uses, wrapping around past
    /// `u32::MAX`. `None` when every id is taken.
    pub fn allocate_id(&mut self) -> Option<WaypointId> {
        // Among `len + 1` consecutive ids at least one is free.
        let attempts = (self.ownership.len() as u64 + 1).min(u64::from(u32::MAX) + 1);
        let mut candidate = self.next_id;
        for _ in 0..attempts {
            let id = WaypointId(candidate);
            candidate = candidate.wrapping_add(1);
            if !self.ownership.contains_key(&id) {
                self.next_id = candidate;
                return Some(id);
            }
        }
        None
    }

    fn note_id(&mut self, id: WaypointId) {
        self.next_id = self.next_id.max(id.0.saturating_add(1));
    }

    /// Create and insert a waypoint at level 0. `None` when no id is free.
    pub fn create_waypoint(&mut self, position: Vec3, kind: WaypointType) -> Option<WaypointId> {
        let id = self.allocate_id()?;
        self.insert_waypoint(Waypoint::with_kind(id, position, kind));
        Some(id)
    }

    /// Insert a concrete waypoint at level 0.
    ///
    /// Inserting an id that is already present is treated as a move: the
    /// position is updated and the bounds of every ancestor recalculated.
    pub fn insert_waypoint(&mut self, waypoint: Waypoint) {
        let id = waypoint.id;
        if let Some(holder) = self.ownership.get_mut(&id) {
            match &mut holder.node {
                WaypointNode::Waypoint(existing) => existing.position = waypoint.position,
                WaypointNode::Collection(wc) => {
                    warn!("Cannot insert waypoint {}, id is used by collection '{}'", id, wc);
                    return;
                }
            }
            if let Some(parent) = holder.parent {
                self.recalculate_bounds(parent);
            }
            return;
        }

        self.note_id(id);
        self.ownership.insert(
            id,
            WaypointHolder { level: 0, parent: None, node: WaypointNode::Waypoint(waypoint) },
        );
        self.get_or_create_search_level(0).nodes.push(id);
    }

    /// Insert a collection at `level`. Returns false if the id is taken.
    pub fn insert_collection(&mut self, collection: WaypointCollection, level: u32) -> bool {
        let id = collection.id();
        if self.ownership.contains_key(&id) {
            return false;
        }

        self.note_id(id);
        self.ownership.insert(
            id,
            WaypointHolder { level, parent: None, node: WaypointNode::Collection(collection) },
        );
        self.get_or_create_search_level(level).nodes.push(id);
        true
    }

    /// Remove a node. Removing a collection removes its whole subtree.
    pub fn remove_waypoint(&mut self, id: WaypointId) -> bool {
        let Some(holder) = self.ownership.get(&id) else {
            return false;
        };

        if let WaypointNode::Collection(wc) = &holder.node {
            let children: Vec<WaypointId> = wc.children().to_vec();
            for child in children {
                self.remove_waypoint(child);
            }
        }

        self.remove_node(id);
        true
    }

    fn remove_node(&mut self, id: WaypointId) {
        let Some(holder) = self.ownership.remove(&id) else {
            return;
        };

        if let Some(parent) = holder.parent {
            if let Some(wc) = self.collection_mut(parent) {
                wc.remove_child(id);
            }
            self.recalculate_bounds(parent);
        }

        if let Some(sl) = self.search_level_mut(holder.level) {
            sl.nav_mesh.remove_all_edges(id);
            sl.nodes.retain(|&n| n != id);
        }
    }

    pub fn contains(&self, id: WaypointId) -> bool {
        self.ownership.contains_key(&id)
    }

    pub fn node(&self, id: WaypointId) -> Option<&WaypointNode> {
        self.ownership.get(&id).map(|h| &h.node)
    }

    /// The concrete waypoint with this id, if it is not a collection.
    pub fn waypoint(&self, id: WaypointId) -> Option<&Waypoint> {
        match self.node(id)? {
            WaypointNode::Waypoint(wp) => Some(wp),
            WaypointNode::Collection(_) => None,
        }
    }

    pub fn collection(&self, id: WaypointId) -> Option<&WaypointCollection> {
        self.node(id)?.as_collection()
    }

    fn collection_mut(&mut self, id: WaypointId) -> Option<&mut WaypointCollection> {
        self.ownership.get_mut(&id)?.node.as_collection_mut()
    }

    pub fn position(&self, id: WaypointId) -> Option<Vec3> {
        self.node(id).map(|n| n.position())
    }

    /// Human readable name for log messages; falls back to the bare id.
    pub(crate) fn describe(&self, id: WaypointId) -> String {
        self.node(id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("<unknown {}>", id))
    }

    /// A collection maps to itself, a waypoint to its parent collection.
    pub fn find_collection(&self, id: WaypointId) -> Option<WaypointId> {
        let holder = self.ownership.get(&id)?;
        if holder.node.is_collection() {
            Some(id)
        } else {
            holder.parent
        }
    }

    /// The collection `id` is assigned to, one level up.
    pub fn get_parent(&self, id: WaypointId) -> Option<WaypointId> {
        self.ownership.get(&id)?.parent
    }

    /// Top-most collection above `id`.
    pub fn root_parent(&self, id: WaypointId) -> Option<WaypointId> {
        let mut current = self.find_collection(id)?;
        while let Some(parent) = self.get_parent(current) {
            current = parent;
        }
        Some(current)
    }

    /// Two nodes are connected when they share a root collection.
    pub fn has_path(&self, lhs: WaypointId, rhs: WaypointId) -> bool {
        match (self.root_parent(lhs), self.root_parent(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Lowest collection that contains both nodes.
    pub fn find_common_parent(&self, lhs: WaypointId, rhs: WaypointId) -> Option<WaypointId> {
        let mut lhs = self.find_collection(lhs)?;
        let mut rhs = self.find_collection(rhs)?;
        let mut lhs_level = self.search_level_num(lhs)?;
        let mut rhs_level = self.search_level_num(rhs)?;

        while lhs_level < rhs_level {
            lhs = self.get_parent(lhs)?;
            lhs_level += 1;
        }
        while rhs_level < lhs_level {
            rhs = self.get_parent(rhs)?;
            rhs_level += 1;
        }

        loop {
            if lhs == rhs {
                return Some(lhs);
            }
            lhs = self.get_parent(lhs)?;
            rhs = self.get_parent(rhs)?;
        }
    }

    /// Chain of nodes from `child` up to, but excluding, `ancestor`.
    /// `None` when `ancestor` is not above `child`.
    pub fn node_path(&self, child: WaypointId, ancestor: WaypointId) -> Option<Vec<WaypointId>> {
        let mut path = Vec::new();
        let mut current = child;
        loop {
            if current == ancestor {
                return Some(path);
            }
            path.push(current);
            current = self.get_parent(current)?;
        }
    }

    /// Add the directed edge `from -> to`. Both nodes must exist and share a
    /// search level.
    pub fn add_edge(&mut self, from: WaypointId, to: WaypointId) -> bool {
        let (Some(from_holder), Some(to_holder)) = (self.ownership.get(&from), self.ownership.get(&to)) else {
            error!(
                "Waypoints must be explicitly added before an edge can be added containing either of them ({} -> {}).",
                from, to
            );
            return false;
        };

        if from_holder.level != to_holder.level {
            error!(
                "Cannot insert edge between waypoints that are not on the same level ('{}' on {}, '{}' on {}).",
                from_holder.node, from_holder.level, to_holder.node, to_holder.level
            );
            return false;
        }

        let level = from_holder.level;
        let cost = from_holder.node.position().distance(to_holder.node.position());
        match self.search_level_mut(level) {
            Some(sl) => sl.nav_mesh.add_edge(from, to, cost),
            None => false,
        }
    }

    pub fn remove_edge(&mut self, from: WaypointId, to: WaypointId) -> bool {
        let (Some(from_holder), Some(to_holder)) = (self.ownership.get(&from), self.ownership.get(&to)) else {
            return false;
        };
        if from_holder.level != to_holder.level {
            error!("Cannot remove edge between waypoints that are not on the same level.");
            return false;
        }
        let level = from_holder.level;
        match self.search_level_mut(level) {
            Some(sl) => sl.nav_mesh.remove_edge(from, to),
            None => false,
        }
    }

    /// Remove every edge leaving `id`.
    pub fn remove_all_edges_from(&mut self, id: WaypointId) {
        let Some(level) = self.search_level_num(id) else {
            return;
        };
        if let Some(sl) = self.search_level_mut(level) {
            sl.nav_mesh.remove_edges_from(id);
        }
    }

    /// Destinations of every edge leaving `id`.
    pub fn edges_from(&self, id: WaypointId) -> Vec<WaypointId> {
        let Some(mesh) = self.search_level_num(id).and_then(|level| self.nav_mesh_at_level(level)) else {
            return Vec::new();
        };
        mesh.edges_from(id).iter().map(|pair| pair.waypoint_to()).collect()
    }

    /// Make `child` a child of the collection `parent`, one level above it.
    ///
    /// A childless, parentless collection sitting on the wrong level is moved to
    /// the right one first (collections are often inserted before their level
    /// is known). Assigning a child that already has another parent moves it.
    pub fn assign(&mut self, child: WaypointId, parent: WaypointId) -> bool {
        if child == parent {
            error!("Cannot assign waypoint {} as its own parent.", child);
            return false;
        }

        let Some(child_holder) = self.ownership.get(&child) else {
            error!("Cannot assign unknown waypoint {} to collection {}.", child, parent);
            return false;
        };
        let target_level = child_holder.level + 1;
        let old_parent = child_holder.parent;

        let Some(parent_holder) = self.ownership.get(&parent) else {
            error!(
                "WaypointCollection {} must be inserted before '{}' can be assigned to it.",
                parent, child_holder.node
            );
            return false;
        };
        let Some(wc) = parent_holder.node.as_collection() else {
            error!("Cannot assign '{}' to '{}', which is not a collection.", child_holder.node, parent_holder.node);
            return false;
        };

        if parent_holder.level != target_level {
            if parent_holder.parent.is_none() && wc.degree() == 0 {
                let old_level = parent_holder.level;
                if let Some(sl) = self.search_level_mut(old_level) {
                    sl.nav_mesh.remove_all_edges(parent);
                    sl.nodes.retain(|&n| n != parent);
                }
                if let Some(holder) = self.ownership.get_mut(&parent) {
                    holder.level = target_level;
                }
                self.get_or_create_search_level(target_level).nodes.push(parent);
            } else {
                error!(
                    "WaypointCollection '{}' has search level {} which should be 1 greater than child '{}' search level of {}.",
                    wc,
                    parent_holder.level,
                    child_holder.node,
                    child_holder.level
                );
                return false;
            }
        }

        if old_parent == Some(parent) {
            return true;
        }
        if let Some(old) = old_parent {
            if let Some(old_wc) = self.collection_mut(old) {
                old_wc.remove_child(child);
            }
            self.recalculate_bounds(old);
        }

        let Some(node) = self.node(child) else {
            return false;
        };
        let (position, radius) = (node.position(), node.radius());
        if let Some(wc) = self.collection_mut(parent) {
            wc.insert_child(child, position, radius);
        }
        if let Some(holder) = self.ownership.get_mut(&child) {
            holder.parent = Some(parent);
        }
        self.recalculate_bounds(parent);
        true
    }

    /// Recompute the bounds of `collection` and every collection above it.
    fn recalculate_bounds(&mut self, collection: WaypointId) {
        let mut current = Some(collection);
        while let Some(id) = current {
            let Some(wc) = self.collection(id) else {
                return;
            };
            let children: Vec<(Vec3, f32)> = wc
                .children()
                .iter()
                .filter_map(|&c| self.node(c).map(|n| (n.position(), n.radius())))
                .collect();

            if let Some(wc) = self.collection_mut(id) {
                if let Some(&(first, _)) = children.first() {
                    wc.set_position(first);
                }
                wc.recalculate(children);
            }
            current = self.get_parent(id);
        }
    }

    /// Rebuild the edges of every level above 0 from the level below it.
    pub fn create_abstract_edges(&mut self) {
        let levels: Vec<u32> = self
            .search_levels
            .iter()
            .map(|sl| sl.level_num)
            .filter(|&level| level > 0)
            .collect();
        for level in levels {
            self.create_abstract_edges_at_level(level);
        }
    }

    /// Link the collections at `level` wherever their children are linked one
    /// level down, and record the child edges realizing each link.
    pub fn create_abstract_edges_at_level(&mut self, level: u32) {
        if level == 0 {
            warn!("Search level 0 holds user generated edges, no abstract edges to create.");
            return;
        }
        let (Some(current), Some(previous)) = (self.search_level(level), self.search_level(level - 1)) else {
            warn!("Cannot create abstract edges for missing search level {}.", level);
            return;
        };

        let nodes = current.nodes.clone();
        let mut level_edges: Vec<(WaypointId, WaypointId)> = Vec::new();
        let mut child_edges: Vec<(WaypointId, WaypointId, ChildEdge)> = Vec::new();

        for &wc_id in &nodes {
            let Some(wc) = self.collection(wc_id) else {
                continue;
            };
            for &child in wc.children() {
                for pair in previous.nav_mesh.edges_from(child) {
                    let to = pair.waypoint_to();
                    match self.get_parent(to) {
                        Some(to_parent) => {
                            if to_parent != wc_id {
                                level_edges.push((wc_id, to_parent));
                            }
                            if child != to {
                                child_edges.push((wc_id, to_parent, ChildEdge::new(child, to)));
                            }
                        }
                        None => {
                            error!(
                                "Error while creating abstract edges for level '{}', no parent found for waypoint '{}'.",
                                level,
                                self.describe(to)
                            );
                        }
                    }
                }
            }
        }

        for &wc_id in &nodes {
            if let Some(wc) = self.collection_mut(wc_id) {
                wc.clear_edges();
            }
        }
        for (wc_id, destination, edge) in child_edges {
            if let Some(wc) = self.collection_mut(wc_id) {
                wc.add_child_edge(destination, edge);
            }
        }

        let costs: Vec<(WaypointId, WaypointId, f32)> = level_edges
            .into_iter()
            .map(|(from, to)| {
                let cost = match (self.position(from), self.position(to)) {
                    (Some(a), Some(b)) => a.distance(b),
                    _ => 0.0,
                };
                (from, to, cost)
            })
            .collect();
        if let Some(sl) = self.search_level_mut(level) {
            sl.nav_mesh.clear();
            for (from, to, cost) in costs {
                sl.nav_mesh.add_edge(from, to, cost);
            }
        }
    }

    /// Drop every collection and level above 0, leaving the waypoints and
    /// their edges untouched.
    pub fn clear_abstraction(&mut self) {
        self.clear_levels_above(0);
    }

    /// Drop every collection above `level`. Nodes at `level` lose their
    /// parents; everything at or below it is kept.
    pub fn clear_levels_above(&mut self, level: u32) {
        let collections: Vec<WaypointId> = self
            .search_levels
            .iter()
            .filter(|sl| sl.level_num > level)
            .flat_map(|sl| sl.nodes.iter().copied())
            .collect();
        for id in collections {
            self.ownership.remove(&id);
        }
        self.search_levels.retain(|sl| sl.level_num <= level);
        for holder in self.ownership.values_mut() {
            if holder.level >= level {
                holder.parent = None;
            }
        }
    }

    /// Number of search levels. Not necessarily the highest level number.
    pub fn num_search_levels(&self) -> usize {
        self.search_levels.len()
    }

    pub fn search_levels(&self) -> &[SearchLevel] {
        &self.search_levels
    }

    pub fn search_level(&self, level: u32) -> Option<&SearchLevel> {
        // Levels are usually contiguous, so try the index first.
        if let Some(sl) = self.search_levels.get(level as usize) {
            if sl.level_num == level {
                return Some(sl);
            }
        }
        self.search_levels.iter().find(|sl| sl.level_num == level)
    }

    fn search_level_mut(&mut self, level: u32) -> Option<&mut SearchLevel> {
        self.search_levels.iter_mut().find(|sl| sl.level_num == level)
    }

    fn get_or_create_search_level(&mut self, level: u32) -> &mut SearchLevel {
        let index = match self.search_levels.binary_search_by_key(&level, |sl| sl.level_num) {
            Ok(index) => index,
            Err(index) => {
                self.search_levels.insert(index, SearchLevel::new(level));
                index
            }
        };
        &mut self.search_levels[index]
    }

    pub fn nav_mesh_at_level(&self, level: u32) -> Option<&NavMesh> {
        self.search_level(level).map(|sl| &sl.nav_mesh)
    }

    /// Node ids at `level`, in insertion order.
    pub fn nodes_at_level(&self, level: u32) -> &[WaypointId] {
        self.search_level(level)
            .map(|sl| sl.nodes.as_slice())
            .unwrap_or(&[])
    }

    pub fn search_level_num(&self, id: WaypointId) -> Option<u32> {
        self.ownership.get(&id).map(|h| h.level)
    }

    /// Move a level's mesh out so it can be read while the graph is mutated.
    pub(crate) fn take_nav_mesh(&mut self, level: u32) -> NavMesh {
        self.search_level_mut(level)
            .map(|sl| std::mem::take(&mut sl.nav_mesh))
            .unwrap_or_default()
    }

    pub(crate) fn restore_nav_mesh(&mut self, level: u32, nav_mesh: NavMesh) {
        if let Some(sl) = self.search_level_mut(level) {
            sl.nav_mesh = nav_mesh;
        }
    }

    pub fn stats(&self) -> GraphStats {
        let nodes_per_level: Vec<usize> = self.search_levels.iter().map(|sl| sl.nodes.len()).collect();
        let waypoint_count = self.ownership.values().filter(|h| !h.node.is_collection()).count();
        let collection_count = self.ownership.len() - waypoint_count;
        let edge_count = self.search_levels.iter().map(|sl| sl.nav_mesh.edge_count()).sum();
        let unparented_count = self
            .search_levels
            .iter()
            .rev()
            .skip(1)
            .flat_map(|sl| sl.nodes.iter())
            .filter(|id| self.get_parent(**id).is_none())
            .count();

        GraphStats {
            waypoint_count,
            collection_count,
            search_level_count: self.search_levels.len(),
            nodes_per_level,
            edge_count,
            unparented_count,
        }
    }
}

/// Statistics about the waypoint graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub waypoint_count: usize,
    pub collection_count: usize,
    pub search_level_count: usize,
    pub nodes_per_level: Vec<usize>,
    pub edge_count: usize,
    /// Nodes below the top level that have no parent.
    pub unparented_count: usize,
}
