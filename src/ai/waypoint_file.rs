//! Reading and writing waypoint data.
//!
//! Two formats: a compressed binary snapshot of a whole [`WaypointGraph`]
//! (hierarchy included), and a hand-editable RON [`MeshDescription`] of the
//! concrete waypoints and their edges.

use bevy::prelude::*;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use super::graph::WaypointGraph;
use super::waypoint::{Waypoint, WaypointId, WaypointType};

pub const WAYPOINT_FILE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum WaypointFileError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode waypoint file: {0}")]
    Encode(#[from] bincode::Error),
    #[error("failed to parse mesh description: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("unsupported waypoint file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("edge {from} -> {to} references unknown waypoint {missing}")]
    UnknownWaypoint { from: u32, to: u32, missing: u32 },
    #[error("waypoint id {id} is already used by a collection")]
    IdInUse { id: u32 },
}

#[derive(Serialize, Deserialize)]
pub struct WaypointFile {
    pub version: u32,
    pub graph: WaypointGraph,
}

/// Save `graph` (all levels) as zlib-compressed bincode.
pub fn save_waypoint_file(path: impl AsRef<Path>, graph: &WaypointGraph) -> Result<(), WaypointFileError> {
    #[derive(Serialize)]
    struct WaypointFileRef<'a> {
        version: u32,
        graph: &'a WaypointGraph,
    }

    let file = File::create(path.as_ref())?;
    let writer = BufWriter::new(file);
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    bincode::serialize_into(&mut encoder, &WaypointFileRef { version: WAYPOINT_FILE_VERSION, graph })?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    Ok(())
}

pub fn load_waypoint_file(path: impl AsRef<Path>) -> Result<WaypointGraph, WaypointFileError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let mut decoder = ZlibDecoder::new(reader);
    let data: WaypointFile = bincode::deserialize_from(&mut decoder)?;
    if data.version != WAYPOINT_FILE_VERSION {
        return Err(WaypointFileError::UnsupportedVersion {
            found: data.version,
            expected: WAYPOINT_FILE_VERSION,
        });
    }
    Ok(data.graph)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WaypointDescription {
    pub id: u32,
    pub position: (f32, f32, f32),
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EdgeDescription {
    pub from: u32,
    pub to: u32,
    /// Only `from -> to` is added when set; otherwise both directions.
    #[serde(default)]
    pub one_way: bool,
}

/// Concrete waypoints and their links, as written by hand or by a level tool.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MeshDescription {
    #[serde(default)]
    pub waypoints: Vec<WaypointDescription>,
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

impl MeshDescription {
    pub fn from_ron(contents: &str) -> Result<Self, WaypointFileError> {
        Ok(ron::from_str(contents)?)
    }

    /// Insert every waypoint and edge into `graph`.
    ///
    /// Ids and edges are checked before anything is inserted, so a description
    /// that reuses a collection id or has a dangling edge leaves the graph
    /// untouched. Edge ends must be concrete waypoints.
    pub fn populate(&self, graph: &mut WaypointGraph) -> Result<Vec<WaypointId>, WaypointFileError> {
        if let Some(wp) = self.waypoints.iter().find(|wp| graph.collection(WaypointId(wp.id)).is_some()) {
            return Err(WaypointFileError::IdInUse { id: wp.id });
        }
        let known: FxHashSet<u32> = self
            .waypoints
            .iter()
            .map(|wp| wp.id)
            .chain(
                graph
                    .nodes_at_level(0)
                    .iter()
                    .filter(|&&id| graph.waypoint(id).is_some())
                    .map(|id| id.0),
            )
            .collect();
        for edge in &self.edges {
            for end in [edge.from, edge.to] {
                if !known.contains(&end) {
                    return Err(WaypointFileError::UnknownWaypoint { from: edge.from, to: edge.to, missing: end });
                }
            }
        }

        let mut ids = Vec::with_capacity(self.waypoints.len());
        for wp in &self.waypoints {
            let (x, y, z) = wp.position;
            let kind = wp.kind.clone().map(WaypointType::new).unwrap_or_default();
            let id = WaypointId(wp.id);
            graph.insert_waypoint(Waypoint::with_kind(id, Vec3::new(x, y, z), kind));
            ids.push(id);
        }

        // Every end is a level 0 waypoint by now, so only duplicates are refused.
        let mut duplicates = 0;
        for edge in &self.edges {
            let (from, to) = (WaypointId(edge.from), WaypointId(edge.to));
            if !graph.add_edge(from, to) {
                duplicates += 1;
            }
            if !edge.one_way && !graph.add_edge(to, from) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            warn!("Skipped {} duplicate edges while populating the graph", duplicates);
        }

        info!(
            "Populated graph with {} waypoints and {} edge descriptions",
            self.waypoints.len(),
            self.edges.len()
        );
        Ok(ids)
    }
}

pub fn load_mesh_description(path: impl AsRef<Path>) -> Result<MeshDescription, WaypointFileError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    MeshDescription::from_ron(&contents)
}
