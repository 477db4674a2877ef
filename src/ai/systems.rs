use bevy::prelude::*;

use super::builder::WaypointGraphBuilder;
use super::config::BuilderConfig;
use super::graph::{GraphStats, WaypointGraph};
use super::registry::CollectionRegistry;

/// Request a rebuild of the [`WaypointGraph`] hierarchy.
#[derive(Message, Debug, Clone, Default)]
pub struct BuildSearchGraph {
    /// Overrides [`BuilderConfig::max_search_levels`] for this build.
    pub max_levels: Option<u32>,
}

/// Sent after a [`BuildSearchGraph`] request has been processed.
#[derive(Message, Debug, Clone)]
pub struct SearchGraphBuilt {
    pub stats: GraphStats,
}

pub(crate) fn build_search_graph(
    mut requests: MessageReader<BuildSearchGraph>,
    mut built: MessageWriter<SearchGraphBuilt>,
    mut graph: ResMut<WaypointGraph>,
    mut registry: ResMut<CollectionRegistry>,
    config: Res<BuilderConfig>,
) {
    // Several requests in one frame collapse into a single rebuild.
    let Some(request) = requests.read().last().cloned() else {
        return;
    };

    let max_levels = request.max_levels.unwrap_or(config.max_search_levels);
    let mut builder = WaypointGraphBuilder::with_config(&mut *registry, &mut *graph, config.clone());
    let stats = builder.create_search_graph(max_levels);
    built.write(SearchGraphBuilt { stats });
}
