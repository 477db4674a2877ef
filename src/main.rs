use bevy::log::{error, info, warn};
use clap::Parser;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waypoint_hierarchy::ai::config::DEFAULT_CONFIG_PATH;
use waypoint_hierarchy::ai::waypoint_file::{load_mesh_description, save_waypoint_file, WaypointFileError};
use waypoint_hierarchy::ai::{BuilderConfig, CollectionRegistry, WaypointGraph, WaypointGraphBuilder};

/// Build the search hierarchy for a waypoint mesh.
#[derive(Parser, Debug)]
#[command(name = "waypoint_build", version, about)]
struct Args {
    /// RON mesh description (waypoints and edges)
    mesh: PathBuf,

    /// Builder config (RON); defaults are used if it cannot be read
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured maximum number of search levels
    #[arg(long)]
    max_levels: Option<u32>,

    /// Write the finished graph as a compressed waypoint file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory for per-run log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Number of run logs to keep in the log directory
    #[arg(long, default_value_t = 25)]
    keep_logs: usize,

    /// Log debug output, including hierarchical search fallbacks
    #[arg(short, long)]
    verbose: bool,
}

/// One timestamped log file per run, pruned to the newest `keep` files.
struct LogDir {
    dir: PathBuf,
    keep: usize,
}

impl LogDir {
    const PREFIX: &'static str = "waypoint_build_";

    fn new(dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self { dir: dir.into(), keep: keep.max(1) }
    }

    /// Run logs already in the directory, oldest first.
    fn run_logs(&self) -> io::Result<Vec<PathBuf>> {
        let mut logs: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(Self::PREFIX) && n.ends_with(".log"))
            })
            .collect();
        // The timestamp in the name sorts chronologically.
        logs.sort();
        Ok(logs)
    }

    /// Make room for one more run log. Returns how many were removed.
    fn prune(&self) -> io::Result<usize> {
        let logs = self.run_logs()?;
        let excess = (logs.len() + 1).saturating_sub(self.keep).min(logs.len());
        for path in &logs[..excess] {
            fs::remove_file(path)?;
        }
        Ok(excess)
    }

    /// Route `tracing` output to a fresh run log and stderr.
    fn install(&self, verbose: bool) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let pruned = self.prune()?;

        let file_name = format!("{}{}.log", Self::PREFIX, chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let appender = RollingFileAppender::new(Rotation::NEVER, &self.dir, &file_name);

        let default_filter = if verbose {
            "waypoint_hierarchy=debug,waypoint_build=debug"
        } else {
            "waypoint_hierarchy=info,waypoint_build=info"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(appender).with_ansi(false))
            .with(fmt::layer().with_writer(io::stderr).with_target(false))
            .init();

        if pruned > 0 {
            info!("Removed {} old run logs from {}", pruned, self.dir.display());
        }
        Ok(self.dir.join(file_name))
    }
}

fn run(args: &Args) -> Result<(), WaypointFileError> {
    let config = BuilderConfig::load_or_default(&args.config);
    let max_levels = args.max_levels.unwrap_or(config.max_search_levels);

    let mesh = load_mesh_description(&args.mesh)?;
    let mut graph = WaypointGraph::new();
    mesh.populate(&mut graph)?;

    let mut registry = CollectionRegistry::default();
    let stats = WaypointGraphBuilder::with_config(&mut registry, &mut graph, config).create_search_graph(max_levels);

    for (level, count) in stats.nodes_per_level.iter().enumerate() {
        info!("  level {}: {} nodes", level, count);
    }

    if stats.unparented_count > 0 {
        warn!("{} nodes were left without a parent:", stats.unparented_count);
        let levels = graph.search_levels();
        for level in levels.iter().take(levels.len().saturating_sub(1)) {
            for &id in &level.nodes {
                if graph.get_parent(id).is_none() {
                    if let Some(node) = graph.node(id) {
                        warn!("  level {}: {}", level.level_num, node);
                    }
                }
            }
        }
    }

    if let Some(output) = &args.output {
        save_waypoint_file(output, &graph)?;
        info!("Saved waypoint file to {}", output.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_dir = LogDir::new(&args.log_dir, args.keep_logs);
    let log_file = match log_dir.install(args.verbose) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Failed to set up logging in {}: {}", args.log_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };
    info!("Logging to {}", log_file.display());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("waypoint_build failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_newest_run_logs() {
        let dir = std::env::temp_dir().join(format!("waypoint_build_logs_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create log dir");
        for stamp in ["20240101_000000", "20240102_000000", "20240103_000000"] {
            fs::write(dir.join(format!("waypoint_build_{stamp}.log")), "").expect("write log");
        }
        fs::write(dir.join("notes.txt"), "").expect("write other file");

        let log_dir = LogDir::new(&dir, 2);
        let removed = log_dir.prune().expect("prune");
        let remaining = log_dir.run_logs().expect("list logs");
        let other_kept = dir.join("notes.txt").exists();
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(removed, 2);
        assert_eq!(remaining, vec![dir.join("waypoint_build_20240103_000000.log")]);
        assert!(other_kept);
    }
}
