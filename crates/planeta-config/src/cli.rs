//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// planeta command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "planeta", about = "Cube-sphere LOD terrain demo")]
pub struct CliArgs {
    /// Planet radius in meters.
    #[arg(long)]
    pub radius: Option<f64>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Grid cells per node edge.
    #[arg(long)]
    pub grid_resolution: Option<u32>,

    /// Split distance multiplier.
    #[arg(long)]
    pub split_factor: Option<f64>,

    /// Ocean level as a fraction of terrain height.
    #[arg(long)]
    pub ocean_level: Option<f64>,

    /// Mesh generation worker threads (0 = auto).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Number of frames to simulate.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for JSON log files in debug builds.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(radius) = args.radius {
            self.terrain.radius_m = radius;
        }
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(grid) = args.grid_resolution {
            self.terrain.grid_resolution = grid;
        }
        if let Some(factor) = args.split_factor {
            self.terrain.split_distance_factor = factor;
        }
        if let Some(level) = args.ocean_level {
            self.terrain.ocean_level = Some(level);
        }
        if let Some(workers) = args.workers {
            self.scheduler.worker_threads = workers;
        }
        if let Some(frames) = args.frames {
            self.debug.frames = frames;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            radius: Some(1000.0),
            ocean_level: Some(0.4),
            workers: Some(2),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.terrain.radius_m, 1000.0);
        assert_eq!(config.terrain.ocean_level, Some(0.4));
        assert_eq!(config.scheduler.worker_threads, 2);
        // Non-overridden fields retain defaults
        assert_eq!(config.terrain.grid_resolution, 16);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "planeta",
            "--seed",
            "7",
            "--split-factor",
            "2.5",
            "--frames",
            "30",
        ])
        .unwrap();
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.split_factor, Some(2.5));
        assert_eq!(args.frames, Some(30));
        assert!(args.config.is_none());
    }
}
