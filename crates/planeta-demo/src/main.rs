//! Headless planet LOD demo.
//!
//! Builds a noise-displaced planet, flies a camera from orbit down to the
//! surface and logs quadtree statistics while draw calls are recorded by a
//! software graphics context. Configuration is loaded from `config.ron` and
//! can be overridden via CLI flags, e.g.
//! `cargo run -p planeta-demo -- --frames 300 --ocean-level 0.3`.

mod flight;
mod setup;

use std::path::PathBuf;

use clap::Parser;
use planeta_config::{CliArgs, Config};
use planeta_lod::{DrawParams, ForestStats, RecordingContext, SettingsError, SurfacePass};
use tracing::{info, warn};

use crate::flight::FlightPath;

/// Frames between statistics lines.
const REPORT_INTERVAL: u32 = 30;

/// Upper bound on frames spent waiting for generation after the flight ends.
const SETTLE_FRAMES: u32 = 600;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("invalid LOD settings: {0}")]
    Settings(#[from] SettingsError),
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(|| Config::default_dir().ok())
        .unwrap_or_else(|| PathBuf::from("planeta-config"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = args.log_dir.clone().unwrap_or_else(|| config_dir.join("logs"));
    planeta_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(err) = run(&config) {
        tracing::error!(error = %err, "demo aborted");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), DemoError> {
    let mut forest = setup::build_forest(config)?;
    let mut gfx = RecordingContext::new();

    let radius = config.terrain.radius_m;
    let frames = config.debug.frames;
    let path = FlightPath::new(radius, config.terrain.terrain_height_m, &config.camera, frames);
    let scale_space = flight::scale_space(&config.camera);
    let water = config.terrain.ocean_level.is_some();

    info!(
        radius,
        frames,
        max_in_flight = forest.scheduler().capacity(),
        water,
        "starting descent"
    );

    let mut frame = 0;
    let mut settle = 0;
    loop {
        let pose = path.pose(frame);
        forest.update_lod(pose.position);
        forest.tick();

        let params = DrawParams {
            camera_position: pose.position,
            view_projection: pose.view_projection(&config.camera),
            scale_space,
        };
        let terrain = forest.draw(&mut gfx, &params, SurfacePass::Terrain);
        if water {
            forest.draw(&mut gfx, &params, SurfacePass::Water);
        }
        if terrain.upload_failures > 0 {
            warn!(frame, failures = terrain.upload_failures, "mesh uploads failed");
        }
        let draws = gfx.take_draws().len();

        if frame % REPORT_INTERVAL == 0 {
            report(frame, pose.altitude, &forest.stats(), draws);
        }

        if frame >= frames {
            let stats = forest.stats();
            if is_settled(&stats) || settle >= SETTLE_FRAMES {
                report(frame, pose.altitude, &stats, draws);
                break;
            }
            settle += 1;
        }
        frame += 1;
    }

    forest.dispose(&mut gfx);
    info!(
        created = gfx.created,
        released = gfx.released,
        live = gfx.live_buffers(),
        "graphics resources after dispose"
    );
    Ok(())
}

fn is_settled(stats: &ForestStats) -> bool {
    stats.generating == 0 && stats.pending == 0 && stats.in_flight == 0
}

fn report(frame: u32, altitude: f64, stats: &ForestStats, draws: usize) {
    info!(
        frame,
        altitude = format_args!("{altitude:.0}"),
        nodes = stats.nodes,
        leaves = stats.leaves,
        depth = stats.max_depth,
        ready = stats.ready,
        generating = stats.generating,
        drawn = stats.drawn_nodes,
        vertices = stats.drawn_vertices,
        culled_horizon = stats.culled_horizon,
        culled_frustum = stats.culled_frustum,
        draws,
        "lod"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.terrain.radius_m = 20_000.0;
        config.terrain.terrain_height_m = 200.0;
        config.terrain.min_vertex_spacing_m = 50.0;
        config.terrain.ocean_level = Some(0.3);
        config.scheduler.worker_threads = 2;
        config.camera.start_altitude_m = 60_000.0;
        config.debug.frames = 40;
        config
    }

    #[test]
    fn test_demo_runs_to_completion() {
        let config = small_config();
        assert!(run(&config).is_ok(), "demo should finish with valid settings");
    }

    #[test]
    fn test_demo_rejects_invalid_settings() {
        let mut config = small_config();
        config.terrain.split_distance_factor = 0.0;
        assert!(
            matches!(run(&config), Err(DemoError::Settings(_))),
            "zero split factor must be rejected"
        );
    }

    #[test]
    fn test_settled_requires_idle_scheduler() {
        let idle = ForestStats::default();
        assert!(is_settled(&idle));
        let busy = ForestStats {
            in_flight: 1,
            ..ForestStats::default()
        };
        assert!(!is_settled(&busy));
    }
}
