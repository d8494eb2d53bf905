//! Builds the planet from a loaded [`Config`].

use std::sync::Arc;

use planeta_config::Config;
use planeta_lod::{LodSettings, QuadForest, SchedulerSettings, SettingsError};
use planeta_terrain::{HeightField, NoiseField, NoiseFieldParams};

/// LOD settings for the configured body.
pub fn lod_settings(config: &Config) -> LodSettings {
    let terrain = &config.terrain;
    LodSettings {
        grid_resolution: terrain.grid_resolution,
        min_vertex_spacing: terrain.min_vertex_spacing_m,
        max_vertex_spacing: terrain.max_vertex_spacing(),
        split_distance_factor: terrain.split_distance_factor,
        merge_hysteresis: terrain.merge_hysteresis,
        ocean_level: terrain.ocean_level,
    }
}

/// Scheduler settings, resolving `worker_threads = 0` to the core count.
pub fn scheduler_settings(config: &Config) -> SchedulerSettings {
    let worker_threads = match config.scheduler.worker_threads {
        0 => SchedulerSettings::default_worker_threads(),
        n => n,
    };
    SchedulerSettings {
        max_in_flight: config.scheduler.max_in_flight,
        worker_threads,
    }
}

pub fn height_field(config: &Config) -> Arc<dyn HeightField> {
    Arc::new(NoiseField::new(NoiseFieldParams {
        radius: config.terrain.radius_m,
        terrain_height: config.terrain.terrain_height_m,
        seed: config.terrain.seed,
        ..NoiseFieldParams::default()
    }))
}

/// The six-face forest for `config`.
pub fn build_forest(config: &Config) -> Result<QuadForest, SettingsError> {
    QuadForest::new(
        lod_settings(config),
        scheduler_settings(config),
        height_field(config),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_gives_valid_settings() {
        let config = Config::default();
        let settings = lod_settings(&config);
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(
            settings.max_vertex_spacing,
            config.terrain.radius_m * 0.5 / 16.0,
            "auto max spacing"
        );
    }

    #[test]
    fn test_auto_worker_threads() {
        let config = Config::default();
        let scheduler = scheduler_settings(&config);
        assert!(scheduler.worker_threads >= 1, "0 resolves to at least one worker");

        let mut config = Config::default();
        config.scheduler.worker_threads = 3;
        assert_eq!(scheduler_settings(&config).worker_threads, 3);
    }

    #[test]
    fn test_invalid_grid_resolution_rejected() {
        let mut config = Config::default();
        config.terrain.grid_resolution = 12;
        config.scheduler.worker_threads = 1;
        assert!(
            matches!(build_forest(&config), Err(SettingsError::GridResolution(12))),
            "non power of two grid must fail"
        );
    }

    #[test]
    fn test_height_field_matches_config() {
        let mut config = Config::default();
        config.terrain.radius_m = 1234.0;
        config.terrain.terrain_height_m = 56.0;
        let field = height_field(&config);
        assert_eq!(field.radius(), 1234.0);
        assert_eq!(field.terrain_height(), 56.0);
    }
}
