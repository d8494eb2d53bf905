//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Planet body and LOD settings.
    pub terrain: TerrainConfig,
    /// Mesh generation scheduling.
    pub scheduler: SchedulerConfig,
    /// Viewer camera.
    pub camera: CameraConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Planet body and LOD configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Radius of the undisplaced sphere in meters.
    pub radius_m: f64,
    /// Maximum terrain displacement above the radius in meters.
    pub terrain_height_m: f64,
    /// World seed for the noise layers.
    pub seed: u32,
    /// Grid cells per node edge (power of two).
    pub grid_resolution: u32,
    /// Finest allowed distance between adjacent vertices.
    pub min_vertex_spacing_m: f64,
    /// Coarsest allowed distance between adjacent vertices. `0` picks
    /// `radius_m * 0.5 / grid_resolution`.
    pub max_vertex_spacing_m: f64,
    /// Multiplier on the split distance.
    pub split_distance_factor: f64,
    /// Fractional band between split and merge distance.
    pub merge_hysteresis: f64,
    /// Ocean level as a fraction of `terrain_height_m`. `None` disables water.
    pub ocean_level: Option<f64>,
}

impl TerrainConfig {
    /// `max_vertex_spacing_m`, resolving `0` to the radius-derived default.
    pub fn max_vertex_spacing(&self) -> f64 {
        if self.max_vertex_spacing_m > 0.0 {
            self.max_vertex_spacing_m
        } else {
            self.radius_m * 0.5 / self.grid_resolution.max(1) as f64
        }
    }
}

/// Generation scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of mesh generations running at once.
    pub max_in_flight: usize,
    /// Worker threads. `0` means one per core minus two, at least one.
    pub worker_threads: usize,
}

/// Viewer camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Far clip plane distance in meters.
    pub far_plane_m: f64,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f64,
    /// Starting altitude above the surface in meters.
    pub start_altitude_m: f64,
    /// Tangential flight speed in meters per second.
    pub speed_m_s: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Number of frames the demo simulates.
    pub frames: u32,
}

// --- Default implementations ---

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            radius_m: 600_000.0,
            terrain_height_m: 8_000.0,
            seed: 0,
            grid_resolution: 16,
            min_vertex_spacing_m: 1.0,
            max_vertex_spacing_m: 0.0,
            split_distance_factor: 1.0,
            merge_hysteresis: 0.0,
            ocean_level: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 10,
            worker_threads: 0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            far_plane_m: 10_000_000.0,
            fov_y_deg: 60.0,
            start_altitude_m: 2_000_000.0,
            speed_m_s: 250.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frames: 600,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Per-user config directory (`<platform config dir>/planeta`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("planeta"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
