//! Validated tuning parameters for the quadtree and the generation scheduler.

use thiserror::Error;

/// Reasons a [`LodSettings`] or [`SchedulerSettings`] value is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("grid resolution {0} must be a power of two in [2, 128]")]
    GridResolution(u32),
    #[error("minimum vertex spacing must be positive, got {0}")]
    MinVertexSpacing(f64),
    #[error("maximum vertex spacing {max} is below the minimum {min}")]
    MaxVertexSpacing { min: f64, max: f64 },
    #[error("split distance factor must be positive, got {0}")]
    SplitDistanceFactor(f64),
    #[error("merge hysteresis must be non-negative, got {0}")]
    MergeHysteresis(f64),
    #[error("planet radius must be positive, got {0}")]
    Radius(f64),
    #[error("scheduler capacity must be at least 1")]
    ZeroCapacity,
}

/// Parameters of the split/merge policy and mesh layout.
#[derive(Clone, Debug, PartialEq)]
pub struct LodSettings {
    /// Cells per node edge. Each node mesh has `(grid_resolution + 1)^2` vertices.
    pub grid_resolution: u32,
    /// Nodes whose children would be finer than this never split.
    pub min_vertex_spacing: f64,
    /// Nodes coarser than this always split.
    pub max_vertex_spacing: f64,
    /// Multiplier on the node arc size used as the split distance.
    pub split_distance_factor: f64,
    /// Extra fraction of the split distance a viewer must retreat before a
    /// split node merges again. Zero merges as soon as the split test fails.
    pub merge_hysteresis: f64,
    /// Relative ocean level in units of terrain height. `None` disables the
    /// water surface.
    pub ocean_level: Option<f64>,
}

impl LodSettings {
    /// Default grid resolution.
    pub const DEFAULT_GRID_RESOLUTION: u32 = 16;

    /// Defaults for a body of the given radius.
    ///
    /// The maximum spacing is half the radius spread over one grid edge,
    /// which forces the six roots to split at least once.
    pub fn for_radius(radius: f64) -> Self {
        let grid_resolution = Self::DEFAULT_GRID_RESOLUTION;
        Self {
            grid_resolution,
            min_vertex_spacing: 1.0,
            max_vertex_spacing: radius * 0.5 / grid_resolution as f64,
            split_distance_factor: 1.0,
            merge_hysteresis: 0.0,
            ocean_level: None,
        }
    }

    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let g = self.grid_resolution;
        if !(2..=128).contains(&g) || !g.is_power_of_two() {
            return Err(SettingsError::GridResolution(g));
        }
        if !(self.min_vertex_spacing > 0.0) {
            return Err(SettingsError::MinVertexSpacing(self.min_vertex_spacing));
        }
        if !(self.max_vertex_spacing >= self.min_vertex_spacing) {
            return Err(SettingsError::MaxVertexSpacing {
                min: self.min_vertex_spacing,
                max: self.max_vertex_spacing,
            });
        }
        if !(self.split_distance_factor > 0.0) {
            return Err(SettingsError::SplitDistanceFactor(
                self.split_distance_factor,
            ));
        }
        if !(self.merge_hysteresis >= 0.0) {
            return Err(SettingsError::MergeHysteresis(self.merge_hysteresis));
        }
        Ok(())
    }

    /// Number of vertices in one node mesh.
    pub fn vertices_per_node(&self) -> usize {
        let side = self.grid_resolution as usize + 1;
        side * side
    }
}

/// Sizing of the generation scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Maximum number of generation jobs dispatched at once.
    pub max_in_flight: usize,
    /// Worker threads in the pool. Zero runs generation inline inside
    /// [`tick`](crate::GenerationScheduler::tick).
    pub worker_threads: usize,
}

impl SchedulerSettings {
    /// Default in-flight cap.
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

    /// Settings that complete every dispatched job synchronously.
    pub fn inline() -> Self {
        Self {
            max_in_flight: Self::DEFAULT_MAX_IN_FLIGHT,
            worker_threads: 0,
        }
    }

    /// One worker per core, leaving two cores for the main and render threads.
    pub fn default_worker_threads() -> usize {
        let cpus = num_cpus::get().max(2);
        (cpus - 2).max(1)
    }

    /// Reject a zero capacity.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_in_flight == 0 {
            return Err(SettingsError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_in_flight: Self::DEFAULT_MAX_IN_FLIGHT,
            worker_threads: Self::default_worker_threads(),
        }
    }
}
