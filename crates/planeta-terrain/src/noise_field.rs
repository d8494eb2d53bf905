//! Procedural planet surface: rolling hills, ridged mountains and a
//! temperature/humidity climate pair.

use glam::DVec3;

use crate::fbm::{FbmParams, FbmSampler};
use crate::field::{HeightField, SurfaceSample};

/// Parameters for [`NoiseField`].
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseFieldParams {
    /// Radius of the undisplaced sphere in meters.
    pub radius: f64,
    /// Maximum surface displacement above `radius` in meters.
    pub terrain_height: f64,
    /// World seed. Each noise layer derives its own seed from it.
    pub seed: u32,
    /// Share of `terrain_height` given to the hill layer; mountains get the rest.
    pub hill_weight: f64,
}

impl Default for NoiseFieldParams {
    fn default() -> Self {
        Self {
            radius: 600_000.0,
            terrain_height: 8_000.0,
            seed: 0,
            hill_weight: 0.4,
        }
    }
}

/// Height field built from layered fBm noise.
///
/// `height(dir) = radius + (hills + mountains) * terrain_height`, where both
/// layers are non-negative and sum to at most one.
pub struct NoiseField {
    params: NoiseFieldParams,
    hills: FbmSampler,
    mountains: FbmSampler,
    temperature: FbmSampler,
    humidity: FbmSampler,
}

impl NoiseField {
    /// Build the noise layers for `params`.
    pub fn new(params: NoiseFieldParams) -> Self {
        let seed = params.seed;
        let hills = FbmSampler::new(FbmParams {
            seed,
            octaves: 8,
            base_frequency: 3.0,
            persistence: 0.8,
            ..Default::default()
        });
        let mountains = FbmSampler::new(FbmParams {
            seed: seed.wrapping_add(1),
            octaves: 6,
            base_frequency: 1.5,
            persistence: 0.5,
            ..Default::default()
        });
        let temperature = FbmSampler::new(FbmParams {
            seed: seed.wrapping_add(2),
            octaves: 4,
            base_frequency: 1.0,
            ..Default::default()
        });
        let humidity = FbmSampler::new(FbmParams {
            seed: seed.wrapping_add(3),
            octaves: 4,
            base_frequency: 1.0,
            ..Default::default()
        });
        Self {
            params,
            hills,
            mountains,
            temperature,
            humidity,
        }
    }

    /// Parameters this field was built with.
    pub fn params(&self) -> &NoiseFieldParams {
        &self.params
    }

    fn elevation(&self, direction: DVec3) -> f64 {
        let hill_weight = self.params.hill_weight.clamp(0.0, 1.0);
        let hill = 0.5 * (self.hills.sample(direction) + 1.0);
        let ridge = self.mountains.sample_ridged(direction);
        let mountain = (ridge * ridge * ridge).clamp(0.0, 1.0);
        (hill * hill_weight + mountain * (1.0 - hill_weight)).clamp(0.0, 1.0)
    }
}

impl HeightField for NoiseField {
    fn radius(&self) -> f64 {
        self.params.radius
    }

    fn terrain_height(&self) -> f64 {
        self.params.terrain_height
    }

    fn height(&self, direction: DVec3) -> f64 {
        self.params.radius + self.elevation(direction) * self.params.terrain_height
    }

    fn surface_info(&self, direction: DVec3) -> SurfaceSample {
        let elevation = self.elevation(direction);
        // Colder toward the poles and at altitude.
        let latitude = direction.y.abs();
        let base = 0.5 * (self.temperature.sample(direction) + 1.0);
        let temperature = (base * (1.0 - latitude * latitude * latitude) - 0.3 * elevation)
            .clamp(0.0, 1.0);
        let humidity = (0.5 * (self.humidity.sample(direction) + 1.0)).clamp(0.0, 1.0);
        SurfaceSample {
            attributes: [temperature as f32, humidity as f32],
            height: self.params.radius + elevation * self.params.terrain_height,
        }
    }
}
