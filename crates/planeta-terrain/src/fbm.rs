//! Multi-octave fractal Brownian motion over simplex noise.
//!
//! Samples are taken on the unit sphere, so frequencies are expressed in
//! cycles per body radius and the output does not depend on planet size.

use glam::DVec3;
use noise::{NoiseFn, Simplex};

/// Configuration for one fBm layer.
#[derive(Clone, Debug, PartialEq)]
pub struct FbmParams {
    /// Seed for deterministic generation.
    pub seed: u32,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per unit of input.
    pub base_frequency: f64,
}

impl Default for FbmParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 8,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 2.0,
        }
    }
}

/// Composites octaves of 3D simplex noise into a normalized value.
pub struct FbmSampler {
    noise: Simplex,
    params: FbmParams,
    max_amplitude: f64,
}

impl FbmSampler {
    /// Create a new sampler with the given parameters.
    pub fn new(params: FbmParams) -> Self {
        let noise = Simplex::new(params.seed);
        let mut max_amplitude = 0.0;
        let mut amp = 1.0;
        for _ in 0..params.octaves {
            max_amplitude += amp;
            amp *= params.persistence;
        }
        Self {
            noise,
            params,
            max_amplitude,
        }
    }

    /// Plain fBm at `point`, normalized to roughly `[-1, 1]`.
    pub fn sample(&self, point: DVec3) -> f64 {
        self.accumulate(point, |n| n)
    }

    /// Ridged fBm at `point`, normalized to `[0, 1]`.
    ///
    /// Each octave contributes `(1 - |n|)^2`, which produces sharp crests
    /// where the underlying noise crosses zero.
    pub fn sample_ridged(&self, point: DVec3) -> f64 {
        let ridge = |n: f64| {
            let r = 1.0 - n.abs();
            r * r
        };
        self.accumulate(point, ridge).clamp(0.0, 1.0)
    }

    /// Return a reference to the current parameters.
    pub fn params(&self) -> &FbmParams {
        &self.params
    }

    fn accumulate(&self, point: DVec3, shape: impl Fn(f64) -> f64) -> f64 {
        if self.max_amplitude <= 0.0 {
            return 0.0;
        }
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = 1.0;

        for _ in 0..self.params.octaves {
            let p = point * frequency;
            total += shape(self.noise.get([p.x, p.y, p.z])) * amplitude;

            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total / self.max_amplitude
    }
}
