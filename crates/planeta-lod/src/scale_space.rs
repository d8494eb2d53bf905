//! Camera-relative distance compression for rendering at planetary scale.
//!
//! Positions within `threshold` of the camera pass through untouched.
//! Beyond it, distance `d` is mapped to
//! `threshold + (max_range - threshold) * (1 - exp(-(d - threshold) / falloff))`,
//! which grows monotonically and never reaches `max_range`. Objects are
//! scaled by the same ratio so their apparent size is preserved.

use glam::DVec3;

/// Parameters of the compression curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleSpace {
    /// Distance below which positions are not compressed.
    pub threshold: f64,
    /// Asymptotic upper bound of compressed distances.
    pub max_range: f64,
    /// Distance scale of the exponential approach.
    pub falloff: f64,
}

/// A position remapped into scaled camera-relative space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaledPosition {
    pub position: DVec3,
    /// Factor to apply to the object's size.
    pub scale: f64,
}

impl ScaleSpace {
    /// Curve for a camera with the given far plane and vertical field of view.
    ///
    /// `max_range` is the far-plane distance shortened by the view cone
    /// (`far * (1 - cos(fov / 2))`); compression starts at half of it and the
    /// falloff spans the remaining half.
    pub fn for_camera(far_plane: f64, fov_y: f64) -> Self {
        let max_range = far_plane * (1.0 - (fov_y * 0.5).cos());
        let threshold = max_range * 0.5;
        Self {
            threshold,
            max_range,
            falloff: max_range - threshold,
        }
    }

    /// Compressed distance for a true distance.
    pub fn compress(&self, distance: f64) -> f64 {
        if distance <= self.threshold {
            return distance;
        }
        let span = self.max_range - self.threshold;
        let t = 1.0 - (-(distance - self.threshold) / self.falloff).exp();
        // `t` rounds to 1 for huge distances; keep the bound strict.
        (self.threshold + span * t).min(self.max_range * (1.0 - 1e-12))
    }

    /// Remap `target` as seen from `camera`, both in world space.
    pub fn apply(&self, camera: DVec3, target: DVec3) -> ScaledPosition {
        self.apply_relative(target - camera)
    }

    /// Remap a camera-relative offset.
    pub fn apply_relative(&self, offset: DVec3) -> ScaledPosition {
        // Normalize by the largest component first; `length()` overflows
        // past ~1e154.
        let largest = offset.abs().max_element();
        if largest == 0.0 {
            return ScaledPosition {
                position: offset,
                scale: 1.0,
            };
        }
        let reduced = offset / largest;
        let distance = reduced.length() * largest;
        if distance <= self.threshold {
            return ScaledPosition {
                position: offset,
                scale: 1.0,
            };
        }
        let compressed = self.compress(distance);
        ScaledPosition {
            position: reduced.normalize() * compressed,
            scale: compressed / distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ScaleSpace {
        ScaleSpace {
            threshold: 1_000.0,
            max_range: 10_000.0,
            falloff: 9_000.0,
        }
    }

    #[test]
    fn test_identity_below_threshold() {
        let camera = DVec3::new(5.0, -3.0, 2.0);
        let target = camera + DVec3::new(300.0, 400.0, 0.0);
        let scaled = space().apply(camera, target);
        assert_eq!(scaled.scale, 1.0);
        assert_eq!(scaled.position, target - camera);
    }

    #[test]
    fn test_far_positions_stay_below_max_range() {
        let s = space();
        for distance in [1_001.0, 5_000.0, 1.0e6, 1.0e12, 1.0e300] {
            let scaled = s.apply_relative(DVec3::X * distance);
            let d = scaled.position.length();
            assert!(
                d < s.max_range,
                "distance {distance} compressed to {d}, at or past {}",
                s.max_range
            );
            assert!(d >= s.threshold, "distance {distance} collapsed to {d}");
            assert!(
                scaled.scale > 0.0 && scaled.scale < 1.0,
                "distance {distance} gave scale {}",
                scaled.scale
            );
        }
    }

    #[test]
    fn test_huge_diagonal_offset_keeps_direction() {
        let s = space();
        let offset = DVec3::new(1.0e200, -1.0e200, 1.0e200);
        let scaled = s.apply_relative(offset);
        let d = scaled.position.length();
        assert!(d >= s.threshold && d < s.max_range, "compressed to {d}");
        let dir = scaled.position / d;
        let expected = DVec3::new(1.0, -1.0, 1.0).normalize();
        assert!((dir - expected).length() < 1e-12, "direction drifted to {dir:?}");
        assert!(scaled.scale > 0.0, "scale underflowed");
    }

    #[test]
    fn test_compression_is_monotonic_and_keeps_direction() {
        let s = space();
        let mut last = 0.0;
        for i in 0..100 {
            let d = s.compress(i as f64 * 250.0);
            assert!(d >= last, "compression is not monotonic at step {i}");
            last = d;
        }
        let dir = DVec3::new(1.0, 2.0, -2.0).normalize();
        let scaled = s.apply_relative(dir * 50_000.0);
        assert!((scaled.position.normalize() - dir).length() < 1e-12);
        assert!((scaled.scale - scaled.position.length() / 50_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_curve_is_continuous_at_threshold() {
        let s = space();
        let below = s.compress(s.threshold);
        let above = s.compress(s.threshold + 1e-6);
        assert!((above - below).abs() < 1e-5);
    }

    #[test]
    fn test_for_camera() {
        let s = ScaleSpace::for_camera(1.0e7, std::f64::consts::FRAC_PI_2);
        let expected = 1.0e7 * (1.0 - std::f64::consts::FRAC_PI_4.cos());
        assert!((s.max_range - expected).abs() < 1e-6);
        assert_eq!(s.threshold, s.max_range * 0.5);
    }
}
