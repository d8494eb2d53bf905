//! The height field seam and a constant-radius implementation.

use glam::DVec3;

/// Result of a combined surface query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    /// Free-form per-vertex surface attributes (e.g. temperature, humidity).
    pub attributes: [f32; 2],
    /// Radial distance of the surface from the body center.
    pub height: f64,
}

/// A deterministic, side-effect-free height/attribute field over a sphere.
///
/// Implementations are shared read-only with mesh generation workers, so
/// they must be `Send + Sync`. Non-finite heights are passed through to the
/// mesher unchanged.
pub trait HeightField: Send + Sync {
    /// Radius of the undisplaced reference sphere.
    fn radius(&self) -> f64;

    /// Maximum displacement of the surface above [`radius`](Self::radius).
    fn terrain_height(&self) -> f64;

    /// Radial distance of the surface from the body center along `direction`.
    ///
    /// `direction` must be unit length.
    fn height(&self, direction: DVec3) -> f64;

    /// Height plus surface attributes in one evaluation.
    fn surface_info(&self, direction: DVec3) -> SurfaceSample {
        SurfaceSample {
            attributes: [0.0; 2],
            height: self.height(direction),
        }
    }
}

/// A perfectly smooth sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereField {
    /// Sphere radius.
    pub radius: f64,
}

impl SphereField {
    /// Create a sphere of the given radius.
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl HeightField for SphereField {
    fn radius(&self) -> f64 {
        self.radius
    }

    fn terrain_height(&self) -> f64 {
        0.0
    }

    fn height(&self, _direction: DVec3) -> f64 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_field_is_constant() {
        let field = SphereField::new(1234.5);
        for dir in [DVec3::X, DVec3::NEG_Y, DVec3::new(1.0, 1.0, 1.0).normalize()] {
            assert_eq!(field.height(dir), 1234.5);
            let info = field.surface_info(dir);
            assert_eq!(info.height, 1234.5);
            assert_eq!(info.attributes, [0.0, 0.0]);
        }
    }

    #[test]
    fn test_field_is_object_safe() {
        let field: Box<dyn HeightField> = Box::new(SphereField::new(1.0));
        assert_eq!(field.radius(), 1.0);
        assert_eq!(field.terrain_height(), 0.0);
    }
}
