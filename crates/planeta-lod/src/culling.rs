//! Horizon and view-frustum tests for node meshes.

use glam::{DMat3, DMat4, DVec3, DVec4};

/// An oriented bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obb {
    pub center: DVec3,
    /// Unit box axes as columns.
    pub axes: DMat3,
    /// Half-size along each axis.
    pub half_extents: DVec3,
}

impl Obb {
    /// Tightest box with the given axes that contains `points`.
    ///
    /// Returns a zero-size box at the origin when `points` is empty.
    pub fn from_points(axes: DMat3, points: impl IntoIterator<Item = DVec3>) -> Self {
        let inverse = axes.transpose();
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for p in points {
            let local = inverse * p;
            min = min.min(local);
            max = max.max(local);
        }
        if min.x > max.x {
            return Self {
                center: DVec3::ZERO,
                axes,
                half_extents: DVec3::ZERO,
            };
        }
        Self {
            center: axes * ((min + max) * 0.5),
            axes,
            half_extents: (max - min) * 0.5,
        }
    }

    /// The same box moved by `offset`.
    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            center: self.center + offset,
            ..*self
        }
    }

    /// Radius of the box's projection onto `normal`.
    fn projected_radius(&self, normal: DVec3) -> f64 {
        self.half_extents.x * normal.dot(self.axes.x_axis).abs()
            + self.half_extents.y * normal.dot(self.axes.y_axis).abs()
            + self.half_extents.z * normal.dot(self.axes.z_axis).abs()
    }
}

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// A double-precision view frustum with inward-pointing planes.
#[derive(Clone, Debug)]
pub struct DFrustum {
    planes: [DVec4; 6],
}

impl DFrustum {
    /// Extract planes from a camera-relative view-projection matrix using the
    /// Griggs-Hartmann method (depth range `[0, 1]`).
    pub fn from_view_projection(vp: &DMat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [DVec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Test a box against the side and near planes.
    ///
    /// The far plane is skipped: scale-space compression pulls every
    /// distant node inside it before rasterization.
    pub fn intersects_obb(&self, obb: &Obb) -> bool {
        self.planes[..FAR].iter().all(|plane| {
            let normal = plane.truncate();
            normal.dot(obb.center) + plane.w >= -obb.projected_radius(normal)
        })
    }

    /// Test a point against all six planes.
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(point) + plane.w >= 0.0)
    }
}

/// Horizon test against the body's reference sphere.
#[derive(Clone, Debug)]
pub struct HorizonTest {
    /// Viewer position relative to the body center.
    viewer: DVec3,
    viewer_distance: f64,
    radius: f64,
    /// Angle at the body center between the viewer and its horizon circle.
    horizon_angle: f64,
}

impl HorizonTest {
    /// Build the test for a viewer at `viewer` (planet space).
    pub fn new(viewer: DVec3, radius: f64) -> Self {
        let viewer_distance = viewer.length();
        let horizon_angle = if viewer_distance > radius {
            (radius / viewer_distance).acos()
        } else {
            0.0
        };
        Self {
            viewer,
            viewer_distance,
            radius,
            horizon_angle,
        }
    }

    /// `true` when the viewer is at or below the reference sphere, where the
    /// test cannot reject anything.
    pub fn is_inside(&self) -> bool {
        self.viewer_distance <= self.radius
    }

    /// Whether `point` can be seen over the reference sphere.
    ///
    /// A point raised above the sphere extends its own horizon, so the
    /// allowed angle is the sum of both tangent angles.
    pub fn is_point_visible(&self, point: DVec3) -> bool {
        if self.is_inside() {
            return true;
        }
        let distance = point.length();
        if distance < 1e-10 {
            return true;
        }
        let point_angle = if distance > self.radius {
            (self.radius / distance).acos()
        } else {
            0.0
        };
        let cos_angle = (point.dot(self.viewer) / (distance * self.viewer_distance))
            .clamp(-1.0, 1.0);
        cos_angle.acos() < self.horizon_angle + point_angle
    }

    /// Whether any of `samples` is above the horizon.
    pub fn any_visible(&self, samples: &[DVec3]) -> bool {
        self.is_inside() || samples.iter().any(|&s| self.is_point_visible(s))
    }
}
