//! Cube-to-sphere projection by normalization.

use glam::DVec3;

use crate::FaceCoord;

/// Convert a [`FaceCoord`] to a point on the surface of the `[-1, 1]` cube.
///
/// The face center `(u=0.5, v=0.5)` maps to the face normal vector. For
/// dyadic `u`/`v` this is exact, so the same lattice point evaluated from
/// two different patches yields bit-identical cube points.
#[inline]
#[must_use]
pub fn face_coord_to_cube_point(fc: &FaceCoord) -> DVec3 {
    let s = 2.0 * fc.u - 1.0;
    let t = 2.0 * fc.v - 1.0;

    fc.face.normal() + s * fc.face.right() + t * fc.face.forward()
}

/// Project a cube-space point onto the unit sphere.
#[inline]
#[must_use]
pub fn cube_to_sphere(cube_point: DVec3) -> DVec3 {
    cube_point.normalize()
}

/// Project a [`FaceCoord`] onto the unit sphere.
#[inline]
#[must_use]
pub fn face_coord_to_sphere(fc: &FaceCoord) -> DVec3 {
    cube_to_sphere(face_coord_to_cube_point(fc))
}
