//! Placement of a node on the cube and its projected sample points.

use std::f64::consts::SQRT_2;

use glam::{DMat3, DVec3};
use planeta_cubesphere::{FaceCoord, face_coord_to_cube_point, face_coord_to_sphere};
use planeta_terrain::HeightField;

use crate::node_id::NodeKey;

/// Edge length of a face root in cube space for a body of `radius`.
///
/// The cube is scaled so that its half-extent is `radius / sqrt(2)`.
pub fn root_size(radius: f64) -> f64 {
    SQRT_2 * radius
}

/// Immutable geometric description of one node.
///
/// Everything a worker needs to build the node's mesh. Positions are in
/// planet space: relative to the body center, in the body's axes.
#[derive(Clone, Debug)]
pub struct NodeGeometry {
    pub key: NodeKey,
    /// Grid cells per edge.
    pub resolution: u32,
    /// Edge length in cube space.
    pub size: f64,
    /// Center of the node on the (scaled) cube, before projection.
    pub cube_position: DVec3,
    /// Maps local grid axes `(x, y, z)` onto the face's `(right, normal, forward)`.
    pub orientation: DMat3,
    /// Surface point under the node center; mesh vertices are stored relative to it.
    pub mesh_center: DVec3,
    /// Surface points at grid coordinates `{0, G/2, G}^2`, row-major in z.
    pub samples: [DVec3; 9],
}

impl NodeGeometry {
    /// Describe `key` on a body sampled from `field`.
    pub fn new(key: NodeKey, resolution: u32, field: &dyn HeightField) -> Self {
        let depth = key.id.depth();
        let root = root_size(field.radius());
        let size = root / (1u64 << depth) as f64;

        let mut geometry = Self {
            key,
            resolution,
            size,
            cube_position: DVec3::ZERO,
            orientation: key.face.orientation(),
            mesh_center: DVec3::ZERO,
            samples: [DVec3::ZERO; 9],
        };

        let half = i64::from(resolution / 2);
        geometry.cube_position =
            face_coord_to_cube_point(&geometry.face_coord(half, half)) * (root * 0.5);

        let steps = [0, half, i64::from(resolution)];
        for (row, &z) in steps.iter().enumerate() {
            for (col, &x) in steps.iter().enumerate() {
                geometry.samples[row * 3 + col] = geometry.lattice_point(x, z, field);
            }
        }
        geometry.mesh_center = geometry.samples[4];
        geometry
    }

    /// Distance between adjacent grid vertices in cube space.
    pub fn vertex_spacing(&self) -> f64 {
        self.size / f64::from(self.resolution)
    }

    /// Face coordinate of grid point `(x, z)`.
    ///
    /// Coordinates are exact dyadic fractions, so a lattice point shared by
    /// two nodes of any depths yields the same bits from either node. Points
    /// one step past the grid edge are allowed (used for normals).
    pub fn face_coord(&self, x: i64, z: i64) -> FaceCoord {
        let (i, j) = self.key.id.cell();
        let g = i64::from(self.resolution);
        let denominator = (g << self.key.id.depth()) as f64;
        let u = (i as i64 * g + x) as f64 / denominator;
        let v = (j as i64 * g + z) as f64 / denominator;
        FaceCoord::new_unchecked(self.key.face, u, v)
    }

    /// Unit direction from the body center through grid point `(x, z)`.
    pub fn lattice_direction(&self, x: i64, z: i64) -> DVec3 {
        face_coord_to_sphere(&self.face_coord(x, z))
    }

    /// Displaced surface point at grid point `(x, z)`.
    pub fn lattice_point(&self, x: i64, z: i64, field: &dyn HeightField) -> DVec3 {
        let direction = self.lattice_direction(x, z);
        direction * field.height(direction)
    }

    /// Sample closest to `position`, with its distance.
    pub fn closest_sample(&self, position: DVec3) -> (DVec3, f64) {
        let mut best = self.samples[0];
        let mut best_sq = best.distance_squared(position);
        for sample in &self.samples[1..] {
            let d = sample.distance_squared(position);
            if d < best_sq {
                best_sq = d;
                best = *sample;
            }
        }
        (best, best_sq.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_id::NodeId;
    use planeta_cubesphere::CubeFace;
    use planeta_terrain::SphereField;

    struct Bumpy;

    impl HeightField for Bumpy {
        fn radius(&self) -> f64 {
            1000.0
        }
        fn terrain_height(&self) -> f64 {
            10.0
        }
        fn height(&self, d: DVec3) -> f64 {
            1000.0 + 5.0 * (d.x * 13.0).sin() * (d.z * 7.0).cos()
        }
    }

    #[test]
    fn test_root_geometry() {
        let field = SphereField::new(1000.0);
        let geometry = NodeGeometry::new(NodeKey::root(CubeFace::PosY), 16, &field);
        assert!((geometry.size - 1000.0 * SQRT_2).abs() < 1e-9);
        assert!((geometry.vertex_spacing() - 1000.0 * SQRT_2 / 16.0).abs() < 1e-9);
        assert!(
            (geometry.cube_position - DVec3::Y * 1000.0 / SQRT_2).length() < 1e-9,
            "root cube position {:?}",
            geometry.cube_position
        );
        assert!((geometry.mesh_center - DVec3::Y * 1000.0).length() < 1e-9);
        for s in geometry.samples {
            assert!((s.length() - 1000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_children_halve_size_and_share_orientation() {
        let field = SphereField::new(500.0);
        let root = NodeGeometry::new(NodeKey::root(CubeFace::NegX), 8, &field);
        for child_id in NodeId::ROOT.children().unwrap() {
            let child = NodeGeometry::new(NodeKey::new(CubeFace::NegX, child_id), 8, &field);
            assert_eq!(child.size, root.size / 2.0);
            assert_eq!(child.orientation, root.orientation);
            let offset = child.cube_position - root.cube_position;
            assert!(
                (offset.length() - root.size * SQRT_2 / 4.0).abs() < 1e-9,
                "child {child_id:?} is not centered in its quadrant"
            );
        }
    }

    #[test]
    fn test_sibling_zero_sits_at_minus_right_plus_forward() {
        let field = SphereField::new(1000.0);
        let face = CubeFace::PosZ;
        let root = NodeGeometry::new(NodeKey::root(face), 16, &field);
        let child = NodeGeometry::new(
            NodeKey::new(face, NodeId::ROOT.child(0).unwrap()),
            16,
            &field,
        );
        let offset = child.cube_position - root.cube_position;
        assert!(offset.dot(face.right()) < 0.0);
        assert!(offset.dot(face.forward()) > 0.0);
        assert!(offset.dot(face.normal()).abs() < 1e-9);
    }

    #[test]
    fn test_shared_edge_points_are_bit_identical_across_levels() {
        let field = Bumpy;
        let face = CubeFace::PosX;
        let g = 16;
        // Coarse node at depth 1, cell (0, 1); fine node at depth 2, cell (2, 3),
        // touching the coarse node's +x edge.
        let coarse_id = NodeId::ROOT.child(0).unwrap();
        let fine_id = NodeId::ROOT.child(1).unwrap().child(0).unwrap();
        assert_eq!(coarse_id.cell(), (0, 1));
        assert_eq!(fine_id.cell(), (2, 3));

        let coarse = NodeGeometry::new(NodeKey::new(face, coarse_id), g, &field);
        let fine = NodeGeometry::new(NodeKey::new(face, fine_id), g, &field);
        let gi = i64::from(g);
        for k in 0..=gi / 2 {
            let from_fine = fine.lattice_point(0, 2 * k, &field);
            let from_coarse = coarse.lattice_point(gi, gi / 2 + k, &field);
            assert_eq!(
                from_fine, from_coarse,
                "edge vertex {k} differs between levels"
            );
        }
    }

    #[test]
    fn test_closest_sample() {
        let field = SphereField::new(1000.0);
        let geometry = NodeGeometry::new(NodeKey::root(CubeFace::PosY), 16, &field);
        let (closest, distance) = geometry.closest_sample(DVec3::Y * 3000.0);
        assert_eq!(closest, geometry.samples[4]);
        assert!((distance - 2000.0).abs() < 1e-9);
    }
}
