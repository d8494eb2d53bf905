//! CPU-side mesh generation for one node.
//!
//! Runs on worker threads. Touches nothing but the node's immutable
//! [`NodeGeometry`] and the shared height field, and checks its
//! [`CancelToken`] once per grid row.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::DVec3;
use planeta_terrain::HeightField;

use crate::culling::Obb;
use crate::geometry::NodeGeometry;

/// One terrain vertex, 32 bytes.
///
/// `position` is relative to the node's mesh center and divided by the node
/// size, so every node mesh spans roughly the unit cube.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    /// Planet-space unit normal.
    pub normal: [f32; 3],
    /// Surface attributes from the height field.
    pub attributes: [f32; 2],
}

static_assertions::assert_eq_size!(TerrainVertex, [u8; 32]);

/// One water-surface vertex, 24 bytes. Same position convention as
/// [`TerrainVertex`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct WaterVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

static_assertions::assert_eq_size!(WaterVertex, [u8; 24]);

/// Generated vertex data for one node, waiting for upload.
#[derive(Clone, Debug)]
pub struct MeshData {
    /// `(G + 1)^2` vertices, row-major in z.
    pub vertices: Vec<TerrainVertex>,
    /// Ocean surface over the same grid, present only when some terrain
    /// vertex lies below the ocean level.
    pub water: Option<Vec<WaterVertex>>,
    /// Planet-space bounds of the terrain vertices.
    pub bounds: Obb,
}

/// Result of one generation job.
#[derive(Debug)]
pub enum GenerationOutcome {
    Completed(MeshData),
    /// The job observed its token and stopped; partial output was dropped.
    Cancelled,
}

/// Shared flag telling a running job to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Radial distance of the ocean surface, if the body has one.
pub fn ocean_radius(field: &dyn HeightField, ocean_level: Option<f64>) -> Option<f64> {
    ocean_level.map(|level| field.radius() + field.terrain_height() * level)
}

/// Build the mesh for `geometry`.
///
/// Each vertex needs its own surface point plus the points one step along +z
/// and +x for the normal, so a `(G + 2)^2` grid of displaced points is
/// sampled first. Non-finite heights from the field pass straight through.
pub fn generate_mesh(
    geometry: &NodeGeometry,
    field: &dyn HeightField,
    ocean_level: Option<f64>,
    cancel: &CancelToken,
) -> GenerationOutcome {
    let g = i64::from(geometry.resolution);
    let side = (g + 1) as usize;
    let padded = (g + 2) as usize;

    let mut points = Vec::with_capacity(padded * padded);
    let mut attributes = Vec::with_capacity(side * side);
    for z in 0..=g + 1 {
        if cancel.is_cancelled() {
            return GenerationOutcome::Cancelled;
        }
        for x in 0..=g + 1 {
            let direction = geometry.lattice_direction(x, z);
            if x <= g && z <= g {
                let info = field.surface_info(direction);
                attributes.push(info.attributes);
                points.push(direction * info.height);
            } else {
                points.push(direction * field.height(direction));
            }
        }
    }

    let ocean = ocean_radius(field, ocean_level);
    let inv_size = 1.0 / geometry.size;
    let at = |x: usize, z: usize| points[z * padded + x];

    let mut vertices = Vec::with_capacity(side * side);
    let mut below_ocean = false;
    for z in 0..side {
        if cancel.is_cancelled() {
            return GenerationOutcome::Cancelled;
        }
        for x in 0..side {
            let p1 = at(x, z);
            let p2 = at(x, z + 1);
            let p3 = at(x + 1, z);
            let normal = (p2 - p1)
                .normalize_or_zero()
                .cross((p3 - p1).normalize_or_zero())
                .normalize_or_zero();
            if let Some(level) = ocean {
                below_ocean |= p1.length() < level;
            }
            vertices.push(TerrainVertex {
                position: ((p1 - geometry.mesh_center) * inv_size).as_vec3().to_array(),
                normal: normal.as_vec3().to_array(),
                attributes: attributes[z * side + x],
            });
        }
    }

    let water = match ocean {
        Some(level) if below_ocean => Some(water_vertices(geometry, level)),
        _ => None,
    };

    let bounds = Obb::from_points(
        geometry.orientation,
        (0..side).flat_map(|z| (0..side).map(move |x| (x, z))).map(|(x, z)| at(x, z)),
    );

    GenerationOutcome::Completed(MeshData {
        vertices,
        water,
        bounds,
    })
}

fn water_vertices(geometry: &NodeGeometry, level: f64) -> Vec<WaterVertex> {
    let g = i64::from(geometry.resolution);
    let inv_size = 1.0 / geometry.size;
    let mut out = Vec::with_capacity(((g + 1) * (g + 1)) as usize);
    for z in 0..=g {
        for x in 0..=g {
            let direction: DVec3 = geometry.lattice_direction(x, z);
            out.push(WaterVertex {
                position: ((direction * level - geometry.mesh_center) * inv_size)
                    .as_vec3()
                    .to_array(),
                normal: direction.as_vec3().to_array(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_id::{NodeId, NodeKey};
    use planeta_cubesphere::CubeFace;
    use planeta_terrain::{SphereField, SurfaceSample};

    /// Sphere whose southern hemisphere dips below the ocean.
    struct Basin;

    impl HeightField for Basin {
        fn radius(&self) -> f64 {
            1000.0
        }
        fn terrain_height(&self) -> f64 {
            100.0
        }
        fn height(&self, d: DVec3) -> f64 {
            1000.0 + 50.0 * (d.z + 1.0)
        }
        fn surface_info(&self, d: DVec3) -> SurfaceSample {
            SurfaceSample {
                attributes: [d.z as f32, 0.25],
                height: self.height(d),
            }
        }
    }

    fn completed(outcome: GenerationOutcome) -> MeshData {
        match outcome {
            GenerationOutcome::Completed(mesh) => mesh,
            GenerationOutcome::Cancelled => panic!("generation was cancelled"),
        }
    }

    #[test]
    fn test_mesh_has_grid_vertex_count() {
        let field = SphereField::new(1000.0);
        let geometry = NodeGeometry::new(NodeKey::root(CubeFace::PosY), 8, &field);
        let mesh = completed(generate_mesh(&geometry, &field, None, &CancelToken::new()));
        assert_eq!(mesh.vertices.len(), 81);
        assert!(mesh.water.is_none());
    }

    #[test]
    fn test_positions_are_center_relative_and_size_normalized() {
        let field = SphereField::new(1000.0);
        let key = NodeKey::new(CubeFace::NegZ, NodeId::ROOT.child(3).unwrap());
        let geometry = NodeGeometry::new(key, 16, &field);
        let mesh = completed(generate_mesh(&geometry, &field, None, &CancelToken::new()));

        let center = mesh.vertices[8 * 17 + 8].position;
        assert!(center.iter().all(|c| c.abs() < 1e-6), "center vertex {center:?}");
        for v in &mesh.vertices {
            let world = DVec3::from_array(v.position.map(f64::from)) * geometry.size
                + geometry.mesh_center;
            assert!(
                (world.length() - 1000.0).abs() < 1e-2,
                "reconstructed vertex is off the sphere: {}",
                world.length()
            );
        }
    }

    #[test]
    fn test_normals_point_outward_on_a_sphere() {
        let field = SphereField::new(1000.0);
        for face in CubeFace::ALL {
            let geometry = NodeGeometry::new(NodeKey::root(face), 8, &field);
            let mesh = completed(generate_mesh(&geometry, &field, None, &CancelToken::new()));
            for (i, v) in mesh.vertices.iter().enumerate() {
                let (x, z) = ((i % 9) as i64, (i / 9) as i64);
                let up = geometry.lattice_direction(x, z);
                let n = DVec3::from_array(v.normal.map(f64::from));
                assert!(
                    n.dot(up) > 0.9,
                    "normal {n:?} of vertex ({x}, {z}) on {face:?} is not outward"
                );
            }
        }
    }

    #[test]
    fn test_attributes_come_from_surface_info() {
        let field = Basin;
        let geometry = NodeGeometry::new(NodeKey::root(CubeFace::PosX), 4, &field);
        let mesh = completed(generate_mesh(&geometry, &field, None, &CancelToken::new()));
        for (i, v) in mesh.vertices.iter().enumerate() {
            let (x, z) = ((i % 5) as i64, (i / 5) as i64);
            let d = geometry.lattice_direction(x, z);
            assert_eq!(v.attributes, [d.z as f32, 0.25]);
        }
    }

    #[test]
    fn test_water_only_where_terrain_dips_below_ocean() {
        let field = Basin;
        // Ocean at 1000 + 100 * 0.5 = 1050: the -z face sits at 1000..1050.
        let low = NodeGeometry::new(NodeKey::root(CubeFace::NegZ), 4, &field);
        let high = NodeGeometry::new(NodeKey::root(CubeFace::PosZ), 4, &field);

        let low_mesh = completed(generate_mesh(&low, &field, Some(0.5), &CancelToken::new()));
        let high_mesh = completed(generate_mesh(&high, &field, Some(0.5), &CancelToken::new()));

        let water = low_mesh.water.expect("low face should carry water");
        assert_eq!(water.len(), 25);
        for w in &water {
            let world =
                DVec3::from_array(w.position.map(f64::from)) * low.size + low.mesh_center;
            assert!((world.length() - 1050.0).abs() < 1e-2);
        }
        assert!(high_mesh.water.is_none(), "high face should be dry");
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let field = SphereField::new(1000.0);
        let geometry = NodeGeometry::new(NodeKey::root(CubeFace::PosY), 16, &field);
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            generate_mesh(&geometry, &field, None, &token),
            GenerationOutcome::Cancelled
        ));
    }

    #[test]
    fn test_bounds_contain_every_vertex() {
        let field = Basin;
        let geometry = NodeGeometry::new(NodeKey::root(CubeFace::PosY), 8, &field);
        let mesh = completed(generate_mesh(&geometry, &field, None, &CancelToken::new()));
        let inverse = mesh.bounds.axes.transpose();
        for v in &mesh.vertices {
            let world = DVec3::from_array(v.position.map(f64::from)) * geometry.size
                + geometry.mesh_center;
            let local = inverse * (world - mesh.bounds.center);
            assert!(
                local.abs().cmple(mesh.bounds.half_extents + 1e-3).all(),
                "vertex {world:?} escapes the bounds"
            );
        }
    }
}
