//! A single quadtree node: split/merge decision and mesh lifecycle.

use glam::DVec3;
use planeta_cubesphere::{arc_between, chord_to_arc};
use planeta_terrain::HeightField;
use tracing::debug;

use crate::culling::Obb;
use crate::fan_cache::FanMask;
use crate::geometry::NodeGeometry;
use crate::graphics::{BufferHandle, GraphicsContext, GraphicsError};
use crate::mesh::MeshData;
use crate::node_id::{NodeId, NodeKey};
use crate::scheduler::{Completion, GenerationScheduler, Ticket};
use crate::settings::LodSettings;

/// Outcome of the per-frame distance test for one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LodAction {
    /// The node is inside its split distance: split it, or update its children.
    Split,
    /// Inside the hysteresis band: leave the topology alone.
    Keep,
    /// Outside its merge distance: collapse its children.
    Merge,
}

/// Viewer position for one LOD pass, relative to the body center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewer {
    pub position: DVec3,
    /// Unit direction from the body center to the viewer.
    pub direction: DVec3,
}

impl Viewer {
    pub fn new(position: DVec3) -> Self {
        let direction = position.try_normalize().unwrap_or(DVec3::Y);
        Self {
            position,
            direction,
        }
    }
}

/// Distance test for a node.
///
/// The node's distance is the mean of the straight-line distance to its
/// closest sample and the great-circle distance from the point below the
/// viewer to that sample. It is compared, squared, against the node's own
/// arc length scaled by the split factor. Nodes coarser than the maximum
/// vertex spacing are always in the split zone.
pub fn evaluate_split(
    geometry: &NodeGeometry,
    viewer: &Viewer,
    radius: f64,
    settings: &LodSettings,
) -> LodAction {
    let (closest, closest_distance) = geometry.closest_sample(viewer.position);
    let sample_direction = closest.try_normalize().unwrap_or(viewer.direction);
    let arc_distance = arc_between(viewer.direction, sample_direction, radius);
    let x = (arc_distance + closest_distance) * 0.5;

    let split_distance = chord_to_arc(geometry.size, radius) * settings.split_distance_factor;
    let too_coarse = geometry.vertex_spacing() > settings.max_vertex_spacing;

    if too_coarse || x * x < split_distance * split_distance {
        return LodAction::Split;
    }
    let merge_distance = split_distance * (1.0 + settings.merge_hysteresis);
    if x * x >= merge_distance * merge_distance {
        LodAction::Merge
    } else {
        LodAction::Keep
    }
}

/// GPU buffers of an uploaded node mesh.
#[derive(Clone, Debug)]
pub struct GpuMesh {
    pub vertex_buffer: BufferHandle,
    pub vertex_count: u32,
    pub water_buffer: Option<BufferHandle>,
    /// Planet-space bounds.
    pub bounds: Obb,
}

impl GpuMesh {
    pub(crate) fn release(self, gfx: &mut dyn GraphicsContext) {
        gfx.release_buffer(self.vertex_buffer);
        if let Some(water) = self.water_buffer {
            gfx.release_buffer(water);
        }
    }
}

/// Everything a node needs from its forest while changing topology.
pub(crate) struct LodContext<'a> {
    pub settings: &'a LodSettings,
    pub field: &'a dyn HeightField,
    pub scheduler: &'a mut GenerationScheduler,
    /// GPU meshes of disposed nodes, released on the next draw.
    pub retired: &'a mut Vec<GpuMesh>,
    /// Nodes that split or merged during this pass.
    pub topology_changed: &'a mut Vec<NodeKey>,
}

/// A quadtree node. Owns its four children, if split.
pub struct QuadNode {
    geometry: NodeGeometry,
    children: Option<Box<[QuadNode; 4]>>,
    ticket: Option<Ticket>,
    /// Generated but not yet uploaded.
    mesh: Option<MeshData>,
    gpu: Option<GpuMesh>,
    fan_mask: FanMask,
    index_dirty: bool,
    disposed: bool,
}

impl QuadNode {
    pub(crate) fn new(key: NodeKey, settings: &LodSettings, field: &dyn HeightField) -> Self {
        Self {
            geometry: NodeGeometry::new(key, settings.grid_resolution, field),
            children: None,
            ticket: None,
            mesh: None,
            gpu: None,
            fan_mask: FanMask::NONE,
            index_dirty: true,
            disposed: false,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.geometry.key
    }

    pub fn id(&self) -> NodeId {
        self.geometry.key.id
    }

    /// Depth below the face root.
    pub fn lod_level(&self) -> u32 {
        self.geometry.key.id.depth()
    }

    pub fn sibling_index(&self) -> Option<u8> {
        self.geometry.key.id.sibling_index()
    }

    pub fn geometry(&self) -> &NodeGeometry {
        &self.geometry
    }

    pub fn children(&self) -> Option<&[QuadNode; 4]> {
        self.children.as_deref()
    }

    pub fn is_split(&self) -> bool {
        self.children.is_some()
    }

    /// A generation request for this node is pending or running.
    pub fn is_generating(&self) -> bool {
        self.ticket.is_some()
    }

    /// Mesh data is waiting for upload.
    pub fn is_vertex_dirty(&self) -> bool {
        self.mesh.is_some()
    }

    /// The fan mask needs to be recomputed.
    pub fn is_index_dirty(&self) -> bool {
        self.index_dirty
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The node has a mesh, uploaded or waiting for upload.
    pub fn is_ready(&self) -> bool {
        !self.disposed && (self.mesh.is_some() || self.gpu.is_some())
    }

    pub fn fan_mask(&self) -> FanMask {
        self.fan_mask
    }

    pub fn gpu_mesh(&self) -> Option<&GpuMesh> {
        self.gpu.as_ref()
    }

    /// Whether a split would stay above the minimum vertex spacing.
    pub fn can_split(&self, settings: &LodSettings) -> bool {
        self.lod_level() < NodeId::MAX_DEPTH
            && self.geometry.size / 2.0 / f64::from(settings.grid_resolution)
                > settings.min_vertex_spacing
    }

    pub(crate) fn request_generation(&mut self, ctx: &mut LodContext<'_>) {
        if self.disposed || self.ticket.is_some() {
            return;
        }
        self.ticket = Some(ctx.scheduler.enqueue(self.geometry.clone()));
    }

    /// Split/merge this subtree for `viewer`.
    pub(crate) fn update_lod(&mut self, viewer: &Viewer, ctx: &mut LodContext<'_>) {
        match evaluate_split(&self.geometry, viewer, ctx.field.radius(), ctx.settings) {
            LodAction::Split => match &mut self.children {
                Some(children) => children.iter_mut().for_each(|c| c.update_lod(viewer, ctx)),
                None => {
                    if self.can_split(ctx.settings) {
                        self.split(ctx);
                    }
                }
            },
            LodAction::Keep => {
                if let Some(children) = &mut self.children {
                    children.iter_mut().for_each(|c| c.update_lod(viewer, ctx));
                }
            }
            LodAction::Merge => {
                if self.children.is_some() {
                    self.unsplit(ctx);
                }
            }
        }
    }

    /// Create the four children and request their meshes.
    ///
    /// Returns `false` without side effects if the node is already split,
    /// disposed, or at the maximum depth.
    pub(crate) fn split(&mut self, ctx: &mut LodContext<'_>) -> bool {
        if self.children.is_some() || self.disposed {
            return false;
        }
        let key = self.key();
        let Some(ids) = key.id.children() else {
            return false;
        };
        let mut children =
            ids.map(|id| QuadNode::new(NodeKey::new(key.face, id), ctx.settings, ctx.field));
        for child in &mut children {
            child.request_generation(ctx);
        }
        self.children = Some(Box::new(children));
        ctx.topology_changed.push(key);
        debug!(node = ?key, lod = self.lod_level(), "split");
        true
    }

    /// Dispose the children and fall back to this node's own mesh,
    /// regenerating it if it was never built or has been lost.
    pub(crate) fn unsplit(&mut self, ctx: &mut LodContext<'_>) -> bool {
        let Some(children) = self.children.take() else {
            return false;
        };
        for mut child in *children {
            child.dispose(ctx);
        }
        if !self.is_ready() {
            self.request_generation(ctx);
        }
        self.index_dirty = true;
        ctx.topology_changed.push(self.key());
        debug!(node = ?self.key(), lod = self.lod_level(), "merge");
        true
    }

    /// Tombstone this subtree: cancel generation and retire GPU meshes.
    pub(crate) fn dispose(&mut self, ctx: &mut LodContext<'_>) {
        self.dispose_with(ctx.scheduler, ctx.retired);
    }

    pub(crate) fn dispose_with(
        &mut self,
        scheduler: &mut GenerationScheduler,
        retired: &mut Vec<GpuMesh>,
    ) {
        self.disposed = true;
        if self.ticket.take().is_some() {
            scheduler.cancel(self.key());
        }
        self.mesh = None;
        if let Some(gpu) = self.gpu.take() {
            retired.push(gpu);
        }
        if let Some(children) = self.children.take() {
            for mut child in *children {
                child.dispose_with(scheduler, retired);
            }
        }
    }

    /// Attach a finished mesh if it answers this node's live request.
    pub(crate) fn accept(&mut self, completion: Completion) -> bool {
        if self.disposed || self.ticket != Some(completion.ticket) {
            return false;
        }
        self.ticket = None;
        self.mesh = Some(completion.mesh);
        self.index_dirty = true;
        true
    }

    /// Move pending mesh data into GPU buffers.
    ///
    /// On failure the node loses its mesh entirely and stops being ready.
    pub(crate) fn upload(&mut self, gfx: &mut dyn GraphicsContext) -> Result<(), GraphicsError> {
        let Some(mesh) = self.mesh.take() else {
            return Ok(());
        };
        if let Some(old) = self.gpu.take() {
            old.release(gfx);
        }
        let label = format!("{:?}/{:#x}", self.key().face, self.id().raw());
        let vertex_buffer =
            gfx.create_vertex_buffer(&label, bytemuck::cast_slice(mesh.vertices.as_slice()))?;
        let water_buffer = match &mesh.water {
            Some(water) => {
                let water_label = format!("{label}-water");
                let bytes = bytemuck::cast_slice(water.as_slice());
                match gfx.create_vertex_buffer(&water_label, bytes) {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        gfx.release_buffer(vertex_buffer);
                        return Err(err);
                    }
                }
            }
            None => None,
        };
        self.gpu = Some(GpuMesh {
            vertex_buffer,
            vertex_count: mesh.vertices.len() as u32,
            water_buffer,
            bounds: mesh.bounds,
        });
        Ok(())
    }

    pub(crate) fn set_fan_mask(&mut self, mask: FanMask) {
        self.fan_mask = mask;
        self.index_dirty = false;
    }

    /// Flag this node and its subtree for fan-mask recomputation.
    pub(crate) fn mark_index_dirty(&mut self) {
        self.index_dirty = true;
        if let Some(children) = &mut self.children {
            children.iter_mut().for_each(QuadNode::mark_index_dirty);
        }
    }

    /// Exact node for `id`, if it exists in this subtree.
    pub fn find(&self, id: NodeId) -> Option<&QuadNode> {
        let own = self.lod_level();
        if id.depth() < own || id.ancestor_at(own) != self.id() {
            return None;
        }
        let mut node = self;
        for level in own + 1..=id.depth() {
            let sibling = id.ancestor_at(level).sibling_index()?;
            node = &node.children.as_ref()?[usize::from(sibling)];
        }
        Some(node)
    }

    pub(crate) fn find_mut(&mut self, id: NodeId) -> Option<&mut QuadNode> {
        let own = self.lod_level();
        if id.depth() < own || id.ancestor_at(own) != self.id() {
            return None;
        }
        let mut node = self;
        for level in own + 1..=id.depth() {
            let sibling = id.ancestor_at(level).sibling_index()?;
            node = &mut node.children.as_mut()?[usize::from(sibling)];
        }
        Some(node)
    }

    /// Deepest existing node on the path toward `id`: `id` itself, or its
    /// closest existing ancestor.
    pub fn deepest_toward(&self, id: NodeId) -> &QuadNode {
        let mut node = self;
        for level in self.lod_level() + 1..=id.depth() {
            let Some(children) = node.children.as_deref() else {
                break;
            };
            let Some(sibling) = id.ancestor_at(level).sibling_index() else {
                break;
            };
            node = &children[usize::from(sibling)];
        }
        node
    }

    /// Append the nodes that should be drawn this frame.
    ///
    /// A split node stands in for its children until all four are ready.
    pub(crate) fn collect_drawable(&self, out: &mut Vec<NodeKey>) {
        match &self.children {
            Some(children) if children.iter().all(QuadNode::is_ready) => {
                children.iter().for_each(|c| c.collect_drawable(out));
            }
            _ => {
                if self.is_ready() {
                    out.push(self.key());
                }
            }
        }
    }

    /// Keys of nodes in this subtree whose fan mask is stale.
    pub(crate) fn collect_index_dirty(&self, out: &mut Vec<NodeId>) {
        if self.index_dirty {
            out.push(self.id());
        }
        if let Some(children) = &self.children {
            children.iter().for_each(|c| c.collect_index_dirty(out));
        }
    }

    /// Visit every node in this subtree, parents first.
    pub fn visit(&self, f: &mut impl FnMut(&QuadNode)) {
        f(self);
        if let Some(children) = &self.children {
            children.iter().for_each(|c| c.visit(f));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SchedulerSettings;
    use planeta_cubesphere::CubeFace;
    use planeta_terrain::SphereField;
    use std::f64::consts::SQRT_2;
    use std::sync::Arc;

    struct Harness {
        settings: LodSettings,
        field: SphereField,
        scheduler: GenerationScheduler,
        retired: Vec<GpuMesh>,
        changed: Vec<NodeKey>,
    }

    impl Harness {
        fn new(radius: f64, settings: LodSettings) -> Self {
            let field = SphereField::new(radius);
            let scheduler = GenerationScheduler::new(
                SchedulerSettings::inline(),
                Arc::new(field),
                None,
            )
            .unwrap();
            Self {
                settings,
                field,
                scheduler,
                retired: Vec::new(),
                changed: Vec::new(),
            }
        }

        fn ctx(&mut self) -> LodContext<'_> {
            LodContext {
                settings: &self.settings,
                field: &self.field,
                scheduler: &mut self.scheduler,
                retired: &mut self.retired,
                topology_changed: &mut self.changed,
            }
        }

        fn node(&self, key: NodeKey) -> QuadNode {
            QuadNode::new(key, &self.settings, &self.field)
        }
    }

    /// Root of size 1000 (radius 1000 / sqrt(2)), G = 16, max spacing 500.
    fn reference_case(factor: f64) -> (NodeGeometry, Viewer, f64, LodSettings) {
        let radius = 1000.0 / SQRT_2;
        let settings = LodSettings {
            grid_resolution: 16,
            min_vertex_spacing: 1.0,
            max_vertex_spacing: 500.0,
            split_distance_factor: factor,
            merge_hysteresis: 0.0,
            ocean_level: None,
        };
        let field = SphereField::new(radius);
        let geometry = NodeGeometry::new(NodeKey::root(CubeFace::PosY), 16, &field);
        let viewer = Viewer::new(geometry.mesh_center + DVec3::Y * 3000.0);
        (geometry, viewer, radius, settings)
    }

    #[test]
    fn test_reference_node_split_decision() {
        let (geometry, viewer, radius, settings) = reference_case(1.0);
        assert!((geometry.size - 1000.0).abs() < 1e-9);
        assert!(geometry.vertex_spacing() < settings.max_vertex_spacing);

        // Viewer straight above the center sample: arc distance 0, so
        // x = (0 + 3000) / 2 = 1500. The node's arc size is
        // 2 * asin(1000 / 2r) * r = r * pi / 2 ~= 1110.7.
        let arc_size = radius * std::f64::consts::FRAC_PI_2;
        assert!((chord_to_arc(geometry.size, radius) - arc_size).abs() < 1e-9);
        let x: f64 = 1500.0;
        assert_eq!(
            evaluate_split(&geometry, &viewer, radius, &settings),
            LodAction::Merge,
            "x^2 = {} is not below arc_size^2 = {}",
            x * x,
            arc_size * arc_size
        );

        let (geometry, viewer, radius, settings) = reference_case(3.0);
        assert_eq!(
            evaluate_split(&geometry, &viewer, radius, &settings),
            LodAction::Split,
            "x = 1500 is below 3 * arc size"
        );
    }

    #[test]
    fn test_max_spacing_forces_split() {
        let (geometry, viewer, radius, mut settings) = reference_case(1.0);
        settings.max_vertex_spacing = 50.0;
        assert_eq!(
            evaluate_split(&geometry, &viewer, radius, &settings),
            LodAction::Split
        );
    }

    #[test]
    fn test_hysteresis_band_keeps_topology() {
        let (geometry, viewer, radius, mut settings) = reference_case(1.2);
        // Split distance 1.2 * 1110.7 ~= 1332.9 < 1500 < 1332.9 * 1.25.
        settings.merge_hysteresis = 0.25;
        assert_eq!(
            evaluate_split(&geometry, &viewer, radius, &settings),
            LodAction::Keep
        );
        settings.merge_hysteresis = 0.0;
        assert_eq!(
            evaluate_split(&geometry, &viewer, radius, &settings),
            LodAction::Merge
        );
    }

    #[test]
    fn test_split_is_idempotent() {
        let mut h = Harness::new(1000.0, LodSettings::for_radius(1000.0));
        let mut node = h.node(NodeKey::root(CubeFace::PosZ));
        assert!(node.split(&mut h.ctx()));
        assert_eq!(h.scheduler.pending_len(), 4);
        let first_children: Vec<NodeKey> =
            node.children().unwrap().iter().map(QuadNode::key).collect();

        assert!(!node.split(&mut h.ctx()), "second split must be a no-op");
        assert_eq!(h.scheduler.pending_len(), 4, "no new generation requests");
        let second_children: Vec<NodeKey> =
            node.children().unwrap().iter().map(QuadNode::key).collect();
        assert_eq!(first_children, second_children);
        assert_eq!(h.changed.len(), 1);
    }

    #[test]
    fn test_children_have_next_lod_and_sibling_indices() {
        let mut h = Harness::new(1000.0, LodSettings::for_radius(1000.0));
        let mut node = h.node(NodeKey::root(CubeFace::NegY));
        node.split(&mut h.ctx());
        for (i, child) in node.children().unwrap().iter().enumerate() {
            assert_eq!(child.lod_level(), 1);
            assert_eq!(child.sibling_index(), Some(i as u8));
            assert!(child.is_generating());
            assert_eq!(child.geometry().size, node.geometry().size / 2.0);
        }
    }

    #[test]
    fn test_unsplit_disposes_children_and_regenerates_parent() {
        let mut h = Harness::new(1000.0, LodSettings::for_radius(1000.0));
        let mut node = h.node(NodeKey::root(CubeFace::PosX));
        node.split(&mut h.ctx());
        let child_keys: Vec<NodeKey> =
            node.children().unwrap().iter().map(QuadNode::key).collect();

        assert!(node.unsplit(&mut h.ctx()));
        assert!(!node.is_split());
        for key in child_keys {
            assert!(!h.scheduler.is_scheduled(key), "child {key:?} still queued");
        }
        assert!(node.is_generating(), "unready parent must request its mesh");
        assert!(!node.unsplit(&mut h.ctx()));
    }

    #[test]
    fn test_disposed_node_rejects_late_completion() {
        let mut h = Harness::new(1000.0, LodSettings::for_radius(1000.0));
        let key = NodeKey::root(CubeFace::PosY);
        let mut node = h.node(key);
        node.request_generation(&mut h.ctx());
        let ticket = h.scheduler.ticket_for(key).unwrap();
        let mesh = match crate::mesh::generate_mesh(
            node.geometry(),
            &h.field,
            None,
            &crate::mesh::CancelToken::new(),
        ) {
            crate::mesh::GenerationOutcome::Completed(mesh) => mesh,
            crate::mesh::GenerationOutcome::Cancelled => unreachable!(),
        };

        node.dispose(&mut h.ctx());
        assert!(!h.scheduler.is_scheduled(key));
        assert!(!node.accept(Completion { key, ticket, mesh }));
        assert!(!node.is_ready());
        assert!(!node.is_vertex_dirty());
    }

    #[test]
    fn test_accept_requires_matching_ticket() {
        let mut h = Harness::new(1000.0, LodSettings::for_radius(1000.0));
        let key = NodeKey::root(CubeFace::NegZ);
        let mut node = h.node(key);
        node.request_generation(&mut h.ctx());
        let completions = h.scheduler.tick();
        assert_eq!(completions.len(), 1);
        let completion = completions.into_iter().next().unwrap();

        let stale = Completion {
            ticket: completion.ticket + 100,
            key,
            mesh: completion.mesh.clone(),
        };
        assert!(!node.accept(stale));
        assert!(node.accept(completion));
        assert!(node.is_ready());
        assert!(node.is_vertex_dirty());
        assert!(!node.is_generating());
    }

    #[test]
    fn test_find_and_deepest_toward() {
        let mut h = Harness::new(1000.0, LodSettings::for_radius(1000.0));
        let mut root = h.node(NodeKey::root(CubeFace::PosY));
        root.split(&mut h.ctx());
        let child = NodeId::ROOT.child(2).unwrap();
        root.find_mut(child).unwrap().split(&mut h.ctx());

        let grandchild = child.child(1).unwrap();
        assert_eq!(root.find(grandchild).unwrap().id(), grandchild);
        assert!(root.find(grandchild.child(0).unwrap()).is_none());

        let deep = NodeId::ROOT.child(0).unwrap().child(3).unwrap();
        assert_eq!(root.deepest_toward(deep).id(), NodeId::ROOT.child(0).unwrap());
        assert_eq!(root.deepest_toward(grandchild).id(), grandchild);
    }

    #[test]
    fn test_can_split_respects_spacing_floor() {
        let settings = LodSettings {
            min_vertex_spacing: 40.0,
            ..LodSettings::for_radius(1000.0)
        };
        let h = Harness::new(1000.0, settings);
        // Root size ~1414: half-spacing 44.2 > 40.
        let root = h.node(NodeKey::root(CubeFace::PosY));
        assert!(root.can_split(&h.settings));
        let child = h.node(NodeKey::new(CubeFace::PosY, NodeId::ROOT.child(0).unwrap()));
        assert!(!child.can_split(&h.settings));
    }
}
