//! The six face quadtrees of one planet.

use std::sync::Arc;

use glam::{DMat4, DVec3, Mat4, Quat, Vec3};
use planeta_cubesphere::CubeFace;
use planeta_terrain::HeightField;
use tracing::{debug, info, warn};

use crate::culling::{DFrustum, HorizonTest};
use crate::fan_cache::{FanMask, TriangleFanCache};
use crate::graphics::{BufferHandle, DrawCall, GraphicsContext, SurfacePass};
use crate::node::{GpuMesh, LodContext, QuadNode, Viewer};
use crate::node_id::{Direction, NodeId, NodeKey};
use crate::scale_space::ScaleSpace;
use crate::scheduler::GenerationScheduler;
use crate::settings::{LodSettings, SchedulerSettings, SettingsError};

/// Per-frame camera data for [`QuadForest::draw`].
#[derive(Clone, Debug)]
pub struct DrawParams {
    /// Camera position in world space.
    pub camera_position: DVec3,
    /// View-projection matrix of a camera placed at the origin
    /// (camera-relative space).
    pub view_projection: DMat4,
    pub scale_space: ScaleSpace,
}

/// Counters from one [`QuadForest::draw`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub drawn_nodes: usize,
    pub drawn_vertices: usize,
    pub culled_horizon: usize,
    pub culled_frustum: usize,
    pub upload_failures: usize,
}

/// Snapshot of the forest for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForestStats {
    pub nodes: usize,
    pub leaves: usize,
    pub max_depth: u32,
    pub ready: usize,
    pub generating: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub drawn_nodes: usize,
    pub drawn_vertices: usize,
    pub culled_horizon: usize,
    pub culled_frustum: usize,
}

/// A planet surface: six quadtrees, their generation scheduler and the
/// shared fan index lists.
pub struct QuadForest {
    settings: LodSettings,
    field: Arc<dyn HeightField>,
    /// World-space position of the body center.
    position: DVec3,
    roots: Vec<QuadNode>,
    scheduler: GenerationScheduler,
    fan_cache: Arc<TriangleFanCache>,
    /// One index buffer per fan mask, created on first draw.
    index_buffers: Option<Vec<BufferHandle>>,
    retired: Vec<GpuMesh>,
    topology_changed: Vec<NodeKey>,
    visible: Vec<NodeKey>,
    visible_dirty: bool,
    last_draw: DrawStats,
    disposed: bool,
}

impl QuadForest {
    /// Build the six roots and request their meshes.
    pub fn new(
        settings: LodSettings,
        scheduler_settings: SchedulerSettings,
        field: Arc<dyn HeightField>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let fan_cache = Arc::new(TriangleFanCache::new(settings.grid_resolution));
        Self::with_fan_cache(settings, scheduler_settings, field, fan_cache)
    }

    /// Like [`new`](Self::new), sharing an existing fan cache of the same
    /// resolution between planets.
    pub fn with_fan_cache(
        settings: LodSettings,
        scheduler_settings: SchedulerSettings,
        field: Arc<dyn HeightField>,
        fan_cache: Arc<TriangleFanCache>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let radius = field.radius();
        if !(radius > 0.0) {
            return Err(SettingsError::Radius(radius));
        }
        if fan_cache.resolution() != settings.grid_resolution {
            return Err(SettingsError::GridResolution(fan_cache.resolution()));
        }
        let scheduler =
            GenerationScheduler::new(scheduler_settings, Arc::clone(&field), settings.ocean_level)?;

        let roots = CubeFace::ALL
            .iter()
            .map(|&face| QuadNode::new(NodeKey::root(face), &settings, field.as_ref()))
            .collect();

        let mut forest = Self {
            settings,
            field,
            position: DVec3::ZERO,
            roots,
            scheduler,
            fan_cache,
            index_buffers: None,
            retired: Vec::new(),
            topology_changed: Vec::new(),
            visible: Vec::new(),
            visible_dirty: true,
            last_draw: DrawStats::default(),
            disposed: false,
        };
        let mut ctx = LodContext {
            settings: &forest.settings,
            field: forest.field.as_ref(),
            scheduler: &mut forest.scheduler,
            retired: &mut forest.retired,
            topology_changed: &mut forest.topology_changed,
        };
        for root in &mut forest.roots {
            root.request_generation(&mut ctx);
        }
        info!(
            radius,
            grid = forest.settings.grid_resolution,
            max_spacing = forest.settings.max_vertex_spacing,
            "quad forest created"
        );
        Ok(forest)
    }

    pub fn settings(&self) -> &LodSettings {
        &self.settings
    }

    pub fn field(&self) -> &Arc<dyn HeightField> {
        &self.field
    }

    pub fn fan_cache(&self) -> &Arc<TriangleFanCache> {
        &self.fan_cache
    }

    pub fn scheduler(&self) -> &GenerationScheduler {
        &self.scheduler
    }

    /// World-space position of the body center.
    pub fn position(&self) -> DVec3 {
        self.position
    }

    pub fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Root node of `face`.
    pub fn root(&self, face: CubeFace) -> &QuadNode {
        &self.roots[face.index()]
    }

    /// The node for `key`, if it currently exists.
    pub fn node(&self, key: NodeKey) -> Option<&QuadNode> {
        self.roots[key.face.index()].find(key.id)
    }

    /// Split/merge every face for a viewer at `viewer_position` (world space).
    pub fn update_lod(&mut self, viewer_position: DVec3) {
        if self.disposed {
            return;
        }
        let viewer = Viewer::new(viewer_position - self.position);
        let mut ctx = LodContext {
            settings: &self.settings,
            field: self.field.as_ref(),
            scheduler: &mut self.scheduler,
            retired: &mut self.retired,
            topology_changed: &mut self.topology_changed,
        };
        for root in &mut self.roots {
            root.update_lod(&viewer, &mut ctx);
        }
        self.refresh_topology();
    }

    /// Split one node. Returns `false` if it does not exist or is already split.
    pub fn split(&mut self, key: NodeKey) -> bool {
        if self.disposed {
            return false;
        }
        let Some(node) = self.roots[key.face.index()].find_mut(key.id) else {
            return false;
        };
        let mut ctx = LodContext {
            settings: &self.settings,
            field: self.field.as_ref(),
            scheduler: &mut self.scheduler,
            retired: &mut self.retired,
            topology_changed: &mut self.topology_changed,
        };
        let changed = node.split(&mut ctx);
        self.refresh_topology();
        changed
    }

    /// Collapse one node's children. Returns `false` if it does not exist or
    /// is not split.
    pub fn merge(&mut self, key: NodeKey) -> bool {
        if self.disposed {
            return false;
        }
        let Some(node) = self.roots[key.face.index()].find_mut(key.id) else {
            return false;
        };
        let mut ctx = LodContext {
            settings: &self.settings,
            field: self.field.as_ref(),
            scheduler: &mut self.scheduler,
            retired: &mut self.retired,
            topology_changed: &mut self.topology_changed,
        };
        let changed = node.unsplit(&mut ctx);
        self.refresh_topology();
        changed
    }

    /// Advance generation by one frame and attach finished meshes.
    ///
    /// Returns the number of nodes that received a mesh.
    pub fn tick(&mut self) -> usize {
        let mut accepted = 0;
        for completion in self.scheduler.tick() {
            let key = completion.key;
            let taken = match self.roots[key.face.index()].find_mut(key.id) {
                Some(node) => node.accept(completion),
                None => false,
            };
            if taken {
                accepted += 1;
            } else {
                debug!(node = ?key, "completion for a node that no longer wants it");
            }
        }
        if accepted > 0 {
            self.visible_dirty = true;
            self.refresh_fan_masks();
        }
        accepted
    }

    /// Nodes that [`draw`](Self::draw) would render, before culling.
    pub fn visible_nodes(&mut self) -> &[NodeKey] {
        if self.visible_dirty {
            self.visible.clear();
            for root in &self.roots {
                root.collect_drawable(&mut self.visible);
            }
            self.visible_dirty = false;
        }
        &self.visible
    }

    /// Upload pending meshes, cull and issue draw calls for one surface.
    pub fn draw(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        params: &DrawParams,
        pass: SurfacePass,
    ) -> DrawStats {
        let mut stats = DrawStats::default();
        if self.disposed {
            return stats;
        }
        for mesh in self.retired.drain(..) {
            mesh.release(gfx);
        }
        let Some(index_buffers) = self.ensure_index_buffers(gfx) else {
            return stats;
        };

        let keys = self.visible_nodes().to_vec();
        let horizon = HorizonTest::new(params.camera_position - self.position, self.field.radius());
        let frustum = DFrustum::from_view_projection(&params.view_projection);
        let relative_body = self.position - params.camera_position;

        for key in keys {
            let Some(node) = self.roots[key.face.index()].find_mut(key.id) else {
                continue;
            };
            if node.is_vertex_dirty() {
                if let Err(err) = node.upload(gfx) {
                    warn!(node = ?key, error = %err, "node mesh upload failed");
                    stats.upload_failures += 1;
                    self.visible_dirty = true;
                    continue;
                }
            }
            let Some(gpu) = node.gpu_mesh() else {
                continue;
            };
            let vertex_buffer = match pass {
                SurfacePass::Terrain => gpu.vertex_buffer,
                SurfacePass::Water => match gpu.water_buffer {
                    Some(buffer) => buffer,
                    None => continue,
                },
            };

            let geometry = node.geometry();
            if !horizon.any_visible(&geometry.samples) {
                stats.culled_horizon += 1;
                continue;
            }
            if !frustum.intersects_obb(&gpu.bounds.translated(relative_body)) {
                stats.culled_frustum += 1;
                continue;
            }

            let scaled = params
                .scale_space
                .apply_relative(relative_body + geometry.mesh_center);
            let model = Mat4::from_scale_rotation_translation(
                Vec3::splat((scaled.scale * geometry.size) as f32),
                Quat::IDENTITY,
                scaled.position.as_vec3(),
            );
            let mask = node.fan_mask();
            let call = DrawCall {
                pass,
                vertex_buffer,
                index_buffer: index_buffers[usize::from(mask.bits())],
                index_count: self.fan_cache.indices(mask).len() as u32,
                model,
            };
            gfx.draw_indexed(&call);
            stats.drawn_nodes += 1;
            stats.drawn_vertices += gpu.vertex_count as usize;
        }

        self.last_draw = stats;
        stats
    }

    /// Release every GPU resource and cancel all outstanding generation.
    ///
    /// The forest is inert afterwards. Must run before the graphics device
    /// is torn down.
    pub fn dispose(&mut self, gfx: &mut dyn GraphicsContext) {
        if self.disposed {
            return;
        }
        for root in &mut self.roots {
            root.dispose_with(&mut self.scheduler, &mut self.retired);
        }
        for mesh in self.retired.drain(..) {
            mesh.release(gfx);
        }
        if let Some(buffers) = self.index_buffers.take() {
            for buffer in buffers {
                gfx.release_buffer(buffer);
            }
        }
        self.visible.clear();
        self.visible_dirty = false;
        self.disposed = true;
        info!("quad forest disposed");
    }

    pub fn stats(&self) -> ForestStats {
        let mut stats = ForestStats {
            pending: self.scheduler.pending_len(),
            in_flight: self.scheduler.in_flight_len(),
            drawn_nodes: self.last_draw.drawn_nodes,
            drawn_vertices: self.last_draw.drawn_vertices,
            culled_horizon: self.last_draw.culled_horizon,
            culled_frustum: self.last_draw.culled_frustum,
            ..Default::default()
        };
        for root in &self.roots {
            root.visit(&mut |node| {
                stats.nodes += 1;
                if !node.is_split() {
                    stats.leaves += 1;
                }
                stats.max_depth = stats.max_depth.max(node.lod_level());
                if node.is_ready() {
                    stats.ready += 1;
                }
                if node.is_generating() {
                    stats.generating += 1;
                }
            });
        }
        stats
    }

    fn ensure_index_buffers(&mut self, gfx: &mut dyn GraphicsContext) -> Option<Vec<BufferHandle>> {
        if self.index_buffers.is_none() {
            let mut buffers = Vec::with_capacity(16);
            for bits in 0..16u8 {
                let label = format!("fan-indices-{bits:04b}");
                let indices = self.fan_cache.indices(FanMask::from_bits(bits));
                match gfx.create_index_buffer(&label, indices) {
                    Ok(handle) => buffers.push(handle),
                    Err(err) => {
                        warn!(error = %err, "fan index buffer creation failed");
                        buffers.into_iter().for_each(|b| gfx.release_buffer(b));
                        return None;
                    }
                }
            }
            self.index_buffers = Some(buffers);
        }
        self.index_buffers.clone()
    }

    /// After splits and merges, flag every node whose fan mask may have
    /// changed and recompute the masks.
    fn refresh_topology(&mut self) {
        if self.topology_changed.is_empty() {
            return;
        }
        for key in std::mem::take(&mut self.topology_changed) {
            let root = &mut self.roots[key.face.index()];
            if let Some(node) = root.find_mut(key.id) {
                node.mark_index_dirty();
            }
            for direction in Direction::ALL {
                let Some(neighbor) = key.id.neighbor(direction) else {
                    continue;
                };
                if let Some(node) = root.find_mut(neighbor) {
                    node.mark_index_dirty();
                }
            }
        }
        self.visible_dirty = true;
        self.refresh_fan_masks();
    }

    fn refresh_fan_masks(&mut self) {
        let mut dirty = Vec::new();
        for root in &mut self.roots {
            dirty.clear();
            root.collect_index_dirty(&mut dirty);
            let mut masks = Vec::with_capacity(dirty.len());
            for &id in &dirty {
                masks.push((id, fan_mask_for(root, id)));
            }
            for (id, mask) in masks {
                if let Some(node) = root.find_mut(id) {
                    node.set_fan_mask(mask);
                }
            }
        }
    }
}

/// Edges of `id` whose neighbor, as deep as the tree currently goes toward
/// it, is coarser than `id`.
fn fan_mask_for(root: &QuadNode, id: NodeId) -> FanMask {
    let depth = id.depth();
    Direction::ALL
        .into_iter()
        .fold(FanMask::NONE, |mask, direction| match id.neighbor(direction) {
            Some(neighbor) if root.deepest_toward(neighbor).lod_level() < depth => {
                mask.with(direction)
            }
            _ => mask,
        })
}

impl Drop for QuadForest {
    fn drop(&mut self) {
        if !self.disposed && (self.index_buffers.is_some() || !self.retired.is_empty()) {
            warn!("quad forest dropped without dispose; GPU buffers leaked");
        }
    }
}
