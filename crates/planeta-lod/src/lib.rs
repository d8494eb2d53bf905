//! Cube-sphere quadtree level of detail for planetary terrain.
//!
//! Each of the six cube faces carries a quadtree of [`QuadNode`]s. Every
//! frame the [`QuadForest`] splits nodes near the viewer and merges distant
//! ones, the [`GenerationScheduler`] builds node meshes off the main thread,
//! and [`QuadForest::draw`] uploads, culls and submits the nodes that should
//! be visible. Edges next to coarser neighbors are stitched with index
//! lists from the [`TriangleFanCache`].

mod culling;
mod fan_cache;
mod forest;
mod geometry;
mod graphics;
mod mesh;
mod node;
mod node_id;
mod scale_space;
mod scheduler;
mod settings;

pub use culling::{DFrustum, HorizonTest, Obb};
pub use fan_cache::{FanMask, TriangleFanCache};
pub use forest::{DrawParams, DrawStats, ForestStats, QuadForest};
pub use geometry::{NodeGeometry, root_size};
pub use graphics::{
    BufferHandle, DrawCall, GraphicsContext, GraphicsError, RecordingContext, SurfacePass,
};
pub use mesh::{
    CancelToken, GenerationOutcome, MeshData, TerrainVertex, WaterVertex, generate_mesh,
    ocean_radius,
};
pub use node::{GpuMesh, LodAction, QuadNode, Viewer, evaluate_split};
pub use node_id::{Direction, NodeId, NodeKey};
pub use scale_space::{ScaleSpace, ScaledPosition};
pub use scheduler::{Completion, GenerationScheduler, Ticket};
pub use settings::{LodSettings, SchedulerSettings, SettingsError};
