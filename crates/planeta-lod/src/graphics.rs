//! The seam to the graphics device.
//!
//! The LOD core never talks to a GPU API directly. Buffer creation, release
//! and draw submission go through [`GraphicsContext`], always from the main
//! thread. [`RecordingContext`] is a headless implementation that keeps
//! every call for inspection.

use std::collections::HashMap;

use glam::Mat4;
use thiserror::Error;

/// Opaque handle to a buffer owned by a [`GraphicsContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Failures reported by a graphics backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    #[error("failed to create buffer `{label}`: {reason}")]
    BufferCreation { label: String, reason: String },
    #[error("graphics device lost")]
    DeviceLost,
}

/// Which surface a draw call renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfacePass {
    Terrain,
    Water,
}

/// One indexed draw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub pass: SurfacePass,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    /// Maps normalized mesh positions into scaled camera-relative space.
    pub model: Mat4,
}

/// Buffer and draw operations the LOD core needs from a graphics device.
pub trait GraphicsContext {
    fn create_vertex_buffer(&mut self, label: &str, data: &[u8])
    -> Result<BufferHandle, GraphicsError>;

    fn create_index_buffer(&mut self, label: &str, indices: &[u16])
    -> Result<BufferHandle, GraphicsError>;

    fn release_buffer(&mut self, handle: BufferHandle);

    fn draw_indexed(&mut self, call: &DrawCall);
}

/// Headless [`GraphicsContext`] that records buffers and draw calls.
#[derive(Debug, Default)]
pub struct RecordingContext {
    next_handle: u64,
    live: HashMap<BufferHandle, usize>,
    /// Draw calls issued since the last [`take_draws`](Self::take_draws).
    pub draws: Vec<DrawCall>,
    /// Total buffers ever created.
    pub created: usize,
    /// Total buffers released.
    pub released: usize,
    /// When set, vertex buffer creation fails.
    pub fail_vertex_buffers: bool,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers currently alive.
    pub fn live_buffers(&self) -> usize {
        self.live.len()
    }

    /// Bytes held by live buffers.
    pub fn live_bytes(&self) -> usize {
        self.live.values().sum()
    }

    pub fn is_live(&self, handle: BufferHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn take_draws(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }

    fn allocate(&mut self, bytes: usize) -> BufferHandle {
        self.next_handle += 1;
        let handle = BufferHandle(self.next_handle);
        self.live.insert(handle, bytes);
        self.created += 1;
        handle
    }
}

impl GraphicsContext for RecordingContext {
    fn create_vertex_buffer(
        &mut self,
        label: &str,
        data: &[u8],
    ) -> Result<BufferHandle, GraphicsError> {
        if self.fail_vertex_buffers {
            return Err(GraphicsError::BufferCreation {
                label: label.to_owned(),
                reason: "allocation refused".to_owned(),
            });
        }
        Ok(self.allocate(data.len()))
    }

    fn create_index_buffer(
        &mut self,
        _label: &str,
        indices: &[u16],
    ) -> Result<BufferHandle, GraphicsError> {
        Ok(self.allocate(std::mem::size_of_val(indices)))
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if self.live.remove(&handle).is_some() {
            self.released += 1;
        }
    }

    fn draw_indexed(&mut self, call: &DrawCall) {
        self.draws.push(call.clone());
    }
}
