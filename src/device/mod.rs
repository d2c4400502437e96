//! Device abstraction the executor drives.
//!
//! [`RenderDevice`] is the boundary between graph compilation and a GPU
//! backend: object creation, memory, and command recording. The crate
//! ships [`DummyDevice`] for tests and headless runs; real backends
//! implement the same trait.

use thiserror::Error;

use crate::state::{PipelineStages, ResourceState};
use crate::types::{BufferUsage, ClearValue, Extent2d, LoadOp, StoreOp, TextureFormat, TextureUsage};

mod dummy;

pub use dummy::{DummyDevice, RecordedCommand};

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by a device backend.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("out of device memory: requested {requested} bytes with {available} available")]
    OutOfMemory { requested: u64, available: u64 },

    #[error("device object creation failed: {0}")]
    Creation(String),
}

// ============================================================================
// Handles
// ============================================================================

/// Opaque handle to a device image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(u64);

impl ImageHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Opaque handle to a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Opaque handle to an image view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageViewHandle(u64);

impl ImageViewHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Opaque handle to a device memory allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHandle(u64);

impl MemoryHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

// ============================================================================
// Memory
// ============================================================================

bitflags::bitflags! {
    /// Memory heap classes an allocation may come from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryKinds: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const LAZY = 1 << 2;
    }
}

/// Memory requirements of a device object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// Required size in bytes.
    pub size: u64,
    /// Required alignment in bytes.
    pub alignment: u64,
    /// Acceptable memory kinds. Objects can share a region only if their
    /// kind sets intersect.
    pub kinds: MemoryKinds,
}

// ============================================================================
// Object Creation
// ============================================================================

/// Parameters for creating a device image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCreateInfo {
    pub label: Option<String>,
    pub extent: Extent2d,
    pub format: TextureFormat,
    pub mip_levels: u32,
    pub usage: TextureUsage,
}

/// Parameters for creating a device buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferCreateInfo {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

// ============================================================================
// Commands
// ============================================================================

/// Image barrier resolved to a device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrierCmd {
    pub image: ImageHandle,
    pub before: ResourceState,
    pub after: ResourceState,
}

/// Buffer barrier resolved to a device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrierCmd {
    pub buffer: BufferHandle,
    pub before: ResourceState,
    pub after: ResourceState,
}

/// Color attachment binding for a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTarget {
    pub view: ImageViewHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
}

/// Depth attachment binding for a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTarget {
    pub view: ImageViewHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
}

/// Full render pass binding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassTarget {
    pub label: Option<String>,
    pub colors: Vec<ColorTarget>,
    pub depth: Option<DepthTarget>,
    pub extent: Extent2d,
}

// ============================================================================
// Render Device
// ============================================================================

/// GPU backend interface.
///
/// Object creation and memory binding are separate steps so the compiler
/// can plan aliased placements from memory requirements before committing
/// any allocation.
pub trait RenderDevice {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    fn create_image(&mut self, info: &ImageCreateInfo) -> Result<ImageHandle, DeviceError>;

    fn create_buffer(&mut self, info: &BufferCreateInfo) -> Result<BufferHandle, DeviceError>;

    fn image_memory_requirements(&self, image: ImageHandle) -> MemoryRequirements;

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements;

    fn allocate_memory(
        &mut self,
        size: u64,
        alignment: u64,
        kinds: MemoryKinds,
    ) -> Result<MemoryHandle, DeviceError>;

    fn bind_image_memory(
        &mut self,
        image: ImageHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError>;

    fn bind_buffer_memory(
        &mut self,
        buffer: BufferHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError>;

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        format: TextureFormat,
    ) -> Result<ImageViewHandle, DeviceError>;

    fn destroy_image(&mut self, image: ImageHandle);

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn destroy_image_view(&mut self, view: ImageViewHandle);

    fn free_memory(&mut self, memory: MemoryHandle);

    /// Record a pipeline barrier covering the given transitions.
    fn cmd_pipeline_barrier(
        &mut self,
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        image_barriers: &[ImageBarrierCmd],
        buffer_barriers: &[BufferBarrierCmd],
    );

    fn cmd_begin_render_pass(&mut self, target: &RenderPassTarget);

    fn cmd_end_render_pass(&mut self);
}
