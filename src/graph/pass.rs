//! Pass declarations and the execution context handed to callbacks.

use std::fmt;

use super::resource::{PassAccess, ResourceHandle};
use crate::compiler::PhysicalTable;
use crate::device::{BufferHandle, ImageHandle, ImageViewHandle, RenderDevice};
use crate::state::QueueClass;
use crate::types::{ClearValue, Extent2d, LoadOp, StoreOp, TextureFormat};

/// Handle to a pass declared on a graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(pub(crate) u32);

impl PassHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Index into the graph's pass table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Kind of work a pass performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Rasterization work inside a render pass.
    Graphics,
    /// Compute dispatches.
    Compute,
    /// Copy and blit work.
    Transfer,
}

/// Color attachment slot of a graphics pass.
#[derive(Debug, Clone, Copy)]
pub struct ColorAttachment {
    pub index: u32,
    pub resource: ResourceHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
}

/// Depth attachment of a graphics pass.
#[derive(Debug, Clone, Copy)]
pub struct DepthAttachment {
    pub resource: ResourceHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear: ClearValue,
}

/// Callback recording device work for one pass.
pub type PassCallback = Box<dyn FnMut(&mut PassContext<'_>)>;

/// Everything declared about a single pass.
pub struct PassDesc {
    pub(crate) name: String,
    pub(crate) kind: PassKind,
    pub(crate) queue: QueueClass,
    pub(crate) reads: Vec<PassAccess>,
    pub(crate) writes: Vec<PassAccess>,
    pub(crate) color_attachments: Vec<ColorAttachment>,
    pub(crate) depth_attachment: Option<DepthAttachment>,
    pub(crate) callback: PassCallback,
}

impl PassDesc {
    pub(crate) fn new(name: String, kind: PassKind, callback: PassCallback) -> Self {
        Self {
            name,
            kind,
            queue: QueueClass::Graphics,
            reads: Vec::new(),
            writes: Vec::new(),
            color_attachments: Vec::new(),
            depth_attachment: None,
            callback,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn queue(&self) -> QueueClass {
        self.queue
    }

    /// All declared accesses, reads then writes.
    pub fn accesses(&self) -> impl Iterator<Item = &PassAccess> {
        self.reads.iter().chain(self.writes.iter())
    }
}

impl fmt::Debug for PassDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassDesc")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("queue", &self.queue)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

/// Per-frame context passed to pass callbacks.
///
/// Gives access to the device for command recording and resolves logical
/// resource handles to the physical objects backing them this frame.
pub struct PassContext<'a> {
    pub(crate) device: &'a mut dyn RenderDevice,
    pub(crate) physical: &'a PhysicalTable,
    pub(crate) frame_index: u64,
    pub(crate) delta_time: f32,
    pub(crate) extent: Extent2d,
}

impl PassContext<'_> {
    /// The device to record commands into.
    pub fn device(&mut self) -> &mut dyn RenderDevice {
        &mut *self.device
    }

    /// Monotonic frame counter.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Seconds since the previous frame.
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Render extent the graph was compiled for.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Device image backing a logical resource this frame.
    pub fn image(&self, resource: ResourceHandle) -> Option<ImageHandle> {
        self.physical.image(resource)
    }

    /// View over the image backing a logical resource.
    pub fn image_view(&self, resource: ResourceHandle) -> Option<ImageViewHandle> {
        self.physical.image_view(resource)
    }

    /// Format of the image backing a logical resource.
    pub fn image_format(&self, resource: ResourceHandle) -> Option<TextureFormat> {
        self.physical.image_format(resource)
    }

    /// Pixel extent of the image backing a logical resource.
    pub fn image_extent(&self, resource: ResourceHandle) -> Option<Extent2d> {
        self.physical.image_extent(resource)
    }

    /// Device buffer backing a logical resource this frame.
    pub fn buffer(&self, resource: ResourceHandle) -> Option<BufferHandle> {
        self.physical.buffer(resource)
    }
}
