//! Common types and descriptors for graph resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used by resource declarations and the device layer.

mod buffer;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use texture::{TextureDescriptor, TextureFormat, TextureSize, TextureUsage};

/// 2D extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Load operation for an attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Preserve the existing contents.
    Load,
    /// Clear to the attachment's clear value.
    #[default]
    Clear,
    /// Contents are undefined; cheapest when the pass overwrites everything.
    DontCare,
}

/// Store operation for an attachment at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write results back to memory.
    #[default]
    Store,
    /// Discard results; for attachments never read afterwards.
    Discard,
}

/// Clear value for render targets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearValue {
    /// No clear operation.
    #[default]
    None,
    /// Clear color attachment with RGBA values.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear depth attachment.
    Depth(f32),
    /// Clear depth and stencil attachments.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Create a color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Create a depth clear value.
    pub fn depth(value: f32) -> Self {
        Self::Depth(value)
    }
}
