//! Pipeline stages, access masks, layouts, and the resource usage table.
//!
//! Every declared access maps to exactly one [`ResourceState`] through
//! [`ResourceUsage::state`]. The compiler never synthesizes states from
//! anywhere else, so barrier behavior is decided entirely by this table.

use bitflags::bitflags;

// ============================================================================
// Pipeline Stages
// ============================================================================

bitflags! {
    /// Pipeline stage mask for synchronization scopes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const DRAW_INDIRECT = 1 << 1;
        const VERTEX_INPUT = 1 << 2;
        const VERTEX_SHADER = 1 << 3;
        const FRAGMENT_SHADER = 1 << 4;
        const EARLY_FRAGMENT_TESTS = 1 << 5;
        const LATE_FRAGMENT_TESTS = 1 << 6;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        const COMPUTE_SHADER = 1 << 8;
        const TRANSFER = 1 << 9;
        const BOTTOM_OF_PIPE = 1 << 10;
    }
}

impl PipelineStages {
    /// All programmable shader stages.
    pub const ALL_SHADERS: Self = Self::VERTEX_SHADER
        .union(Self::FRAGMENT_SHADER)
        .union(Self::COMPUTE_SHADER);
}

// ============================================================================
// Access
// ============================================================================

bitflags! {
    /// Memory access mask for synchronization scopes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u32 {
        const INDIRECT_READ = 1 << 0;
        const INDEX_READ = 1 << 1;
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        const UNIFORM_READ = 1 << 3;
        const SHADER_READ = 1 << 4;
        const SHADER_WRITE = 1 << 5;
        const COLOR_ATTACHMENT_READ = 1 << 6;
        const COLOR_ATTACHMENT_WRITE = 1 << 7;
        const DEPTH_STENCIL_READ = 1 << 8;
        const DEPTH_STENCIL_WRITE = 1 << 9;
        const TRANSFER_READ = 1 << 10;
        const TRANSFER_WRITE = 1 << 11;
    }
}

impl Access {
    /// Union of all write accesses.
    pub const ANY_WRITE: Self = Self::SHADER_WRITE
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::DEPTH_STENCIL_WRITE)
        .union(Self::TRANSFER_WRITE);

    /// Returns true if the mask contains any write access.
    pub fn is_write(&self) -> bool {
        self.intersects(Self::ANY_WRITE)
    }
}

// ============================================================================
// Image Layout
// ============================================================================

/// Image memory layout.
///
/// Buffers have no layout; buffer states always carry [`ImageLayout::Undefined`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents undefined. Initial layout of every transient image.
    #[default]
    Undefined,
    /// General layout, required for storage image access.
    General,
    /// Optimal for color attachment output.
    ColorAttachment,
    /// Optimal for depth/stencil attachment output.
    DepthStencilAttachment,
    /// Optimal for depth/stencil reads.
    DepthStencilReadOnly,
    /// Optimal for sampled reads in shaders.
    ShaderReadOnly,
    /// Source of transfer operations.
    TransferSrc,
    /// Destination of transfer operations.
    TransferDst,
    /// Ready for presentation.
    Present,
}

// ============================================================================
// Queue Class
// ============================================================================

/// Logical queue a pass executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueClass {
    #[default]
    Graphics,
    Compute,
    Transfer,
}

// ============================================================================
// Resource State
// ============================================================================

/// Complete synchronization state of a resource at a point in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceState {
    /// Pipeline stages touching the resource.
    pub stages: PipelineStages,
    /// Access mask.
    pub access: Access,
    /// Image layout; `Undefined` for buffers.
    pub layout: ImageLayout,
    /// Owning queue, or `None` when not yet pinned to one.
    pub queue: Option<QueueClass>,
}

impl ResourceState {
    /// State of a resource that has never been touched.
    pub const UNDEFINED: Self = Self {
        stages: PipelineStages::TOP_OF_PIPE,
        access: Access::empty(),
        layout: ImageLayout::Undefined,
        queue: None,
    };

    /// Final state for presentation.
    pub const PRESENT: Self = Self {
        stages: PipelineStages::BOTTOM_OF_PIPE,
        access: Access::empty(),
        layout: ImageLayout::Present,
        queue: None,
    };

    /// Returns true if this state performs any write.
    pub fn is_write(&self) -> bool {
        self.access.is_write()
    }

    /// Pin the state to a queue.
    pub fn on_queue(mut self, queue: QueueClass) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Merge another read state into this one.
    ///
    /// Both states must agree on layout; stage and access masks are unioned
    /// so one barrier covers the whole run of readers.
    pub fn merge_read(&mut self, other: Self) {
        debug_assert_eq!(self.layout, other.layout);
        self.stages |= other.stages;
        self.access |= other.access;
        if self.queue.is_none() {
            self.queue = other.queue;
        }
    }
}

// ============================================================================
// Resource Usage
// ============================================================================

/// How a pass uses a resource.
///
/// Each variant maps to exactly one [`ResourceState`]; see [`Self::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceUsage {
    /// Sampled in a shader.
    SampledRead,
    /// Written as a color attachment.
    ColorWrite,
    /// Written as a depth/stencil attachment.
    DepthWrite,
    /// Read as a read-only depth/stencil attachment.
    DepthRead,
    /// Read as a storage image or buffer.
    StorageRead,
    /// Written as a storage image or buffer.
    StorageWrite,
    /// Source of a transfer operation.
    TransferSrc,
    /// Destination of a transfer operation.
    TransferDst,
    /// Bound as a vertex buffer.
    VertexBuffer,
    /// Bound as an index buffer.
    IndexBuffer,
    /// Bound as a uniform buffer.
    UniformBuffer,
    /// Supplies indirect draw or dispatch arguments.
    IndirectArgs,
}

impl ResourceUsage {
    /// All usage variants.
    pub const ALL: [Self; 12] = [
        Self::SampledRead,
        Self::ColorWrite,
        Self::DepthWrite,
        Self::DepthRead,
        Self::StorageRead,
        Self::StorageWrite,
        Self::TransferSrc,
        Self::TransferDst,
        Self::VertexBuffer,
        Self::IndexBuffer,
        Self::UniformBuffer,
        Self::IndirectArgs,
    ];

    /// The resource state this usage requires.
    ///
    /// Returned states carry `queue: None`; the compiler pins the queue of
    /// the declaring pass.
    pub fn state(&self) -> ResourceState {
        let (stages, access, layout) = match self {
            Self::SampledRead => (
                PipelineStages::ALL_SHADERS,
                Access::SHADER_READ,
                ImageLayout::ShaderReadOnly,
            ),
            Self::ColorWrite => (
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                Access::COLOR_ATTACHMENT_READ | Access::COLOR_ATTACHMENT_WRITE,
                ImageLayout::ColorAttachment,
            ),
            Self::DepthWrite => (
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
                Access::DEPTH_STENCIL_READ | Access::DEPTH_STENCIL_WRITE,
                ImageLayout::DepthStencilAttachment,
            ),
            Self::DepthRead => (
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
                Access::DEPTH_STENCIL_READ,
                ImageLayout::DepthStencilReadOnly,
            ),
            Self::StorageRead => (
                PipelineStages::ALL_SHADERS,
                Access::SHADER_READ,
                ImageLayout::General,
            ),
            Self::StorageWrite => (
                PipelineStages::ALL_SHADERS,
                Access::SHADER_READ | Access::SHADER_WRITE,
                ImageLayout::General,
            ),
            Self::TransferSrc => (
                PipelineStages::TRANSFER,
                Access::TRANSFER_READ,
                ImageLayout::TransferSrc,
            ),
            Self::TransferDst => (
                PipelineStages::TRANSFER,
                Access::TRANSFER_WRITE,
                ImageLayout::TransferDst,
            ),
            Self::VertexBuffer => (
                PipelineStages::VERTEX_INPUT,
                Access::VERTEX_ATTRIBUTE_READ,
                ImageLayout::Undefined,
            ),
            Self::IndexBuffer => (
                PipelineStages::VERTEX_INPUT,
                Access::INDEX_READ,
                ImageLayout::Undefined,
            ),
            Self::UniformBuffer => (
                PipelineStages::ALL_SHADERS,
                Access::UNIFORM_READ,
                ImageLayout::Undefined,
            ),
            Self::IndirectArgs => (
                PipelineStages::DRAW_INDIRECT,
                Access::INDIRECT_READ,
                ImageLayout::Undefined,
            ),
        };
        ResourceState {
            stages,
            access,
            layout,
            queue: None,
        }
    }

    /// Returns true if this usage writes the resource.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::ColorWrite | Self::DepthWrite | Self::StorageWrite | Self::TransferDst
        )
    }

    /// Returns true if this usage only reads the resource.
    pub fn is_read(&self) -> bool {
        !self.is_write()
    }

    /// Texture usage flags implied by this usage.
    pub fn image_usage(&self) -> super::types::TextureUsage {
        use super::types::TextureUsage;
        match self {
            Self::SampledRead => TextureUsage::SAMPLED,
            Self::ColorWrite => TextureUsage::COLOR_ATTACHMENT,
            Self::DepthWrite | Self::DepthRead => TextureUsage::DEPTH_STENCIL_ATTACHMENT,
            Self::StorageRead | Self::StorageWrite => TextureUsage::STORAGE,
            Self::TransferSrc => TextureUsage::TRANSFER_SRC,
            Self::TransferDst => TextureUsage::TRANSFER_DST,
            Self::VertexBuffer | Self::IndexBuffer | Self::UniformBuffer | Self::IndirectArgs => {
                TextureUsage::empty()
            }
        }
    }

    /// Buffer usage flags implied by this usage.
    pub fn buffer_usage(&self) -> super::types::BufferUsage {
        use super::types::BufferUsage;
        match self {
            Self::StorageRead | Self::StorageWrite => BufferUsage::STORAGE,
            Self::TransferSrc => BufferUsage::TRANSFER_SRC,
            Self::TransferDst => BufferUsage::TRANSFER_DST,
            Self::VertexBuffer => BufferUsage::VERTEX,
            Self::IndexBuffer => BufferUsage::INDEX,
            Self::UniformBuffer => BufferUsage::UNIFORM,
            Self::IndirectArgs => BufferUsage::INDIRECT,
            Self::SampledRead | Self::ColorWrite | Self::DepthWrite | Self::DepthRead => {
                BufferUsage::empty()
            }
        }
    }

    /// Returns true if this usage is valid on an image resource.
    pub fn valid_for_image(&self) -> bool {
        !matches!(
            self,
            Self::VertexBuffer | Self::IndexBuffer | Self::UniformBuffer | Self::IndirectArgs
        )
    }

    /// Returns true if this usage is valid on a buffer resource.
    pub fn valid_for_buffer(&self) -> bool {
        matches!(
            self,
            Self::StorageRead
                | Self::StorageWrite
                | Self::TransferSrc
                | Self::TransferDst
                | Self::VertexBuffer
                | Self::IndexBuffer
                | Self::UniformBuffer
                | Self::IndirectArgs
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
