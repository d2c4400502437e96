//! Buffer usage flags and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags describing how a buffer may be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be bound as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can supply indirect draw or dispatch arguments.
        const INDIRECT = 1 << 4;
        /// Buffer can be a source of transfer operations.
        const TRANSFER_SRC = 1 << 5;
        /// Buffer can be a destination of transfer operations.
        const TRANSFER_DST = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Description of a transient buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Optional debug label.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Extra usage flags beyond those derived from declared accesses.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a descriptor with the given size.
    pub fn new(size: u64) -> Self {
        Self {
            label: None,
            size,
            usage: BufferUsage::empty(),
        }
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add extra usage flags.
    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage |= usage;
        self
    }
}
