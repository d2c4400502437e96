//! Logical resource declarations.

use crate::device::{BufferHandle, ImageHandle, ImageViewHandle};
use crate::state::{PipelineStages, ResourceState, ResourceUsage};
use crate::types::{BufferDescriptor, Extent2d, TextureDescriptor, TextureFormat};

/// Handle to a logical resource declared on a graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub(crate) u32);

impl ResourceHandle {
    /// Create a handle from a raw index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Index into the graph's resource table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Kind of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Buffer,
}

/// A device object imported into the graph.
///
/// The graph synchronizes imported resources but never allocates or
/// destroys them; the caller keeps ownership.
#[derive(Debug, Clone)]
pub enum ExternalResource {
    Image {
        image: ImageHandle,
        view: ImageViewHandle,
        format: TextureFormat,
        extent: Extent2d,
        /// State the image is in when the frame starts.
        initial_state: ResourceState,
        /// State to transition to after the last use, if any.
        final_state: Option<ResourceState>,
    },
    Buffer {
        buffer: BufferHandle,
        size: u64,
        initial_state: ResourceState,
        final_state: Option<ResourceState>,
    },
}

/// Declaration of a logical resource.
#[derive(Debug, Clone)]
pub(crate) enum ResourceDecl {
    TransientImage {
        name: String,
        desc: TextureDescriptor,
        non_aliasable: bool,
    },
    TransientBuffer {
        name: String,
        desc: BufferDescriptor,
        non_aliasable: bool,
    },
    External {
        name: String,
        resource: ExternalResource,
    },
    /// Placeholder for the swapchain image, bound per frame.
    Backbuffer { name: String },
}

impl ResourceDecl {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::TransientImage { name, .. }
            | Self::TransientBuffer { name, .. }
            | Self::External { name, .. }
            | Self::Backbuffer { name } => name,
        }
    }

    pub(crate) fn kind(&self) -> ResourceKind {
        match self {
            Self::TransientImage { .. } | Self::Backbuffer { .. } => ResourceKind::Image,
            Self::TransientBuffer { .. } => ResourceKind::Buffer,
            Self::External { resource, .. } => match resource {
                ExternalResource::Image { .. } => ResourceKind::Image,
                ExternalResource::Buffer { .. } => ResourceKind::Buffer,
            },
        }
    }

    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientImage { .. } | Self::TransientBuffer { .. }
        )
    }

    /// State of the resource before its first use in the frame.
    pub(crate) fn initial_state(&self) -> ResourceState {
        match self {
            Self::External { resource, .. } => match resource {
                ExternalResource::Image { initial_state, .. }
                | ExternalResource::Buffer { initial_state, .. } => *initial_state,
            },
            _ => ResourceState::UNDEFINED,
        }
    }

    /// State the resource must end the frame in, if any.
    pub(crate) fn final_state(&self) -> Option<ResourceState> {
        match self {
            Self::External { resource, .. } => match resource {
                ExternalResource::Image { final_state, .. }
                | ExternalResource::Buffer { final_state, .. } => *final_state,
            },
            Self::Backbuffer { .. } => Some(ResourceState::PRESENT),
            _ => None,
        }
    }
}

/// One declared access of a pass to a resource.
#[derive(Debug, Clone, Copy)]
pub struct PassAccess {
    /// The resource being accessed.
    pub resource: ResourceHandle,
    /// How the pass uses it.
    pub usage: ResourceUsage,
    /// Stage override; `None` uses the stages from the usage table.
    pub stages: Option<PipelineStages>,
}

impl PassAccess {
    /// The resource state this access requires.
    pub fn state(&self) -> ResourceState {
        let mut state = self.usage.state();
        if let Some(stages) = self.stages {
            state.stages = stages;
        }
        state
    }

    /// Returns true if this access writes the resource.
    pub fn is_write(&self) -> bool {
        self.usage.is_write()
    }
}
