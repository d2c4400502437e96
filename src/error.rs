//! Error types for graph compilation and execution.

use thiserror::Error;

use crate::device::DeviceError;
use crate::graph::ResourceHandle;

/// Errors produced by graph compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The declared accesses form a dependency cycle.
    #[error("dependency cycle through passes [{}]", passes.join(", "))]
    CycleDetected { passes: Vec<String> },

    /// A pass references a handle no declaration produced.
    #[error("pass '{pass}' references unknown resource handle {handle:?}")]
    UnknownResource {
        pass: String,
        handle: ResourceHandle,
    },

    /// The device could not back a transient resource.
    #[error("allocation for '{resource}' failed")]
    AllocationFailed {
        resource: String,
        #[source]
        source: DeviceError,
    },
}

/// Errors produced by frame execution.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("graph is not compiled")]
    NotCompiled,

    #[error("backbuffer slot '{slot}' is not bound; call set_backbuffer() first")]
    BackbufferNotBound { slot: String },
}
