//! Barrier predicates and batching.
//!
//! [`needs_barrier`] is the single decision point for whether two
//! consecutive states of a resource require synchronization. Barriers for
//! one submission point are collected into a [`BarrierBatch`] so they go
//! to the device as a single pipeline barrier command.

use crate::graph::ResourceHandle;
use crate::state::{PipelineStages, ResourceState};

// ============================================================================
// Predicates
// ============================================================================

/// Returns true if transitioning between these states requires a barrier.
///
/// Read-after-read never needs one. Everything else does: layout changes,
/// queue ownership transfers, and any hazard involving a write.
pub fn needs_barrier(before: &ResourceState, after: &ResourceState) -> bool {
    if needs_queue_transfer(before, after) {
        return true;
    }
    if before.layout != after.layout {
        return true;
    }
    before.is_write() || after.is_write()
}

/// Returns true if the states live on different queues.
///
/// A transfer is only required when both sides are pinned; an unpinned
/// side means the resource has not entered the frame yet.
pub fn needs_queue_transfer(before: &ResourceState, after: &ResourceState) -> bool {
    match (before.queue, after.queue) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

// ============================================================================
// Barriers
// ============================================================================

/// State transition of an image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub resource: ResourceHandle,
    pub before: ResourceState,
    pub after: ResourceState,
}

/// State transition of a buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub resource: ResourceHandle,
    pub before: ResourceState,
    pub after: ResourceState,
}

// ============================================================================
// Barrier Batch
// ============================================================================

/// All barriers submitted at one point in the command stream.
///
/// Stage masks are the union over contained barriers, matching what a
/// single device pipeline barrier command expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierBatch {
    image_barriers: Vec<ImageBarrier>,
    buffer_barriers: Vec<BufferBarrier>,
    src_stages: PipelineStages,
    dst_stages: PipelineStages,
}

impl Default for BarrierBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl BarrierBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self {
            image_barriers: Vec::new(),
            buffer_barriers: Vec::new(),
            src_stages: PipelineStages::empty(),
            dst_stages: PipelineStages::empty(),
        }
    }

    /// Add an image barrier. A barrier already present for the same
    /// resource is replaced.
    pub fn add_image(&mut self, barrier: ImageBarrier) {
        if let Some(existing) = self
            .image_barriers
            .iter_mut()
            .find(|b| b.resource == barrier.resource)
        {
            *existing = barrier;
            self.recompute_stages();
        } else {
            self.src_stages |= barrier.before.stages;
            self.dst_stages |= barrier.after.stages;
            self.image_barriers.push(barrier);
        }
    }

    /// Add a buffer barrier. A barrier already present for the same
    /// resource is replaced.
    pub fn add_buffer(&mut self, barrier: BufferBarrier) {
        if let Some(existing) = self
            .buffer_barriers
            .iter_mut()
            .find(|b| b.resource == barrier.resource)
        {
            *existing = barrier;
            self.recompute_stages();
        } else {
            self.src_stages |= barrier.before.stages;
            self.dst_stages |= barrier.after.stages;
            self.buffer_barriers.push(barrier);
        }
    }

    fn recompute_stages(&mut self) {
        self.src_stages = PipelineStages::empty();
        self.dst_stages = PipelineStages::empty();
        for barrier in &self.image_barriers {
            self.src_stages |= barrier.before.stages;
            self.dst_stages |= barrier.after.stages;
        }
        for barrier in &self.buffer_barriers {
            self.src_stages |= barrier.before.stages;
            self.dst_stages |= barrier.after.stages;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.image_barriers.is_empty() && self.buffer_barriers.is_empty()
    }

    /// Total number of barriers in the batch.
    pub fn len(&self) -> usize {
        self.image_barriers.len() + self.buffer_barriers.len()
    }

    pub fn image_barriers(&self) -> &[ImageBarrier] {
        &self.image_barriers
    }

    pub fn buffer_barriers(&self) -> &[BufferBarrier] {
        &self.buffer_barriers
    }

    pub fn src_stages(&self) -> PipelineStages {
        self.src_stages
    }

    pub fn dst_stages(&self) -> PipelineStages {
        self.dst_stages
    }

    /// Remove all barriers.
    pub fn clear(&mut self) {
        self.image_barriers.clear();
        self.buffer_barriers.clear();
        self.src_stages = PipelineStages::empty();
        self.dst_stages = PipelineStages::empty();
    }
}

// ============================================================================
// Tests
// ============================================================================
