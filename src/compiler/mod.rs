//! Graph compilation: ordering, barrier synthesis, and allocation.
//!
//! Compilation is a pipeline over the recorded declarations:
//!
//! 1. Validate that every access names a declared resource.
//! 2. Extract dependency edges from shared-resource accesses.
//! 3. Order passes topologically, detecting cycles.
//! 4. Walk each resource's access timeline, merging read runs and
//!    emitting the minimal barrier set.
//! 5. Back transient resources with aliased device memory.
//!
//! The result is an immutable [`CompiledGraph`] the executor replays every
//! frame without further analysis.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::mem;

use crate::barrier::{needs_barrier, needs_queue_transfer, BarrierBatch, BufferBarrier, ImageBarrier};
use crate::device::{BufferCreateInfo, ImageCreateInfo, RenderDevice};
use crate::error::CompileError;
use crate::graph::{ExternalResource, PassDesc, PassHandle, ResourceHandle, ResourceKind};
use crate::graph::resource::ResourceDecl;
use crate::state::{ImageLayout, ResourceState};
use crate::types::{BufferUsage, Extent2d, TextureUsage};

pub(crate) mod alloc;

pub(crate) use alloc::{PhysicalSlot, PhysicalTable};

use alloc::{TransientKind, TransientRequest};

// ============================================================================
// Lifetime
// ============================================================================

/// Span of execution positions during which a resource is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    /// Position of the first pass touching the resource.
    pub first_use: usize,
    /// Position of the last pass touching the resource.
    pub last_use: usize,
}

impl ResourceLifetime {
    /// Returns true if the two spans share any position.
    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.last_use < other.first_use || self.first_use > other.last_use)
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Summary counters produced by compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStats {
    /// Number of scheduled passes.
    pub pass_count: usize,
    /// Barriers transitioning away from a defined state.
    pub barrier_count: usize,
    /// Barriers transitioning out of `Undefined`, i.e. first touches.
    pub init_barrier_count: usize,
    /// Barriers in the end-of-frame batch.
    pub final_barrier_count: usize,
    /// Queue ownership transfers (each counts its release/acquire pair once).
    pub queue_transfer_count: usize,
    /// Number of transient resources.
    pub transient_count: usize,
    /// Bytes transients would need without aliasing.
    pub transient_bytes: u64,
    /// Bytes actually allocated after aliasing.
    pub allocated_bytes: u64,
    /// Number of memory regions backing the transients.
    pub region_count: usize,
}

// ============================================================================
// Compiled Graph
// ============================================================================

/// A pass with its synchronization resolved.
#[derive(Debug)]
pub struct CompiledPass {
    pub(crate) handle: PassHandle,
    pub(crate) desc: PassDesc,
    pub(crate) pre_barriers: BarrierBatch,
    pub(crate) post_barriers: BarrierBatch,
}

impl CompiledPass {
    /// Handle of the pass as declared.
    pub fn handle(&self) -> PassHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        self.desc.name()
    }

    /// Barriers submitted before the pass executes.
    pub fn pre_barriers(&self) -> &BarrierBatch {
        &self.pre_barriers
    }

    /// Barriers submitted after the pass, e.g. queue releases.
    pub fn post_barriers(&self) -> &BarrierBatch {
        &self.post_barriers
    }
}

/// Immutable result of a successful compilation.
///
/// Holds the scheduled passes in execution order, every barrier batch, and
/// the physical resources backing the graph. Executing a frame replays
/// this structure without re-running any analysis.
#[derive(Debug)]
pub struct CompiledGraph {
    pub(crate) passes: Vec<CompiledPass>,
    pub(crate) order: Vec<PassHandle>,
    pub(crate) final_barriers: BarrierBatch,
    pub(crate) physical: PhysicalTable,
    pub(crate) lifetimes: Vec<Option<ResourceLifetime>>,
    pub(crate) resource_names: Vec<String>,
    pub(crate) backbuffer: Option<ResourceHandle>,
    pub(crate) extent: Extent2d,
    pub(crate) stats: GraphStats,
}

impl CompiledGraph {
    /// Pass handles in execution order.
    pub fn pass_order(&self) -> &[PassHandle] {
        &self.order
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Compiled passes in execution order.
    pub fn passes(&self) -> impl Iterator<Item = &CompiledPass> {
        self.passes.iter()
    }

    /// Barriers submitted after the last pass.
    pub fn final_barriers(&self) -> &BarrierBatch {
        &self.final_barriers
    }

    /// Lifetime of a resource, if it is used by any pass.
    pub fn lifetime(&self, resource: ResourceHandle) -> Option<ResourceLifetime> {
        self.lifetimes.get(resource.index()).copied().flatten()
    }

    /// Index of the memory region backing a transient resource.
    ///
    /// Two transients alias iff they report the same region.
    pub fn memory_region(&self, resource: ResourceHandle) -> Option<usize> {
        self.physical.region_of(resource)
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Render extent the graph was compiled against.
    pub fn render_extent(&self) -> Extent2d {
        self.extent
    }

    /// Destroy all device objects owned by this graph.
    pub(crate) fn release(&mut self, device: &mut dyn RenderDevice) {
        self.physical.release(device);
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile recorded declarations into an executable graph.
pub(crate) fn compile(
    resources: Vec<ResourceDecl>,
    passes: Vec<PassDesc>,
    extent: Extent2d,
    backbuffer: Option<ResourceHandle>,
    device: &mut dyn RenderDevice,
) -> Result<CompiledGraph, CompileError> {
    log::debug!(
        "compiling graph: {} passes, {} resources",
        passes.len(),
        resources.len()
    );

    validate_handles(&resources, &passes)?;

    let accesses = collect_accesses(&resources, &passes);
    let adjacency = extract_dependencies(&resources, &passes, &accesses);
    let order = topo_sort(&passes, &adjacency)?;

    // Execution position of each pass, by declaration index.
    let mut position = vec![0usize; passes.len()];
    for (pos, &pass_index) in order.iter().enumerate() {
        position[pass_index] = pos;
    }

    let lifetimes = compute_lifetimes(&resources, &accesses, &position, passes.len());

    // Walk each resource's timeline and emit barriers.
    let mut pre_batches: Vec<BarrierBatch> = (0..passes.len()).map(|_| BarrierBatch::new()).collect();
    let mut post_batches: Vec<BarrierBatch> = (0..passes.len()).map(|_| BarrierBatch::new()).collect();
    let mut final_batch = BarrierBatch::new();
    let mut stats = GraphStats::default();

    for (resource_index, decl) in resources.iter().enumerate() {
        let list = &accesses[resource_index];
        if list.is_empty() {
            continue;
        }
        let handle = ResourceHandle::new(resource_index as u32);
        let is_image = decl.kind() == ResourceKind::Image;

        let mut ordered = list.clone();
        ordered.sort_by_key(|&(pass_index, _, _)| position[pass_index]);

        let mut current = decl.initial_state();
        if !is_image {
            current.layout = ImageLayout::Undefined;
        }
        let mut last_pos: Option<usize> = None;
        for (index, &(pass_index, state, is_write)) in ordered.iter().enumerate() {
            let pos = position[pass_index];
            let mergeable = !current.is_write()
                && !is_write
                && current.layout == state.layout
                && (current.queue.is_none() || current.queue == state.queue);
            if mergeable {
                // Extend the read run; one earlier barrier covers it.
                current.merge_read(state);
            } else if needs_barrier(&current, &state) {
                // A transition into a read run is the only barrier the run
                // gets, so its destination must union the scopes of every
                // reader that will merge behind this one.
                let mut target = state;
                if !is_write {
                    for &(_, next_state, next_write) in &ordered[index + 1..] {
                        if next_write
                            || next_state.layout != target.layout
                            || next_state.queue != target.queue
                        {
                            break;
                        }
                        target.merge_read(next_state);
                    }
                }
                if needs_queue_transfer(&current, &target) {
                    // Release after the previous owner's pass, acquire
                    // before the new owner's.
                    if let Some(last) = last_pos {
                        add_barrier(&mut post_batches[last], handle, is_image, current, target);
                    }
                    add_barrier(&mut pre_batches[pos], handle, is_image, current, target);
                    stats.queue_transfer_count += 1;
                } else {
                    add_barrier(&mut pre_batches[pos], handle, is_image, current, target);
                    if current.layout == ImageLayout::Undefined {
                        stats.init_barrier_count += 1;
                    } else {
                        stats.barrier_count += 1;
                    }
                }
                current = target;
            } else {
                current = state;
            }
            last_pos = Some(pos);
        }

        if let Some(mut final_state) = decl.final_state() {
            if !is_image {
                final_state.layout = ImageLayout::Undefined;
            }
            if needs_barrier(&current, &final_state) {
                add_barrier(&mut final_batch, handle, is_image, current, final_state);
                stats.final_barrier_count += 1;
            }
        }
    }

    // Back transients with device memory.
    let (image_usage, buffer_usage) = derive_usages(&resources, &passes);
    let mut requests = Vec::new();
    for (index, decl) in resources.iter().enumerate() {
        let lifetime = match lifetimes[index] {
            Some(lifetime) => lifetime,
            None => continue,
        };
        match decl {
            ResourceDecl::TransientImage {
                name,
                desc,
                non_aliasable,
            } => requests.push(TransientRequest {
                resource: index,
                name: name.clone(),
                kind: TransientKind::Image(ImageCreateInfo {
                    label: desc.label.clone().or_else(|| Some(name.clone())),
                    extent: desc.size.resolve(extent),
                    format: desc.format,
                    mip_levels: desc.mip_levels,
                    usage: desc.usage | image_usage[index],
                }),
                lifetime,
                non_aliasable: *non_aliasable,
            }),
            ResourceDecl::TransientBuffer {
                name,
                desc,
                non_aliasable,
            } => requests.push(TransientRequest {
                resource: index,
                name: name.clone(),
                kind: TransientKind::Buffer(BufferCreateInfo {
                    label: desc.label.clone().or_else(|| Some(name.clone())),
                    size: desc.size,
                    usage: desc.usage | buffer_usage[index],
                }),
                lifetime,
                non_aliasable: *non_aliasable,
            }),
            _ => {}
        }
    }
    stats.transient_count = requests.len();
    let (mut physical, transient_bytes) = alloc::allocate(device, resources.len(), requests)?;

    // Imported objects occupy unowned slots. The backbuffer slot stays
    // empty until a swapchain image is bound for the frame.
    for (index, decl) in resources.iter().enumerate() {
        if let ResourceDecl::External { resource, .. } = decl {
            physical.slots[index] = Some(match resource {
                ExternalResource::Image {
                    image,
                    view,
                    format,
                    extent,
                    ..
                } => PhysicalSlot::Image {
                    image: *image,
                    view: *view,
                    format: *format,
                    extent: *extent,
                    owned: false,
                },
                ExternalResource::Buffer { buffer, size, .. } => PhysicalSlot::Buffer {
                    buffer: *buffer,
                    size: *size,
                    owned: false,
                },
            });
        }
    }

    // Move pass descriptors into execution order.
    let mut slots: Vec<Option<PassDesc>> = passes.into_iter().map(Some).collect();
    let mut compiled_passes = Vec::with_capacity(order.len());
    let mut pass_order = Vec::with_capacity(order.len());
    for (pos, &pass_index) in order.iter().enumerate() {
        if let Some(desc) = slots[pass_index].take() {
            let handle = PassHandle::new(pass_index as u32);
            compiled_passes.push(CompiledPass {
                handle,
                desc,
                pre_barriers: mem::take(&mut pre_batches[pos]),
                post_barriers: mem::take(&mut post_batches[pos]),
            });
            pass_order.push(handle);
        }
    }

    stats.pass_count = compiled_passes.len();
    stats.transient_bytes = transient_bytes;
    stats.allocated_bytes = physical.allocated_bytes();
    stats.region_count = physical.region_count();

    log::info!(
        "compiled graph: {} passes, {} transients in {} regions ({}/{} bytes), \
         {} barriers + {} init + {} final, {} queue transfers",
        stats.pass_count,
        stats.transient_count,
        stats.region_count,
        stats.allocated_bytes,
        stats.transient_bytes,
        stats.barrier_count,
        stats.init_barrier_count,
        stats.final_barrier_count,
        stats.queue_transfer_count
    );

    let resource_names = resources.iter().map(|d| d.name().to_string()).collect();

    Ok(CompiledGraph {
        passes: compiled_passes,
        order: pass_order,
        final_barriers: final_batch,
        physical,
        lifetimes,
        resource_names,
        backbuffer,
        extent,
        stats,
    })
}

// ============================================================================
// Pipeline Steps
// ============================================================================

fn validate_handles(resources: &[ResourceDecl], passes: &[PassDesc]) -> Result<(), CompileError> {
    for pass in passes {
        for access in pass.accesses() {
            if access.resource.index() >= resources.len() {
                return Err(CompileError::UnknownResource {
                    pass: pass.name().to_string(),
                    handle: access.resource,
                });
            }
        }
    }
    Ok(())
}

/// Per-resource access timeline: (pass index, required state, is write).
///
/// Multiple accesses of one resource by the same pass collapse to a single
/// entry with unioned scopes; the builder already rejected conflicting
/// layouts at declaration time. Buffer states are normalized to `Undefined`
/// layout since buffers have none, so e.g. a storage read and a uniform
/// read of one buffer never fake a transition.
fn collect_accesses(
    resources: &[ResourceDecl],
    passes: &[PassDesc],
) -> Vec<Vec<(usize, ResourceState, bool)>> {
    let mut accesses: Vec<Vec<(usize, ResourceState, bool)>> = vec![Vec::new(); resources.len()];
    for (pass_index, pass) in passes.iter().enumerate() {
        for access in pass.accesses() {
            let mut state = access.state().on_queue(pass.queue());
            if resources[access.resource.index()].kind() == ResourceKind::Buffer {
                state.layout = ImageLayout::Undefined;
            }
            let list = &mut accesses[access.resource.index()];
            if let Some((last_pass, last_state, last_write)) = list.last_mut() {
                if *last_pass == pass_index {
                    debug_assert_eq!(
                        last_state.layout,
                        state.layout,
                        "pass '{}' uses '{}' with conflicting layouts",
                        pass.name(),
                        resources[access.resource.index()].name()
                    );
                    last_state.stages |= state.stages;
                    last_state.access |= state.access;
                    *last_write |= access.is_write();
                    continue;
                }
            }
            list.push((pass_index, state, access.is_write()));
        }
    }
    accesses
}

/// Usage flags each resource needs, unioned over all declared accesses.
fn derive_usages(
    resources: &[ResourceDecl],
    passes: &[PassDesc],
) -> (Vec<TextureUsage>, Vec<BufferUsage>) {
    let mut image_usage = vec![TextureUsage::empty(); resources.len()];
    let mut buffer_usage = vec![BufferUsage::empty(); resources.len()];
    for pass in passes {
        for access in pass.accesses() {
            let index = access.resource.index();
            image_usage[index] |= access.usage.image_usage();
            buffer_usage[index] |= access.usage.buffer_usage();
        }
    }
    (image_usage, buffer_usage)
}

/// Dependency edges between pass declaration indices.
///
/// Writers of a resource precede its readers regardless of declaration
/// position; multiple writers order among themselves by declaration.
/// Read-after-read imposes no ordering. Mutual feedback (each of two
/// passes reading what the other writes) therefore surfaces as a cycle
/// instead of silently picking a direction.
fn extract_dependencies(
    resources: &[ResourceDecl],
    passes: &[PassDesc],
    accesses: &[Vec<(usize, ResourceState, bool)>],
) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); passes.len()];
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for (resource_index, list) in accesses.iter().enumerate() {
        for a in 0..list.len() {
            for b in (a + 1)..list.len() {
                let (i, _, write_i) = list[a];
                let (j, _, write_j) = list[b];
                let (from, to) = match (write_i, write_j) {
                    (false, false) => continue,
                    (false, true) => (j, i),
                    _ => (i, j),
                };
                if seen.insert((from, to)) {
                    adjacency[from].push(to);
                    log::trace!(
                        "dependency: '{}' -> '{}' via '{}'",
                        passes[from].name(),
                        passes[to].name(),
                        resources[resource_index].name()
                    );
                }
            }
        }
    }
    adjacency
}

/// Kahn's algorithm with a min-heap over declaration indices, so ties
/// always break toward earlier declaration and the order is deterministic.
fn topo_sort(passes: &[PassDesc], adjacency: &[Vec<usize>]) -> Result<Vec<usize>, CompileError> {
    let mut in_degree = vec![0usize; passes.len()];
    for targets in adjacency {
        for &j in targets {
            in_degree[j] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(passes.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &j in &adjacency[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }

    if order.len() != passes.len() {
        let unscheduled = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree > 0)
            .map(|(i, _)| passes[i].name().to_string())
            .collect();
        return Err(CompileError::CycleDetected {
            passes: unscheduled,
        });
    }
    Ok(order)
}

/// Execution-position span of each resource.
///
/// Imported resources are considered live for the whole frame; only
/// transients get tight spans, which is what aliasing needs.
fn compute_lifetimes(
    resources: &[ResourceDecl],
    accesses: &[Vec<(usize, ResourceState, bool)>],
    position: &[usize],
    pass_count: usize,
) -> Vec<Option<ResourceLifetime>> {
    resources
        .iter()
        .enumerate()
        .map(|(index, decl)| {
            let list = &accesses[index];
            if list.is_empty() {
                if decl.is_transient() {
                    log::warn!(
                        "transient resource '{}' is declared but never used",
                        decl.name()
                    );
                } else if matches!(decl, ResourceDecl::Backbuffer { .. }) {
                    log::warn!("backbuffer slot '{}' is never written", decl.name());
                }
                return None;
            }
            if !decl.is_transient() {
                return Some(ResourceLifetime {
                    first_use: 0,
                    last_use: pass_count.saturating_sub(1),
                });
            }
            let mut first = usize::MAX;
            let mut last = 0;
            for &(pass_index, _, _) in list {
                let pos = position[pass_index];
                first = first.min(pos);
                last = last.max(pos);
            }
            Some(ResourceLifetime {
                first_use: first,
                last_use: last,
            })
        })
        .collect()
}

fn add_barrier(
    batch: &mut BarrierBatch,
    resource: ResourceHandle,
    is_image: bool,
    before: ResourceState,
    after: ResourceState,
) {
    if is_image {
        batch.add_image(ImageBarrier {
            resource,
            before,
            after,
        });
    } else {
        batch.add_buffer(BufferBarrier {
            resource,
            before,
            after,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DummyDevice;
    use crate::graph::{GraphBuilder, PassContext};
    use crate::state::{Access, PipelineStages, QueueClass, ResourceUsage};
    use crate::types::{TextureDescriptor, TextureFormat};

    fn noop(_: &mut PassContext<'_>) {}

    fn image(builder: &mut GraphBuilder, name: &str) -> ResourceHandle {
        builder.create_image(
            name,
            TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm),
        )
    }

    fn compile_builder(builder: GraphBuilder, device: &mut DummyDevice) -> Result<CompiledGraph, CompileError> {
        compile(
            builder.resources,
            builder.passes,
            Extent2d::new(64, 64),
            builder.backbuffer,
            device,
        )
    }

    #[test]
    fn test_empty_graph_compiles() {
        let mut device = DummyDevice::new();
        let compiled = compile_builder(GraphBuilder::new(), &mut device).unwrap();
        assert!(compiled.is_empty());
        assert_eq!(compiled.stats().pass_count, 0);
        assert!(compiled.final_barriers().is_empty());
    }

    #[test]
    fn test_linear_chain_keeps_order() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let a = image(&mut builder, "a");
        let b = image(&mut builder, "b");
        builder
            .add_compute_pass("produce", noop)
            .write(a, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("transform", noop)
            .read(a, ResourceUsage::StorageRead)
            .write(b, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("consume", noop)
            .read(b, ResourceUsage::StorageRead);
        let compiled = compile_builder(builder, &mut device).unwrap();
        let order: Vec<usize> = compiled.pass_order().iter().map(|h| h.index()).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_diamond_breaks_ties_by_declaration() {
        // a feeds both branches; branches join in the final pass. The two
        // branches are unordered relative to each other, so the heap must
        // schedule the earlier declaration first.
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let a = image(&mut builder, "a");
        let left = image(&mut builder, "left");
        let right = image(&mut builder, "right");
        builder
            .add_compute_pass("source", noop)
            .write(a, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("branch_l", noop)
            .read(a, ResourceUsage::StorageRead)
            .write(left, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("branch_r", noop)
            .read(a, ResourceUsage::StorageRead)
            .write(right, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("join", noop)
            .read(left, ResourceUsage::StorageRead)
            .read(right, ResourceUsage::StorageRead);
        let compiled = compile_builder(builder, &mut device).unwrap();
        let order: Vec<usize> = compiled.pass_order().iter().map(|h| h.index()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_independent_passes_keep_declaration_order() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let a = image(&mut builder, "a");
        let b = image(&mut builder, "b");
        builder
            .add_compute_pass("second", noop)
            .write(a, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("first", noop)
            .write(b, ResourceUsage::StorageWrite);
        let compiled = compile_builder(builder, &mut device).unwrap();
        let order: Vec<usize> = compiled.pass_order().iter().map(|h| h.index()).collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_cycle_is_detected_and_named() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let a = image(&mut builder, "a");
        let b = image(&mut builder, "b");
        builder
            .add_compute_pass("ping", noop)
            .read(b, ResourceUsage::StorageRead)
            .write(a, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("pong", noop)
            .read(a, ResourceUsage::StorageRead)
            .write(b, ResourceUsage::StorageWrite);
        let err = compile_builder(builder, &mut device).unwrap_err();
        match err {
            CompileError::CycleDetected { passes } => {
                assert!(passes.contains(&"ping".to_string()));
                assert!(passes.contains(&"pong".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_resource_is_reported() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let bogus = ResourceHandle::new(42);
        builder
            .add_compute_pass("broken", noop)
            .read(bogus, ResourceUsage::StorageRead);
        let err = compile_builder(builder, &mut device).unwrap_err();
        match err {
            CompileError::UnknownResource { pass, handle } => {
                assert_eq!(pass, "broken");
                assert_eq!(handle, bogus);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_only_chain_has_no_barriers_between_readers() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let tex = image(&mut builder, "tex");
        builder
            .add_compute_pass("produce", noop)
            .write(tex, ResourceUsage::StorageWrite);
        builder
            .add_graphics_pass("read_1", noop)
            .read(tex, ResourceUsage::SampledRead);
        builder
            .add_graphics_pass("read_2", noop)
            .read(tex, ResourceUsage::SampledRead);
        builder
            .add_graphics_pass("read_3", noop)
            .read(tex, ResourceUsage::SampledRead);
        let compiled = compile_builder(builder, &mut device).unwrap();
        // One barrier into General for the write, one into ShaderReadOnly
        // covering the whole read run. Readers 2 and 3 get nothing.
        let barrier_counts: Vec<usize> = compiled.passes().map(|p| p.pre_barriers().len()).collect();
        assert_eq!(barrier_counts, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_write_then_read_barrier_states() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let tex = image(&mut builder, "tex");
        builder
            .add_graphics_pass("draw", noop)
            .write(tex, ResourceUsage::ColorWrite);
        builder
            .add_graphics_pass("sample", noop)
            .read(tex, ResourceUsage::SampledRead);
        let compiled = compile_builder(builder, &mut device).unwrap();
        let sample = compiled.passes.iter().find(|p| p.name() == "sample").unwrap();
        assert_eq!(sample.pre_barriers().len(), 1);
        let barrier = sample.pre_barriers().image_barriers()[0];
        assert_eq!(barrier.before.layout, ImageLayout::ColorAttachment);
        assert!(barrier.before.is_write());
        assert_eq!(barrier.after.layout, ImageLayout::ShaderReadOnly);
        assert_eq!(compiled.stats().barrier_count, 1);
        assert_eq!(compiled.stats().init_barrier_count, 1);
    }

    #[test]
    fn test_lifetimes_span_first_to_last_use() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let a = image(&mut builder, "a");
        let b = image(&mut builder, "b");
        builder
            .add_compute_pass("p0", noop)
            .write(a, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("p1", noop)
            .read(a, ResourceUsage::StorageRead)
            .write(b, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("p2", noop)
            .read(b, ResourceUsage::StorageRead);
        let compiled = compile_builder(builder, &mut device).unwrap();
        assert_eq!(
            compiled.lifetime(a),
            Some(ResourceLifetime {
                first_use: 0,
                last_use: 1
            })
        );
        assert_eq!(
            compiled.lifetime(b),
            Some(ResourceLifetime {
                first_use: 1,
                last_use: 2
            })
        );
    }

    #[test]
    fn test_disjoint_transients_alias() {
        // a dies after p1; c is born in p1's successor. a and c can share
        // memory, b overlaps both and cannot.
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let a = image(&mut builder, "a");
        let b = image(&mut builder, "b");
        let c = image(&mut builder, "c");
        builder
            .add_compute_pass("p0", noop)
            .write(a, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("p1", noop)
            .read(a, ResourceUsage::StorageRead)
            .write(b, ResourceUsage::StorageWrite);
        builder
            .add_compute_pass("p2", noop)
            .read(b, ResourceUsage::StorageRead)
            .write(c, ResourceUsage::StorageWrite);
        let compiled = compile_builder(builder, &mut device).unwrap();
        assert_eq!(compiled.memory_region(a), compiled.memory_region(c));
        assert_ne!(compiled.memory_region(a), compiled.memory_region(b));
        assert_eq!(compiled.stats().region_count, 2);
        assert!(compiled.stats().allocated_bytes < compiled.stats().transient_bytes);
    }

    #[test]
    fn test_queue_transfer_emits_release_and_acquire() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let buf = builder.create_buffer("data", crate::types::BufferDescriptor::new(256));
        builder
            .add_compute_pass("prepare", noop)
            .write(buf, ResourceUsage::StorageWrite)
            .set_queue(QueueClass::Compute);
        builder
            .add_graphics_pass("consume", noop)
            .read(buf, ResourceUsage::StorageRead);
        let compiled = compile_builder(builder, &mut device).unwrap();
        assert_eq!(compiled.stats().queue_transfer_count, 1);

        let prepare = compiled.passes.iter().find(|p| p.name() == "prepare").unwrap();
        let consume = compiled.passes.iter().find(|p| p.name() == "consume").unwrap();
        // Release rides after the producer, acquire before the consumer,
        // with matching state pairs.
        assert_eq!(prepare.post_barriers().len(), 1);
        assert_eq!(consume.pre_barriers().len(), 1);
        let release = prepare.post_barriers().buffer_barriers()[0];
        let acquire = consume.pre_barriers().buffer_barriers()[0];
        assert_eq!(release, acquire);
        assert_eq!(release.before.queue, Some(QueueClass::Compute));
        assert_eq!(release.after.queue, Some(QueueClass::Graphics));
    }

    #[test]
    fn test_queue_transfer_into_read_run_carries_union() {
        // The release/acquire pair is the only synchronization the run
        // gets, so both sides must name every reader's scopes.
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let args = builder.create_buffer("args", crate::types::BufferDescriptor::new(256));
        builder
            .add_compute_pass("cull", noop)
            .write(args, ResourceUsage::StorageWrite)
            .set_queue(QueueClass::Compute);
        builder
            .add_graphics_pass("indirect_draw", noop)
            .read(args, ResourceUsage::IndirectArgs);
        builder
            .add_graphics_pass("instance_draw", noop)
            .read(args, ResourceUsage::VertexBuffer);
        let compiled = compile_builder(builder, &mut device).unwrap();
        assert_eq!(compiled.stats().queue_transfer_count, 1);

        let cull = compiled.passes.iter().find(|p| p.name() == "cull").unwrap();
        let draw = compiled.passes.iter().find(|p| p.name() == "indirect_draw").unwrap();
        let instances = compiled.passes.iter().find(|p| p.name() == "instance_draw").unwrap();
        assert!(instances.pre_barriers().is_empty());

        let release = cull.post_barriers().buffer_barriers()[0];
        let acquire = draw.pre_barriers().buffer_barriers()[0];
        assert_eq!(release, acquire);
        assert_eq!(release.before.queue, Some(QueueClass::Compute));
        assert_eq!(release.after.queue, Some(QueueClass::Graphics));
        assert!(release
            .after
            .stages
            .contains(PipelineStages::DRAW_INDIRECT | PipelineStages::VERTEX_INPUT));
        assert!(release
            .after
            .access
            .contains(Access::INDIRECT_READ | Access::VERTEX_ATTRIBUTE_READ));
    }

    #[test]
    fn test_backbuffer_final_barrier_targets_present() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let backbuffer = builder.import_backbuffer("backbuffer");
        builder
            .add_graphics_pass("blit", noop)
            .write(backbuffer, ResourceUsage::ColorWrite);
        let compiled = compile_builder(builder, &mut device).unwrap();
        assert_eq!(compiled.final_barriers().len(), 1);
        let barrier = compiled.final_barriers().image_barriers()[0];
        assert_eq!(barrier.before.layout, ImageLayout::ColorAttachment);
        assert_eq!(barrier.after.layout, ImageLayout::Present);
        assert_eq!(compiled.stats().final_barrier_count, 1);
    }

    #[test]
    fn test_relative_texture_resolves_against_render_extent() {
        let mut device = DummyDevice::new();
        let mut builder = GraphBuilder::new();
        let half = builder.create_image(
            "half_res",
            TextureDescriptor::relative(0.5, 0.5, TextureFormat::Rgba8Unorm),
        );
        builder
            .add_compute_pass("p", noop)
            .write(half, ResourceUsage::StorageWrite);
        let compiled = compile(
            builder.resources,
            builder.passes,
            Extent2d::new(128, 128),
            builder.backbuffer,
            &mut device,
        )
        .unwrap();
        // 64x64 at 4 bytes per pixel.
        assert_eq!(compiled.stats().allocated_bytes, 64 * 64 * 4);
    }
}
