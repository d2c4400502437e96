//! Transient resource allocation and memory aliasing.
//!
//! Allocation runs in two halves: first every transient object is created
//! unbound and its memory requirements queried, then placements are planned
//! purely from requirements and lifetimes before any memory is allocated.
//! Two transients may share a region when their lifetimes are disjoint and
//! their acceptable memory kinds intersect. Any device failure rolls back
//! everything created so far.

use super::ResourceLifetime;
use crate::device::{
    BufferCreateInfo, BufferHandle, ImageCreateInfo, ImageHandle, ImageViewHandle, MemoryHandle,
    MemoryKinds, MemoryRequirements, RenderDevice,
};
use crate::error::CompileError;
use crate::graph::ResourceHandle;
use crate::types::{Extent2d, TextureFormat};

// ============================================================================
// Requests
// ============================================================================

/// Device object a transient resource needs.
#[derive(Debug, Clone)]
pub(crate) enum TransientKind {
    Image(ImageCreateInfo),
    Buffer(BufferCreateInfo),
}

/// One transient resource to back with device memory.
#[derive(Debug, Clone)]
pub(crate) struct TransientRequest {
    /// Index into the graph's resource table.
    pub resource: usize,
    pub name: String,
    pub kind: TransientKind,
    pub lifetime: ResourceLifetime,
    pub non_aliasable: bool,
}

// ============================================================================
// Physical Table
// ============================================================================

/// Physical object backing a logical resource.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PhysicalSlot {
    Image {
        image: ImageHandle,
        view: ImageViewHandle,
        format: TextureFormat,
        extent: Extent2d,
        /// Whether the graph owns and must destroy the object.
        owned: bool,
    },
    Buffer {
        buffer: BufferHandle,
        size: u64,
        owned: bool,
    },
}

/// One allocated memory region, possibly shared by several transients.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MemoryRegion {
    pub memory: MemoryHandle,
    pub size: u64,
}

/// Maps logical resources to the device objects backing them.
///
/// Indexed by resource handle. External resources get unowned slots; the
/// backbuffer slot stays empty until a swapchain image is bound for the
/// frame.
#[derive(Debug, Default)]
pub(crate) struct PhysicalTable {
    pub(crate) slots: Vec<Option<PhysicalSlot>>,
    regions: Vec<MemoryRegion>,
    region_of: Vec<Option<usize>>,
}

impl PhysicalTable {
    pub(crate) fn image(&self, resource: ResourceHandle) -> Option<ImageHandle> {
        match self.slots.get(resource.index())? {
            Some(PhysicalSlot::Image { image, .. }) => Some(*image),
            _ => None,
        }
    }

    pub(crate) fn image_view(&self, resource: ResourceHandle) -> Option<ImageViewHandle> {
        match self.slots.get(resource.index())? {
            Some(PhysicalSlot::Image { view, .. }) => Some(*view),
            _ => None,
        }
    }

    pub(crate) fn image_format(&self, resource: ResourceHandle) -> Option<TextureFormat> {
        match self.slots.get(resource.index())? {
            Some(PhysicalSlot::Image { format, .. }) => Some(*format),
            _ => None,
        }
    }

    pub(crate) fn image_extent(&self, resource: ResourceHandle) -> Option<Extent2d> {
        match self.slots.get(resource.index())? {
            Some(PhysicalSlot::Image { extent, .. }) => Some(*extent),
            _ => None,
        }
    }

    pub(crate) fn buffer(&self, resource: ResourceHandle) -> Option<BufferHandle> {
        match self.slots.get(resource.index())? {
            Some(PhysicalSlot::Buffer { buffer, .. }) => Some(*buffer),
            _ => None,
        }
    }

    /// Memory region index backing a transient resource.
    pub(crate) fn region_of(&self, resource: ResourceHandle) -> Option<usize> {
        self.region_of.get(resource.index()).copied().flatten()
    }

    pub(crate) fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Total bytes held by allocated regions.
    pub(crate) fn allocated_bytes(&self) -> u64 {
        self.regions.iter().map(|r| r.size).sum()
    }

    /// Destroy all owned objects and free all regions.
    pub(crate) fn release(&mut self, device: &mut dyn RenderDevice) {
        for slot in self.slots.drain(..).flatten() {
            match slot {
                PhysicalSlot::Image {
                    image, view, owned, ..
                } => {
                    if owned {
                        device.destroy_image_view(view);
                        device.destroy_image(image);
                    }
                }
                PhysicalSlot::Buffer { buffer, owned, .. } => {
                    if owned {
                        device.destroy_buffer(buffer);
                    }
                }
            }
        }
        for region in self.regions.drain(..) {
            device.free_memory(region.memory);
        }
        self.region_of.clear();
    }
}

// ============================================================================
// Allocation
// ============================================================================

enum CreatedObject {
    Image(ImageHandle),
    Buffer(BufferHandle),
}

struct Pending {
    req: TransientRequest,
    object: CreatedObject,
    mem: MemoryRequirements,
    region: usize,
}

struct RegionPlan {
    size: u64,
    alignment: u64,
    kinds: MemoryKinds,
    residents: Vec<usize>,
    dedicated: bool,
}

/// Create, place, and bind all transient resources.
///
/// Returns the physical table plus the total bytes the transients would
/// need without aliasing, for statistics.
pub(crate) fn allocate(
    device: &mut dyn RenderDevice,
    resource_count: usize,
    requests: Vec<TransientRequest>,
) -> Result<(PhysicalTable, u64), CompileError> {
    let mut pending: Vec<Pending> = Vec::with_capacity(requests.len());

    // Phase 1: create unbound objects and query requirements.
    for req in requests {
        let (object, mem) = match &req.kind {
            TransientKind::Image(info) => match device.create_image(info) {
                Ok(image) => (
                    CreatedObject::Image(image),
                    device.image_memory_requirements(image),
                ),
                Err(err) => {
                    rollback(device, &pending, &[], &[]);
                    return Err(CompileError::AllocationFailed {
                        resource: req.name,
                        source: err,
                    });
                }
            },
            TransientKind::Buffer(info) => match device.create_buffer(info) {
                Ok(buffer) => (
                    CreatedObject::Buffer(buffer),
                    device.buffer_memory_requirements(buffer),
                ),
                Err(err) => {
                    rollback(device, &pending, &[], &[]);
                    return Err(CompileError::AllocationFailed {
                        resource: req.name,
                        source: err,
                    });
                }
            },
        };
        pending.push(Pending {
            req,
            object,
            mem,
            region: 0,
        });
    }

    // Phase 2: plan region placement. First fit over lifetime-disjoint
    // regions, visiting resources in order of first use.
    let mut order: Vec<usize> = (0..pending.len()).collect();
    order.sort_by_key(|&i| (pending[i].req.lifetime.first_use, pending[i].req.resource));

    let mut plans: Vec<RegionPlan> = Vec::new();
    for &i in &order {
        let mut placed = None;
        if !pending[i].req.non_aliasable {
            'regions: for (ri, plan) in plans.iter_mut().enumerate() {
                if plan.dedicated || !plan.kinds.intersects(pending[i].mem.kinds) {
                    continue;
                }
                for &resident in &plan.residents {
                    if pending[resident]
                        .req
                        .lifetime
                        .overlaps(&pending[i].req.lifetime)
                    {
                        continue 'regions;
                    }
                }
                plan.size = plan.size.max(pending[i].mem.size);
                plan.alignment = plan.alignment.max(pending[i].mem.alignment);
                plan.kinds &= pending[i].mem.kinds;
                plan.residents.push(i);
                placed = Some(ri);
                break;
            }
        }
        let region = match placed {
            Some(ri) => ri,
            None => {
                plans.push(RegionPlan {
                    size: pending[i].mem.size,
                    alignment: pending[i].mem.alignment,
                    kinds: pending[i].mem.kinds,
                    residents: vec![i],
                    dedicated: pending[i].req.non_aliasable,
                });
                plans.len() - 1
            }
        };
        pending[i].region = region;
        log::trace!(
            "placed '{}' (lifetime {}..={}) in region {region}",
            pending[i].req.name,
            pending[i].req.lifetime.first_use,
            pending[i].req.lifetime.last_use
        );
    }

    // Phase 3: allocate planned regions.
    let mut regions: Vec<MemoryRegion> = Vec::with_capacity(plans.len());
    let mut created_views: Vec<ImageViewHandle> = Vec::new();
    for plan in &plans {
        match device.allocate_memory(plan.size, plan.alignment, plan.kinds) {
            Ok(memory) => regions.push(MemoryRegion {
                memory,
                size: plan.size,
            }),
            Err(err) => {
                let resource = pending[plan.residents[0]].req.name.clone();
                rollback(device, &pending, &regions, &created_views);
                return Err(CompileError::AllocationFailed {
                    resource,
                    source: err,
                });
            }
        }
    }

    // Phase 4: bind objects, create views, fill slots.
    let mut slots: Vec<Option<PhysicalSlot>> = vec![None; resource_count];
    let mut region_of: Vec<Option<usize>> = vec![None; resource_count];
    let mut transient_bytes = 0u64;
    for i in 0..pending.len() {
        let memory = regions[pending[i].region].memory;
        transient_bytes += pending[i].mem.size;
        match (&pending[i].object, &pending[i].req.kind) {
            (CreatedObject::Image(image), TransientKind::Image(info)) => {
                let image = *image;
                if let Err(err) = device.bind_image_memory(image, memory, 0) {
                    let resource = pending[i].req.name.clone();
                    rollback(device, &pending, &regions, &created_views);
                    return Err(CompileError::AllocationFailed {
                        resource,
                        source: err,
                    });
                }
                let view = match device.create_image_view(image, info.format) {
                    Ok(view) => view,
                    Err(err) => {
                        let resource = pending[i].req.name.clone();
                        rollback(device, &pending, &regions, &created_views);
                        return Err(CompileError::AllocationFailed {
                            resource,
                            source: err,
                        });
                    }
                };
                created_views.push(view);
                slots[pending[i].req.resource] = Some(PhysicalSlot::Image {
                    image,
                    view,
                    format: info.format,
                    extent: info.extent,
                    owned: true,
                });
            }
            (CreatedObject::Buffer(buffer), TransientKind::Buffer(info)) => {
                let buffer = *buffer;
                if let Err(err) = device.bind_buffer_memory(buffer, memory, 0) {
                    let resource = pending[i].req.name.clone();
                    rollback(device, &pending, &regions, &created_views);
                    return Err(CompileError::AllocationFailed {
                        resource,
                        source: err,
                    });
                }
                slots[pending[i].req.resource] = Some(PhysicalSlot::Buffer {
                    buffer,
                    size: info.size,
                    owned: true,
                });
            }
            // Created object kind always matches the request.
            _ => {}
        }
        region_of[pending[i].req.resource] = Some(pending[i].region);
    }

    Ok((
        PhysicalTable {
            slots,
            regions,
            region_of,
        },
        transient_bytes,
    ))
}

fn rollback(
    device: &mut dyn RenderDevice,
    pending: &[Pending],
    regions: &[MemoryRegion],
    views: &[ImageViewHandle],
) {
    for view in views {
        device.destroy_image_view(*view);
    }
    for p in pending {
        match p.object {
            CreatedObject::Image(image) => device.destroy_image(image),
            CreatedObject::Buffer(buffer) => device.destroy_buffer(buffer),
        }
    }
    for region in regions {
        device.free_memory(region.memory);
    }
}

// ============================================================================
// Tests
// ============================================================================
