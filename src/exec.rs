//! Frame execution: replaying a compiled graph against a device.

use crate::barrier::BarrierBatch;
use crate::compiler::{CompiledGraph, PhysicalSlot, PhysicalTable};
use crate::device::{
    BufferBarrierCmd, ColorTarget, DepthTarget, ImageBarrierCmd, ImageHandle, ImageViewHandle,
    RenderDevice, RenderPassTarget,
};
use crate::error::ExecuteError;
use crate::graph::{PassContext, PassDesc, PassKind};
use crate::types::{Extent2d, TextureFormat};

/// Swapchain image bound for the current frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackbufferBinding {
    pub image: ImageHandle,
    pub view: ImageViewHandle,
    pub format: TextureFormat,
    pub extent: Extent2d,
}

/// Record one frame of the compiled graph into the device.
///
/// Rebinds the backbuffer slot, then walks passes in compiled order:
/// pre-pass barriers, render pass bracketing for graphics passes, the
/// pass callback, post-pass barriers. Ends with the final barrier batch.
pub(crate) fn execute_frame(
    compiled: &mut CompiledGraph,
    device: &mut dyn RenderDevice,
    backbuffer: Option<&BackbufferBinding>,
    frame_index: u64,
    delta_time: f32,
) -> Result<(), ExecuteError> {
    if let Some(slot) = compiled.backbuffer {
        let binding = match backbuffer {
            Some(binding) => binding,
            None => {
                return Err(ExecuteError::BackbufferNotBound {
                    slot: compiled.resource_names[slot.index()].clone(),
                });
            }
        };
        if binding.extent != compiled.extent {
            log::warn!(
                "backbuffer extent {}x{} differs from compiled extent {}x{}; recompile after resize",
                binding.extent.width,
                binding.extent.height,
                compiled.extent.width,
                compiled.extent.height
            );
        }
        compiled.physical.slots[slot.index()] = Some(PhysicalSlot::Image {
            image: binding.image,
            view: binding.view,
            format: binding.format,
            extent: binding.extent,
            owned: false,
        });
    }

    log::trace!(
        "executing frame {frame_index}: {} passes",
        compiled.passes.len()
    );

    let CompiledGraph {
        passes,
        physical,
        final_barriers,
        extent,
        ..
    } = compiled;
    let extent = *extent;

    for compiled_pass in passes.iter_mut() {
        flush_barriers(device, &compiled_pass.pre_barriers, physical);

        let is_graphics = compiled_pass.desc.kind() == PassKind::Graphics;
        if is_graphics {
            let target = render_pass_target(&compiled_pass.desc, physical, extent);
            device.cmd_begin_render_pass(&target);
        }

        let mut context = PassContext {
            device: &mut *device,
            physical: &*physical,
            frame_index,
            delta_time,
            extent,
        };
        (compiled_pass.desc.callback)(&mut context);

        if is_graphics {
            device.cmd_end_render_pass();
        }

        flush_barriers(device, &compiled_pass.post_barriers, physical);
    }

    flush_barriers(device, final_barriers, physical);
    Ok(())
}

/// Resolve a barrier batch to device handles and submit it.
///
/// Resolution happens per frame because the backbuffer slot is rebound
/// every frame; barriers on unresolved slots are dropped.
fn flush_barriers(device: &mut dyn RenderDevice, batch: &BarrierBatch, physical: &PhysicalTable) {
    if batch.is_empty() {
        return;
    }
    let mut images = Vec::with_capacity(batch.image_barriers().len());
    for barrier in batch.image_barriers() {
        if let Some(image) = physical.image(barrier.resource) {
            images.push(ImageBarrierCmd {
                image,
                before: barrier.before,
                after: barrier.after,
            });
        }
    }
    let mut buffers = Vec::with_capacity(batch.buffer_barriers().len());
    for barrier in batch.buffer_barriers() {
        if let Some(buffer) = physical.buffer(barrier.resource) {
            buffers.push(BufferBarrierCmd {
                buffer,
                before: barrier.before,
                after: barrier.after,
            });
        }
    }
    if images.is_empty() && buffers.is_empty() {
        return;
    }
    device.cmd_pipeline_barrier(batch.src_stages(), batch.dst_stages(), &images, &buffers);
}

/// Build the render pass binding for a graphics pass.
///
/// Attachments are bound in slot order; the pass extent follows the first
/// resolvable attachment, falling back to the render extent.
fn render_pass_target(
    desc: &PassDesc,
    physical: &PhysicalTable,
    fallback: Extent2d,
) -> RenderPassTarget {
    let mut attachments = desc.color_attachments.clone();
    attachments.sort_by_key(|a| a.index);

    let mut target = RenderPassTarget {
        label: Some(desc.name().to_string()),
        colors: Vec::with_capacity(attachments.len()),
        depth: None,
        extent: fallback,
    };
    let mut extent_set = false;

    for attachment in &attachments {
        if let Some(view) = physical.image_view(attachment.resource) {
            if !extent_set {
                if let Some(extent) = physical.image_extent(attachment.resource) {
                    target.extent = extent;
                    extent_set = true;
                }
            }
            target.colors.push(ColorTarget {
                view,
                load_op: attachment.load_op,
                store_op: attachment.store_op,
                clear: attachment.clear,
            });
        }
    }

    if let Some(depth) = &desc.depth_attachment {
        if let Some(view) = physical.image_view(depth.resource) {
            if !extent_set {
                if let Some(extent) = physical.image_extent(depth.resource) {
                    target.extent = extent;
                }
            }
            target.depth = Some(DepthTarget {
                view,
                load_op: depth.load_op,
                store_op: depth.store_op,
                clear: depth.clear,
            });
        }
    }

    target
}
