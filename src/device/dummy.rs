//! GPU-less device backend for tests and headless runs.

use std::collections::HashMap;

use super::{
    BufferBarrierCmd, BufferCreateInfo, BufferHandle, DeviceError, ImageBarrierCmd,
    ImageCreateInfo, ImageHandle, ImageViewHandle, MemoryHandle, MemoryKinds, MemoryRequirements,
    RenderDevice, RenderPassTarget,
};
use crate::state::PipelineStages;
use crate::types::TextureFormat;

/// Command recorded by a [`DummyDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    PipelineBarrier {
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        images: Vec<ImageBarrierCmd>,
        buffers: Vec<BufferBarrierCmd>,
    },
    BeginRenderPass {
        label: Option<String>,
        color_count: usize,
        has_depth: bool,
    },
    EndRenderPass,
}

/// In-memory [`RenderDevice`] that tracks objects and records commands.
///
/// Tests inspect the recorded command stream and live-object counts to
/// verify compiler and executor behavior without a GPU. An optional
/// memory budget makes allocation failures reproducible.
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_handle: u64,
    images: HashMap<u64, ImageCreateInfo>,
    buffers: HashMap<u64, BufferCreateInfo>,
    views: HashMap<u64, u64>,
    memory: HashMap<u64, u64>,
    allocated: u64,
    budget: Option<u64>,
    commands: Vec<RecordedCommand>,
}

impl DummyDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit total allocated memory to `bytes`.
    pub fn with_memory_budget(bytes: u64) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::default()
        }
    }

    /// All commands recorded so far.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Total bytes currently allocated.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_views(&self) -> usize {
        self.views.len()
    }

    pub fn live_allocations(&self) -> usize {
        self.memory.len()
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// Byte size of an image including its mip chain.
fn image_byte_size(info: &ImageCreateInfo) -> u64 {
    let block = info.format.block_size() as u64;
    let mut total = 0u64;
    let mut width = info.extent.width.max(1) as u64;
    let mut height = info.extent.height.max(1) as u64;
    for _ in 0..info.mip_levels.max(1) {
        total += width * height * block;
        width = (width / 2).max(1);
        height = (height / 2).max(1);
    }
    total
}

impl RenderDevice for DummyDevice {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn create_image(&mut self, info: &ImageCreateInfo) -> Result<ImageHandle, DeviceError> {
        let handle = self.next();
        log::trace!(
            "DummyDevice: create_image {:?} ({}x{}, {:?})",
            info.label,
            info.extent.width,
            info.extent.height,
            info.format
        );
        self.images.insert(handle, info.clone());
        Ok(ImageHandle::new(handle))
    }

    fn create_buffer(&mut self, info: &BufferCreateInfo) -> Result<BufferHandle, DeviceError> {
        let handle = self.next();
        log::trace!(
            "DummyDevice: create_buffer {:?} ({} bytes)",
            info.label,
            info.size
        );
        self.buffers.insert(handle, info.clone());
        Ok(BufferHandle::new(handle))
    }

    fn image_memory_requirements(&self, image: ImageHandle) -> MemoryRequirements {
        let size = self
            .images
            .get(&image.raw())
            .map(image_byte_size)
            .unwrap_or(0);
        MemoryRequirements {
            size,
            alignment: 256,
            kinds: MemoryKinds::DEVICE_LOCAL,
        }
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements {
        let size = self.buffers.get(&buffer.raw()).map(|b| b.size).unwrap_or(0);
        MemoryRequirements {
            size,
            alignment: 256,
            kinds: MemoryKinds::DEVICE_LOCAL,
        }
    }

    fn allocate_memory(
        &mut self,
        size: u64,
        _alignment: u64,
        _kinds: MemoryKinds,
    ) -> Result<MemoryHandle, DeviceError> {
        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(self.allocated);
            if size > available {
                return Err(DeviceError::OutOfMemory {
                    requested: size,
                    available,
                });
            }
        }
        let handle = self.next();
        log::trace!("DummyDevice: allocate_memory {size} bytes");
        self.memory.insert(handle, size);
        self.allocated += size;
        Ok(MemoryHandle::new(handle))
    }

    fn bind_image_memory(
        &mut self,
        image: ImageHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError> {
        log::trace!(
            "DummyDevice: bind_image_memory image={} memory={} offset={offset}",
            image.raw(),
            memory.raw()
        );
        Ok(())
    }

    fn bind_buffer_memory(
        &mut self,
        buffer: BufferHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<(), DeviceError> {
        log::trace!(
            "DummyDevice: bind_buffer_memory buffer={} memory={} offset={offset}",
            buffer.raw(),
            memory.raw()
        );
        Ok(())
    }

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        _format: TextureFormat,
    ) -> Result<ImageViewHandle, DeviceError> {
        let handle = self.next();
        self.views.insert(handle, image.raw());
        Ok(ImageViewHandle::new(handle))
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        self.images.remove(&image.raw());
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.raw());
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        self.views.remove(&view.raw());
    }

    fn free_memory(&mut self, memory: MemoryHandle) {
        if let Some(size) = self.memory.remove(&memory.raw()) {
            self.allocated -= size;
        }
    }

    fn cmd_pipeline_barrier(
        &mut self,
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        image_barriers: &[ImageBarrierCmd],
        buffer_barriers: &[BufferBarrierCmd],
    ) {
        self.commands.push(RecordedCommand::PipelineBarrier {
            src_stages,
            dst_stages,
            images: image_barriers.to_vec(),
            buffers: buffer_barriers.to_vec(),
        });
    }

    fn cmd_begin_render_pass(&mut self, target: &RenderPassTarget) {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: target.label.clone(),
            color_count: target.colors.len(),
            has_depth: target.depth.is_some(),
        });
    }

    fn cmd_end_render_pass(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Extent2d;

    fn image_info(width: u32, height: u32) -> ImageCreateInfo {
        ImageCreateInfo {
            label: None,
            extent: Extent2d::new(width, height),
            format: TextureFormat::Rgba8Unorm,
            mip_levels: 1,
            usage: Default::default(),
        }
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut device = DummyDevice::with_memory_budget(1024);
        assert!(device.allocate_memory(512, 256, MemoryKinds::DEVICE_LOCAL).is_ok());
        let err = device
            .allocate_memory(1024, 256, MemoryKinds::DEVICE_LOCAL)
            .unwrap_err();
        match err {
            DeviceError::OutOfMemory { requested, available } => {
                assert_eq!(requested, 1024);
                assert_eq!(available, 512);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_live_object_tracking() {
        let mut device = DummyDevice::new();
        let image = device.create_image(&image_info(16, 16)).unwrap();
        let view = device
            .create_image_view(image, TextureFormat::Rgba8Unorm)
            .unwrap();
        let memory = device
            .allocate_memory(1024, 256, MemoryKinds::DEVICE_LOCAL)
            .unwrap();
        assert_eq!(device.live_images(), 1);
        assert_eq!(device.live_views(), 1);
        assert_eq!(device.allocated_bytes(), 1024);

        device.destroy_image_view(view);
        device.destroy_image(image);
        device.free_memory(memory);
        assert_eq!(device.live_images(), 0);
        assert_eq!(device.live_views(), 0);
        assert_eq!(device.allocated_bytes(), 0);
    }

    #[test]
    fn test_mip_chain_size() {
        let mut device = DummyDevice::new();
        let mut info = image_info(16, 16);
        info.mip_levels = 2;
        let image = device.create_image(&info).unwrap();
        let req = device.image_memory_requirements(image);
        // 16x16x4 + 8x8x4
        assert_eq!(req.size, 1024 + 256);
    }
}
