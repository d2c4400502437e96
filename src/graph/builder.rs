//! Declarative recording of passes and resources.

use super::pass::{ColorAttachment, DepthAttachment, PassContext, PassDesc, PassKind};
use super::resource::{ExternalResource, PassAccess, ResourceDecl, ResourceHandle, ResourceKind};
use crate::state::{PipelineStages, QueueClass, ResourceUsage};
use crate::types::{BufferDescriptor, ClearValue, LoadOp, StoreOp, TextureDescriptor};

/// Maximum number of color attachment slots per graphics pass.
pub const MAX_COLOR_ATTACHMENTS: u32 = 8;

/// Records resource declarations and passes for compilation.
///
/// Obtained from [`FrameGraph::begin_build`](super::FrameGraph::begin_build).
/// Resource and pass methods return handles in declaration order; access
/// methods apply to the most recently added pass and chain fluently.
///
/// Declaration mistakes the builder can see locally (wrong resource kind
/// for a usage, conflicting layouts within one pass, attachments on a
/// compute pass) panic immediately; mistakes that need the whole graph
/// (cycles, unknown handles) surface as errors from `compile`.
#[derive(Default)]
pub struct GraphBuilder {
    pub(crate) resources: Vec<ResourceDecl>,
    pub(crate) passes: Vec<PassDesc>,
    pub(crate) backbuffer: Option<ResourceHandle>,
}

impl GraphBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Declare a transient image.
    pub fn create_image(
        &mut self,
        name: impl Into<String>,
        desc: TextureDescriptor,
    ) -> ResourceHandle {
        let handle = ResourceHandle::new(self.resources.len() as u32);
        self.resources.push(ResourceDecl::TransientImage {
            name: name.into(),
            desc,
            non_aliasable: false,
        });
        handle
    }

    /// Declare a transient buffer.
    pub fn create_buffer(
        &mut self,
        name: impl Into<String>,
        desc: BufferDescriptor,
    ) -> ResourceHandle {
        let handle = ResourceHandle::new(self.resources.len() as u32);
        self.resources.push(ResourceDecl::TransientBuffer {
            name: name.into(),
            desc,
            non_aliasable: false,
        });
        handle
    }

    /// Import a device object the caller owns.
    pub fn import_external(
        &mut self,
        name: impl Into<String>,
        resource: ExternalResource,
    ) -> ResourceHandle {
        let handle = ResourceHandle::new(self.resources.len() as u32);
        self.resources.push(ResourceDecl::External {
            name: name.into(),
            resource,
        });
        handle
    }

    /// Declare the backbuffer slot.
    ///
    /// The actual swapchain image is bound per frame via
    /// [`FrameGraph::set_backbuffer`](super::FrameGraph::set_backbuffer).
    /// At most one slot may exist per graph.
    pub fn import_backbuffer(&mut self, name: impl Into<String>) -> ResourceHandle {
        assert!(
            self.backbuffer.is_none(),
            "backbuffer slot already declared"
        );
        let handle = ResourceHandle::new(self.resources.len() as u32);
        self.resources.push(ResourceDecl::Backbuffer { name: name.into() });
        self.backbuffer = Some(handle);
        handle
    }

    /// Exclude a transient resource from memory aliasing.
    pub fn set_non_aliasable(&mut self, handle: ResourceHandle) -> &mut Self {
        match self.resources.get_mut(handle.index()) {
            Some(
                ResourceDecl::TransientImage { non_aliasable, .. }
                | ResourceDecl::TransientBuffer { non_aliasable, .. },
            ) => *non_aliasable = true,
            _ => panic!("set_non_aliasable requires a transient resource"),
        }
        self
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Add a graphics pass.
    pub fn add_graphics_pass(
        &mut self,
        name: impl Into<String>,
        callback: impl FnMut(&mut PassContext<'_>) + 'static,
    ) -> &mut Self {
        self.passes.push(PassDesc::new(
            name.into(),
            PassKind::Graphics,
            Box::new(callback),
        ));
        self
    }

    /// Add a compute pass.
    pub fn add_compute_pass(
        &mut self,
        name: impl Into<String>,
        callback: impl FnMut(&mut PassContext<'_>) + 'static,
    ) -> &mut Self {
        self.passes.push(PassDesc::new(
            name.into(),
            PassKind::Compute,
            Box::new(callback),
        ));
        self
    }

    /// Add a transfer pass.
    pub fn add_transfer_pass(
        &mut self,
        name: impl Into<String>,
        callback: impl FnMut(&mut PassContext<'_>) + 'static,
    ) -> &mut Self {
        self.passes.push(PassDesc::new(
            name.into(),
            PassKind::Transfer,
            Box::new(callback),
        ));
        self
    }

    fn current_pass(&mut self) -> &mut PassDesc {
        self.passes
            .last_mut()
            .expect("no current pass; call add_graphics_pass/add_compute_pass/add_transfer_pass first")
    }

    /// Declare a read of `handle` by the current pass.
    pub fn read(&mut self, handle: ResourceHandle, usage: ResourceUsage) -> &mut Self {
        assert!(usage.is_read(), "read() requires a read usage, got {usage:?}");
        self.check_kind(handle, usage);
        self.check_layout(handle, usage);
        self.current_pass().reads.push(PassAccess {
            resource: handle,
            usage,
            stages: None,
        });
        self
    }

    /// Declare a write of `handle` by the current pass.
    pub fn write(&mut self, handle: ResourceHandle, usage: ResourceUsage) -> &mut Self {
        assert!(usage.is_write(), "write() requires a write usage, got {usage:?}");
        self.check_kind(handle, usage);
        self.check_layout(handle, usage);
        self.current_pass().writes.push(PassAccess {
            resource: handle,
            usage,
            stages: None,
        });
        self
    }

    /// Declare a read restricted to specific pipeline stages.
    pub fn read_at(
        &mut self,
        handle: ResourceHandle,
        usage: ResourceUsage,
        stages: PipelineStages,
    ) -> &mut Self {
        assert!(usage.is_read(), "read_at() requires a read usage, got {usage:?}");
        self.check_kind(handle, usage);
        self.check_layout(handle, usage);
        self.current_pass().reads.push(PassAccess {
            resource: handle,
            usage,
            stages: Some(stages),
        });
        self
    }

    /// Declare a write restricted to specific pipeline stages.
    pub fn write_at(
        &mut self,
        handle: ResourceHandle,
        usage: ResourceUsage,
        stages: PipelineStages,
    ) -> &mut Self {
        assert!(usage.is_write(), "write_at() requires a write usage, got {usage:?}");
        self.check_kind(handle, usage);
        self.check_layout(handle, usage);
        self.current_pass().writes.push(PassAccess {
            resource: handle,
            usage,
            stages: Some(stages),
        });
        self
    }

    // Out-of-range handles pass through here; compile reports them as
    // UnknownResource with the offending pass named.
    fn check_kind(&self, handle: ResourceHandle, usage: ResourceUsage) {
        if let Some(decl) = self.resources.get(handle.index()) {
            match decl.kind() {
                ResourceKind::Image => assert!(
                    usage.valid_for_image(),
                    "usage {usage:?} is not valid for image '{}'",
                    decl.name()
                ),
                ResourceKind::Buffer => assert!(
                    usage.valid_for_buffer(),
                    "usage {usage:?} is not valid for buffer '{}'",
                    decl.name()
                ),
            }
        }
    }

    // A pass may access one image through several usages, but they must
    // agree on the layout the image holds while the pass runs. Buffers
    // have no layout; out-of-range handles are left for compile to report.
    fn check_layout(&self, handle: ResourceHandle, usage: ResourceUsage) {
        let decl = match self.resources.get(handle.index()) {
            Some(decl) if decl.kind() == ResourceKind::Image => decl,
            _ => return,
        };
        let layout = usage.state().layout;
        if let Some(pass) = self.passes.last() {
            for access in pass.accesses() {
                if access.resource == handle {
                    assert_eq!(
                        access.state().layout,
                        layout,
                        "pass '{}' uses '{}' with conflicting layouts",
                        pass.name,
                        decl.name()
                    );
                }
            }
        }
    }

    /// Bind a color attachment slot of the current graphics pass.
    ///
    /// Implies a [`ResourceUsage::ColorWrite`] access.
    pub fn set_color_attachment(
        &mut self,
        index: u32,
        handle: ResourceHandle,
        load_op: LoadOp,
        clear: ClearValue,
    ) -> &mut Self {
        assert!(
            index < MAX_COLOR_ATTACHMENTS,
            "color attachment index {index} out of range"
        );
        self.check_kind(handle, ResourceUsage::ColorWrite);
        self.check_layout(handle, ResourceUsage::ColorWrite);
        let pass = self.current_pass();
        assert!(
            pass.kind == PassKind::Graphics,
            "pass '{}' is not a graphics pass",
            pass.name
        );
        assert!(
            pass.color_attachments.iter().all(|a| a.index != index),
            "pass '{}' already binds color attachment {index}",
            pass.name
        );
        pass.color_attachments.push(ColorAttachment {
            index,
            resource: handle,
            load_op,
            store_op: StoreOp::Store,
            clear,
        });
        pass.writes.push(PassAccess {
            resource: handle,
            usage: ResourceUsage::ColorWrite,
            stages: None,
        });
        self
    }

    /// Bind the depth attachment of the current graphics pass.
    ///
    /// Implies a [`ResourceUsage::DepthWrite`] access.
    pub fn set_depth_attachment(
        &mut self,
        handle: ResourceHandle,
        load_op: LoadOp,
        clear: ClearValue,
    ) -> &mut Self {
        self.check_kind(handle, ResourceUsage::DepthWrite);
        self.check_layout(handle, ResourceUsage::DepthWrite);
        let pass = self.current_pass();
        assert!(
            pass.kind == PassKind::Graphics,
            "pass '{}' is not a graphics pass",
            pass.name
        );
        assert!(
            pass.depth_attachment.is_none(),
            "pass '{}' already binds a depth attachment",
            pass.name
        );
        pass.depth_attachment = Some(DepthAttachment {
            resource: handle,
            load_op,
            store_op: StoreOp::Store,
            clear,
        });
        pass.writes.push(PassAccess {
            resource: handle,
            usage: ResourceUsage::DepthWrite,
            stages: None,
        });
        self
    }

    /// Move the current pass onto a different queue.
    pub fn set_queue(&mut self, queue: QueueClass) -> &mut Self {
        self.current_pass().queue = queue;
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Discard all recorded declarations.
    pub fn clear(&mut self) {
        self.resources.clear();
        self.passes.clear();
        self.backbuffer = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFormat;

    fn noop(_: &mut PassContext<'_>) {}

    #[test]
    fn test_handles_are_monotonic() {
        let mut builder = GraphBuilder::new();
        let a = builder.create_image("a", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        let b = builder.create_buffer("b", BufferDescriptor::new(64));
        let c = builder.import_backbuffer("backbuffer");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(c.index(), 2);
        assert_eq!(builder.resource_count(), 3);
    }

    #[test]
    fn test_fluent_access_chain() {
        let mut builder = GraphBuilder::new();
        let src = builder.create_image("src", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        let dst = builder.create_image("dst", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        builder
            .add_compute_pass("blur", noop)
            .read(src, ResourceUsage::SampledRead)
            .write(dst, ResourceUsage::StorageWrite)
            .set_queue(QueueClass::Compute);
        assert_eq!(builder.pass_count(), 1);
        let pass = &builder.passes[0];
        assert_eq!(pass.reads.len(), 1);
        assert_eq!(pass.writes.len(), 1);
        assert_eq!(pass.queue, QueueClass::Compute);
    }

    #[test]
    #[should_panic(expected = "no current pass")]
    fn test_access_without_pass_panics() {
        let mut builder = GraphBuilder::new();
        let img = builder.create_image("a", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        builder.read(img, ResourceUsage::SampledRead);
    }

    #[test]
    #[should_panic(expected = "not a graphics pass")]
    fn test_attachment_on_compute_pass_panics() {
        let mut builder = GraphBuilder::new();
        let img = builder.create_image("a", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        builder
            .add_compute_pass("dispatch", noop)
            .set_color_attachment(0, img, LoadOp::Clear, ClearValue::None);
    }

    #[test]
    #[should_panic(expected = "requires a read usage")]
    fn test_read_with_write_usage_panics() {
        let mut builder = GraphBuilder::new();
        let img = builder.create_image("a", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        builder
            .add_graphics_pass("draw", noop)
            .read(img, ResourceUsage::ColorWrite);
    }

    #[test]
    #[should_panic(expected = "not valid for buffer")]
    fn test_image_usage_on_buffer_panics() {
        let mut builder = GraphBuilder::new();
        let buf = builder.create_buffer("b", BufferDescriptor::new(64));
        builder
            .add_graphics_pass("draw", noop)
            .read(buf, ResourceUsage::SampledRead);
    }

    #[test]
    #[should_panic(expected = "conflicting layouts")]
    fn test_conflicting_layouts_in_one_pass_panics() {
        let mut builder = GraphBuilder::new();
        let img = builder.create_image("a", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        // Sampling wants ShaderReadOnly, storage writing wants General.
        builder
            .add_compute_pass("bad", noop)
            .read(img, ResourceUsage::SampledRead)
            .write(img, ResourceUsage::StorageWrite);
    }

    #[test]
    fn test_read_modify_write_shares_one_layout() {
        let mut builder = GraphBuilder::new();
        let img = builder.create_image("a", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        builder
            .add_compute_pass("accumulate", noop)
            .read(img, ResourceUsage::StorageRead)
            .write(img, ResourceUsage::StorageWrite);
        let pass = &builder.passes[0];
        assert_eq!(pass.reads.len(), 1);
        assert_eq!(pass.writes.len(), 1);
    }

    #[test]
    fn test_buffer_usage_mix_has_no_layout_conflict() {
        let mut builder = GraphBuilder::new();
        let buf = builder.create_buffer("args", BufferDescriptor::new(64));
        builder
            .add_graphics_pass("draw", noop)
            .read(buf, ResourceUsage::IndirectArgs)
            .read(buf, ResourceUsage::StorageRead);
        assert_eq!(builder.passes[0].reads.len(), 2);
    }

    #[test]
    fn test_attachment_implies_write() {
        let mut builder = GraphBuilder::new();
        let img = builder.create_image("target", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        builder
            .add_graphics_pass("draw", noop)
            .set_color_attachment(0, img, LoadOp::Clear, ClearValue::color(0.0, 0.0, 0.0, 1.0));
        let pass = &builder.passes[0];
        assert_eq!(pass.color_attachments.len(), 1);
        assert_eq!(pass.writes.len(), 1);
        assert_eq!(pass.writes[0].usage, ResourceUsage::ColorWrite);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut builder = GraphBuilder::new();
        builder.create_image("a", TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm));
        builder.import_backbuffer("backbuffer");
        builder.add_graphics_pass("draw", noop);
        builder.clear();
        assert_eq!(builder.resource_count(), 0);
        assert_eq!(builder.pass_count(), 0);
        assert!(builder.backbuffer.is_none());
    }
}
