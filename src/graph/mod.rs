//! Frame graph declaration and lifecycle.
//!
//! [`FrameGraph`] owns the whole build → compile → execute cycle. A frame
//! is declared through [`GraphBuilder`], compiled once into a
//! [`CompiledGraph`](crate::compiler::CompiledGraph), then executed every
//! frame until the topology or the render extent changes.

use std::mem;

use crate::compiler::{self, CompiledGraph, GraphStats};
use crate::device::{ImageHandle, ImageViewHandle, RenderDevice};
use crate::error::{CompileError, ExecuteError};
use crate::exec::{self, BackbufferBinding};
use crate::types::{Extent2d, TextureFormat};

pub(crate) mod builder;
pub(crate) mod pass;
pub(crate) mod resource;

pub use builder::{GraphBuilder, MAX_COLOR_ATTACHMENTS};
pub use pass::{
    ColorAttachment, DepthAttachment, PassCallback, PassContext, PassDesc, PassHandle, PassKind,
};
pub use resource::{ExternalResource, PassAccess, ResourceHandle, ResourceKind};

/// Lifecycle state of a [`FrameGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphState {
    /// No declarations recorded yet.
    #[default]
    Uninitialized,
    /// Between `begin_build()` and `compile()`.
    Building,
    /// A compiled graph is ready to execute.
    Compiled,
    /// At least one frame has been executed since compiling.
    Executing,
    /// The compiled graph was discarded; rebuild before executing.
    Invalidated,
}

/// Render graph with automatic synchronization and transient memory.
///
/// # Example
///
/// ```ignore
/// use framegraph::{FrameGraph, DummyDevice, ResourceUsage, TextureDescriptor, TextureFormat};
///
/// let mut device = DummyDevice::new();
/// let mut graph = FrameGraph::new();
/// graph.set_render_extent(Extent2d::new(1920, 1080));
///
/// let builder = graph.begin_build();
/// let color = builder.create_image("color", TextureDescriptor::relative(1.0, 1.0, TextureFormat::Rgba8Unorm));
/// let backbuffer = builder.import_backbuffer("backbuffer");
/// builder
///     .add_graphics_pass("scene", |ctx| { /* record draws */ })
///     .set_color_attachment(0, color, LoadOp::Clear, ClearValue::color(0.0, 0.0, 0.0, 1.0));
/// builder
///     .add_graphics_pass("present_blit", |ctx| { /* blit */ })
///     .read(color, ResourceUsage::SampledRead)
///     .set_color_attachment(0, backbuffer, LoadOp::DontCare, ClearValue::None);
///
/// graph.compile(&mut device)?;
/// graph.set_backbuffer(image, view, TextureFormat::Bgra8Unorm, extent);
/// graph.execute(&mut device, frame_index, delta_time)?;
/// ```
pub struct FrameGraph {
    state: GraphState,
    builder: GraphBuilder,
    compiled: Option<CompiledGraph>,
    backbuffer: Option<BackbufferBinding>,
    render_extent: Extent2d,
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGraph {
    pub fn new() -> Self {
        Self {
            state: GraphState::Uninitialized,
            builder: GraphBuilder::new(),
            compiled: None,
            backbuffer: None,
            render_extent: Extent2d::new(1, 1),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Set the render extent relative texture sizes resolve against.
    ///
    /// Takes effect at the next `compile()`.
    pub fn set_render_extent(&mut self, extent: Extent2d) {
        self.render_extent = extent;
    }

    /// Extent the active compiled graph targets, or the pending one.
    pub fn render_extent(&self) -> Extent2d {
        self.compiled
            .as_ref()
            .map_or(self.render_extent, |c| c.render_extent())
    }

    /// Start declaring a new frame, discarding previous declarations.
    ///
    /// The previously compiled graph, if any, stays active until the next
    /// successful `compile()` replaces it.
    pub fn begin_build(&mut self) -> &mut GraphBuilder {
        log::debug!("beginning graph build");
        self.builder.clear();
        self.state = GraphState::Building;
        &mut self.builder
    }

    /// Compile the recorded declarations into an executable graph.
    ///
    /// On success the previous compiled graph is released and replaced.
    /// On failure the previous graph stays active and the recorded
    /// declarations are discarded; fix the declaration and rebuild.
    pub fn compile(&mut self, device: &mut dyn RenderDevice) -> Result<(), CompileError> {
        assert!(
            self.state == GraphState::Building,
            "compile() requires begin_build() first"
        );
        let resources = mem::take(&mut self.builder.resources);
        let passes = mem::take(&mut self.builder.passes);
        let backbuffer = self.builder.backbuffer.take();

        match compiler::compile(resources, passes, self.render_extent, backbuffer, device) {
            Ok(compiled) => {
                if let Some(mut old) = self.compiled.replace(compiled) {
                    old.release(device);
                }
                self.state = GraphState::Compiled;
                Ok(())
            }
            Err(err) => {
                log::warn!("graph compilation failed: {err}");
                self.state = if self.compiled.is_some() {
                    GraphState::Compiled
                } else {
                    GraphState::Uninitialized
                };
                Err(err)
            }
        }
    }

    /// Bind the swapchain image for the next `execute()`.
    ///
    /// Must be called before the first `execute()` of any graph that
    /// declares a backbuffer slot, and again whenever the swapchain image
    /// changes. Also records `extent` as the render extent for the next
    /// compile.
    pub fn set_backbuffer(
        &mut self,
        image: ImageHandle,
        view: ImageViewHandle,
        format: TextureFormat,
        extent: Extent2d,
    ) {
        self.backbuffer = Some(BackbufferBinding {
            image,
            view,
            format,
            extent,
        });
        self.render_extent = extent;
    }

    /// Record one frame into the device.
    pub fn execute(
        &mut self,
        device: &mut dyn RenderDevice,
        frame_index: u64,
        delta_time: f32,
    ) -> Result<(), ExecuteError> {
        if !matches!(self.state, GraphState::Compiled | GraphState::Executing) {
            return Err(ExecuteError::NotCompiled);
        }
        let compiled = self.compiled.as_mut().ok_or(ExecuteError::NotCompiled)?;
        exec::execute_frame(
            compiled,
            device,
            self.backbuffer.as_ref(),
            frame_index,
            delta_time,
        )?;
        self.state = GraphState::Executing;
        Ok(())
    }

    /// Discard the compiled graph and free its device objects.
    ///
    /// Call on resize or topology change, then rebuild and recompile.
    pub fn invalidate(&mut self, device: &mut dyn RenderDevice) {
        if let Some(mut compiled) = self.compiled.take() {
            compiled.release(device);
        }
        log::debug!("graph invalidated");
        self.state = GraphState::Invalidated;
    }

    /// Returns true if an executable graph is available.
    pub fn is_compiled(&self) -> bool {
        matches!(self.state, GraphState::Compiled | GraphState::Executing)
    }

    /// Number of passes in the active compiled graph.
    pub fn pass_count(&self) -> usize {
        self.compiled.as_ref().map_or(0, |c| c.pass_count())
    }

    /// Compilation statistics of the active graph.
    pub fn stats(&self) -> Option<&GraphStats> {
        self.compiled.as_ref().map(|c| c.stats())
    }

    /// The active compiled graph, for inspection.
    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================
