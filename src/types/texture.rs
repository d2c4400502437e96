//! Texture formats, usage flags, and descriptors.

use bitflags::bitflags;

use super::Extent2d;

// ============================================================================
// Texture Format
// ============================================================================

/// Texture pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    // 8-bit formats
    R8Unorm,
    Rg8Unorm,

    // 16-bit formats
    R16Float,
    Rg16Float,
    Rgba16Float,

    // 32-bit formats
    R32Float,
    R32Uint,
    Rg32Float,
    Rgba32Float,

    // Packed formats
    Rgb10a2Unorm,
    Rg11b10Float,

    // Standard color formats
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,

    // Depth/stencil formats
    Depth16Unorm,
    Depth24PlusStencil8,
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth or depth/stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    /// Returns true if this format has a stencil aspect.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Bytes per pixel for this format.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::R16Float | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Rgb10a2Unorm
            | Self::Rg11b10Float
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

// ============================================================================
// Texture Usage
// ============================================================================

bitflags! {
    /// Usage flags describing how a texture may be used.
    ///
    /// Declared pass accesses imply usage flags automatically; flags set on
    /// the descriptor are unioned with the derived ones at compile time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be a source of transfer operations.
        const TRANSFER_SRC = 1 << 0;
        /// Texture can be a destination of transfer operations.
        const TRANSFER_DST = 1 << 1;
        /// Texture can be sampled in shaders.
        const SAMPLED = 1 << 2;
        /// Texture can be used as a storage image.
        const STORAGE = 1 << 3;
        /// Texture can be used as a color attachment.
        const COLOR_ATTACHMENT = 1 << 4;
        /// Texture can be used as a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Texture Size
// ============================================================================

/// Texture dimensions, either absolute pixels or relative to the render extent.
///
/// Relative sizes let offscreen targets track window resizes without
/// re-recording the graph; the compiler resolves them against the render
/// extent active at compile time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSize {
    /// Fixed size in pixels.
    Absolute { width: u32, height: u32 },
    /// Size as a fraction of the render extent.
    Relative { width: f32, height: f32 },
}

impl TextureSize {
    /// Full render extent.
    pub const FULL: Self = Self::Relative {
        width: 1.0,
        height: 1.0,
    };

    /// Resolve to pixel dimensions against the given render extent.
    ///
    /// Relative sizes are clamped to at least 1x1.
    pub fn resolve(&self, render_extent: Extent2d) -> Extent2d {
        match *self {
            Self::Absolute { width, height } => Extent2d::new(width, height),
            Self::Relative { width, height } => Extent2d::new(
                ((render_extent.width as f32 * width) as u32).max(1),
                ((render_extent.height as f32 * height) as u32).max(1),
            ),
        }
    }
}

// ============================================================================
// Texture Descriptor
// ============================================================================

/// Description of a transient texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// Optional debug label.
    pub label: Option<String>,
    /// Texture dimensions.
    pub size: TextureSize,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Extra usage flags beyond those derived from declared accesses.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a descriptor with an absolute 2D size.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            size: TextureSize::Absolute { width, height },
            mip_levels: 1,
            format,
            usage: TextureUsage::empty(),
        }
    }

    /// Create a descriptor sized relative to the render extent.
    pub fn relative(width: f32, height: f32, format: TextureFormat) -> Self {
        Self {
            label: None,
            size: TextureSize::Relative { width, height },
            mip_levels: 1,
            format,
            usage: TextureUsage::empty(),
        }
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the number of mip levels.
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Add extra usage flags.
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage |= usage;
        self
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: TextureSize::FULL,
            mip_levels: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_size_resolve() {
        let size = TextureSize::Relative {
            width: 0.5,
            height: 0.5,
        };
        let resolved = size.resolve(Extent2d::new(1920, 1080));
        assert_eq!(resolved, Extent2d::new(960, 540));
    }

    #[test]
    fn test_relative_size_min_one_pixel() {
        let size = TextureSize::Relative {
            width: 0.1,
            height: 0.1,
        };
        let resolved = size.resolve(Extent2d::new(4, 4));
        assert_eq!(resolved, Extent2d::new(1, 1));
    }

    #[test]
    fn test_absolute_size_ignores_extent() {
        let size = TextureSize::Absolute {
            width: 256,
            height: 256,
        };
        assert_eq!(size.resolve(Extent2d::new(1920, 1080)), Extent2d::new(256, 256));
    }

    #[test]
    fn test_depth_format_queries() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }
}
