//! Texture descriptors and usage flags.

use bitflags::bitflags;

/// Pixel formats supported by frame graph textures.
///
/// This is the subset the scheduler cares about; the allocator receives the
/// format verbatim and may support more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 8-bit RGBA, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 11/11/10-bit float RGB.
    Rg11B10Float,
    /// Single channel 8-bit.
    R8Unorm,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24UnormStencil8,
}

/// The sampler dimensionality a texture is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerKind {
    /// Regular 2D texture.
    #[default]
    Sampler2d,
    /// 2D array texture.
    Sampler2dArray,
    /// Cubemap texture.
    SamplerCubemap,
    /// 3D (volume) texture.
    Sampler3d,
}

bitflags! {
    /// How a texture may be used across the frame.
    ///
    /// The effective usage of a virtual texture is the union of the usages
    /// declared by every retained pass touching it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u16 {
        /// No declared usage.
        const NONE = 0;
        /// Bound as a color render target attachment.
        const COLOR_ATTACHMENT = 1 << 0;
        /// Bound as a depth render target attachment.
        const DEPTH_ATTACHMENT = 1 << 1;
        /// Bound as a stencil render target attachment.
        const STENCIL_ATTACHMENT = 1 << 2;
        /// Sampled in a shader.
        const SAMPLEABLE = 1 << 3;
        /// Written through CPU uploads.
        const UPLOADABLE = 1 << 4;
        /// Source of a blit operation.
        const BLIT_SRC = 1 << 5;
        /// Destination of a blit operation.
        const BLIT_DST = 1 << 6;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::NONE
    }
}

impl TextureUsage {
    /// Usages permitted on an imported render target.
    pub fn attachment_mask() -> Self {
        Self::COLOR_ATTACHMENT | Self::DEPTH_ATTACHMENT | Self::STENCIL_ATTACHMENT
    }
}

/// Descriptor for creating a frame graph texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (3D textures) or array layers.
    pub depth: u32,
    /// Number of mip levels.
    pub levels: u8,
    /// MSAA sample count.
    pub samples: u8,
    /// Pixel format.
    pub format: TextureFormat,
    /// Sampler dimensionality.
    pub sampler_kind: SamplerKind,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
            levels: 1,
            samples: 1,
            format: TextureFormat::default(),
            sampler_kind: SamplerKind::default(),
        }
    }
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Set the pixel format.
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the number of mip levels.
    pub fn with_levels(mut self, levels: u8) -> Self {
        self.levels = levels;
        self
    }

    /// Set the MSAA sample count.
    pub fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples;
        self
    }

    /// Set the sampler dimensionality.
    pub fn with_sampler_kind(mut self, kind: SamplerKind) -> Self {
        self.sampler_kind = kind;
        self
    }

    /// Width of the given mip level, clamped to 1.
    pub fn level_width(&self, level: u8) -> u32 {
        (self.width >> level).max(1)
    }

    /// Height of the given mip level, clamped to 1.
    pub fn level_height(&self, level: u8) -> u32 {
        (self.height >> level).max(1)
    }
}

/// Selects one mip level and array layer of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureSubResourceDescriptor {
    /// Selected mip level.
    pub level: u8,
    /// Selected array layer.
    pub layer: u16,
}
