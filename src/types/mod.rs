//! Common types shared across the frame graph.

use bitflags::bitflags;

mod texture;

pub use texture::{
    SamplerKind, TextureDescriptor, TextureFormat, TextureSubResourceDescriptor, TextureUsage,
};

bitflags! {
    /// Selects attachment buffers of a render target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TargetBufferFlags: u8 {
        /// No buffer selected.
        const NONE = 0;
        /// Color attachment 0.
        const COLOR0 = 1 << 0;
        /// Color attachment 1.
        const COLOR1 = 1 << 1;
        /// Color attachment 2.
        const COLOR2 = 1 << 2;
        /// Color attachment 3.
        const COLOR3 = 1 << 3;
        /// Depth attachment.
        const DEPTH = 1 << 4;
        /// Stencil attachment.
        const STENCIL = 1 << 5;
        /// All color attachments.
        const ALL_COLOR = Self::COLOR0.bits()
            | Self::COLOR1.bits()
            | Self::COLOR2.bits()
            | Self::COLOR3.bits();
        /// Every attachment buffer.
        const ALL = Self::ALL_COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

impl Default for TargetBufferFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl TargetBufferFlags {
    /// Flag for the `index`-th color attachment.
    pub fn color(index: usize) -> Self {
        debug_assert!(index < 4, "color attachment index out of range");
        Self::from_bits_truncate(Self::COLOR0.bits() << index)
    }
}

/// Flags of the six attachment slots, in declaration order:
/// color 0-3, depth, stencil.
pub(crate) const ATTACHMENT_FLAGS: [TargetBufferFlags; 6] = [
    TargetBufferFlags::COLOR0,
    TargetBufferFlags::COLOR1,
    TargetBufferFlags::COLOR2,
    TargetBufferFlags::COLOR3,
    TargetBufferFlags::DEPTH,
    TargetBufferFlags::STENCIL,
];

/// A render area in pixels.
///
/// A zero-sized viewport in a render target descriptor means "derive the
/// size from the attachments".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub left: i32,
    /// Bottom edge in pixels.
    pub bottom: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Create a viewport anchored at the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            bottom: 0,
            width,
            height,
        }
    }

    /// Check whether the viewport has a zero extent.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-pass flags consumed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderPassFlags {
    /// Attachments to clear at the start of the pass.
    pub clear: TargetBufferFlags,
    /// Attachments whose contents are undefined when the pass begins.
    pub discard_start: TargetBufferFlags,
    /// Attachments whose contents may be dropped when the pass ends.
    pub discard_end: TargetBufferFlags,
}

/// Parameters the backend needs to begin a render pass.
///
/// Produced by the frame graph during compile, read back by pass execute
/// callbacks through
/// [`FrameGraphResources::get_render_pass_info`](crate::FrameGraphResources::get_render_pass_info).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderPassParams {
    /// Clear and discard flags.
    pub flags: RenderPassFlags,
    /// RGBA clear color, applied to attachments selected by `flags.clear`.
    pub clear_color: [f32; 4],
    /// The render area.
    pub viewport: Viewport,
}
