//! Render target declarations.
//!
//! A render target groups up to four color attachments with optional depth
//! and stencil, plus the clear and viewport parameters of the pass that
//! renders into it. Declaring one through the builder issues a write on
//! every attachment; the returned structure carries the post-write handles
//! and an id used to fetch the concrete target during execute.

use crate::handle::FrameGraphId;
use crate::resource::Texture;
use crate::types::{TargetBufferFlags, Viewport};

/// Number of color attachment slots.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;

/// Total attachment slots: colors, depth, stencil.
pub(crate) const ATTACHMENT_COUNT: usize = MAX_COLOR_ATTACHMENTS + 2;

/// The attachments of a render target, as virtual resource handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Attachments {
    /// Color attachments 0-3.
    pub color: [Option<FrameGraphId<Texture>>; MAX_COLOR_ATTACHMENTS],
    /// Depth attachment.
    pub depth: Option<FrameGraphId<Texture>>,
    /// Stencil attachment.
    pub stencil: Option<FrameGraphId<Texture>>,
}

impl Attachments {
    /// Attachments with a single color texture.
    pub fn from_color(color: FrameGraphId<Texture>) -> Self {
        Self {
            color: [Some(color), None, None, None],
            ..Self::default()
        }
    }

    /// The attachment in the given slot (colors first, then depth, stencil).
    pub(crate) fn slot(&self, index: usize) -> Option<FrameGraphId<Texture>> {
        match index {
            0..=3 => self.color[index],
            4 => self.depth,
            5 => self.stencil,
            _ => None,
        }
    }

    pub(crate) fn set_slot(&mut self, index: usize, id: FrameGraphId<Texture>) {
        match index {
            0..=3 => self.color[index] = Some(id),
            4 => self.depth = Some(id),
            5 => self.stencil = Some(id),
            _ => unreachable!("attachment slot out of range"),
        }
    }
}

/// Declaration parameters of a render target.
#[derive(Debug, Clone)]
pub struct RenderTargetDescriptor {
    /// Attachment handles; unused slots stay `None`.
    pub attachments: Attachments,
    /// MSAA sample count of the target.
    pub samples: u8,
    /// Attachments to clear when the pass begins. Clearing implies the
    /// previous contents are discarded.
    pub clear_flags: TargetBufferFlags,
    /// RGBA clear color.
    pub clear_color: [f32; 4],
    /// Render area; a zero extent derives the size from the attachments.
    pub viewport: Viewport,
}

impl Default for RenderTargetDescriptor {
    fn default() -> Self {
        Self {
            attachments: Attachments::default(),
            samples: 1,
            clear_flags: TargetBufferFlags::NONE,
            clear_color: [0.0; 4],
            viewport: Viewport::default(),
        }
    }
}

impl RenderTargetDescriptor {
    /// Descriptor with a single color attachment.
    pub fn from_color(color: FrameGraphId<Texture>) -> Self {
        Self {
            attachments: Attachments::from_color(color),
            ..Self::default()
        }
    }

    /// Set the attachments.
    pub fn with_attachments(mut self, attachments: Attachments) -> Self {
        self.attachments = attachments;
        self
    }

    /// Set the sample count.
    pub fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples;
        self
    }

    /// Set the clear flags.
    pub fn with_clear_flags(mut self, flags: TargetBufferFlags) -> Self {
        self.clear_flags = flags;
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set an explicit viewport.
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }
}

/// Result of declaring a render target on a pass.
///
/// Every attachment was written, so the pre-declaration handles are stale;
/// the attachments here carry the new versions. The id retrieves the
/// concrete target through
/// [`FrameGraphResources::get_render_pass_info`](crate::FrameGraphResources::get_render_pass_info).
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    /// Post-write attachment handles.
    pub attachments: Attachments,
    /// Identifier of this target within the declaring pass.
    pub id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::FrameGraphHandle;

    fn id(index: u16) -> FrameGraphId<Texture> {
        FrameGraphId::new(FrameGraphHandle::new(index, 0))
    }

    #[test]
    fn test_slot_mapping() {
        let mut attachments = Attachments::from_color(id(0));
        attachments.depth = Some(id(1));
        attachments.stencil = Some(id(2));

        assert_eq!(attachments.slot(0), Some(id(0)));
        assert_eq!(attachments.slot(1), None);
        assert_eq!(attachments.slot(4), Some(id(1)));
        assert_eq!(attachments.slot(5), Some(id(2)));
    }

    #[test]
    fn test_descriptor_defaults() {
        let desc = RenderTargetDescriptor::default();
        assert_eq!(desc.samples, 1);
        assert_eq!(desc.clear_flags, TargetBufferFlags::NONE);
        assert!(desc.viewport.is_empty());
    }
}
