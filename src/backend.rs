//! Backend-facing interfaces: concrete handles, the resource allocator and
//! the opaque driver handed to pass execute callbacks.
//!
//! The frame graph never talks to the GPU itself. Concrete objects are
//! created and destroyed through a [`ResourceAllocator`] borrowed for the
//! duration of `execute`, and drawing commands are issued by user callbacks
//! against an opaque [`DriverApi`].

use std::any::Any;

use crate::types::{TargetBufferFlags, TextureDescriptor, TextureUsage};

/// Opaque handle to a backend texture.
///
/// A zero id is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(u32);

impl TextureHandle {
    /// Wrap a backend texture id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The backend id.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Check whether this is the null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Opaque handle to a backend render target.
///
/// A zero id is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetHandle(u32);

impl RenderTargetHandle {
    /// Wrap a backend render target id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The backend id.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Check whether this is the null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// One attachment of a concrete render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetBufferInfo {
    /// The attached texture, or null for an unused slot.
    pub handle: TextureHandle,
    /// Attached mip level.
    pub level: u8,
    /// Attached array layer.
    pub layer: u16,
}

/// Creates and destroys concrete GPU objects on behalf of the frame graph.
///
/// The allocator is borrowed for the duration of `execute`; it may pool
/// objects across frames internally, which is invisible to the graph.
/// Imported resources are never routed through the allocator.
pub trait ResourceAllocator {
    /// Create a texture for a devirtualized resource.
    fn create_texture(
        &mut self,
        name: &str,
        descriptor: &TextureDescriptor,
        usage: TextureUsage,
    ) -> TextureHandle;

    /// Destroy a texture previously created by [`Self::create_texture`].
    fn destroy_texture(&mut self, handle: TextureHandle);

    /// Create a render target from already-devirtualized attachments.
    #[allow(clippy::too_many_arguments)]
    fn create_render_target(
        &mut self,
        name: &str,
        flags: TargetBufferFlags,
        width: u32,
        height: u32,
        samples: u8,
        color: &[TargetBufferInfo; 4],
        depth: TargetBufferInfo,
        stencil: TargetBufferInfo,
    ) -> RenderTargetHandle;

    /// Destroy a render target previously created by
    /// [`Self::create_render_target`].
    fn destroy_render_target(&mut self, handle: RenderTargetHandle);
}

/// The backend command interface received by pass execute callbacks.
///
/// The frame graph treats it as fully opaque; callbacks that know the
/// concrete backend type can recover it with [`DriverApi::as_any_mut`].
pub trait DriverApi: Any {
    /// Downcast support for execute callbacks.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> DriverApi for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Allocator that hands out sequential ids without touching a GPU.
///
/// Useful for tests and for developing pass setup logic without a backend,
/// in the same spirit as a no-op driver.
#[derive(Debug, Default)]
pub struct DummyAllocator {
    next_id: u32,
    /// Number of textures created so far.
    pub textures_created: u32,
    /// Number of textures destroyed so far.
    pub textures_destroyed: u32,
    /// Number of render targets created so far.
    pub render_targets_created: u32,
    /// Number of render targets destroyed so far.
    pub render_targets_destroyed: u32,
}

impl DummyAllocator {
    /// Create a new dummy allocator.
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl ResourceAllocator for DummyAllocator {
    fn create_texture(
        &mut self,
        name: &str,
        descriptor: &TextureDescriptor,
        usage: TextureUsage,
    ) -> TextureHandle {
        self.textures_created += 1;
        let id = self.next();
        log::trace!(
            "DummyAllocator: creating texture '{}' ({}x{}x{}, {:?}) -> {}",
            name,
            descriptor.width,
            descriptor.height,
            descriptor.depth,
            usage,
            id
        );
        TextureHandle::new(id)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        self.textures_destroyed += 1;
        log::trace!("DummyAllocator: destroying texture {}", handle.id());
    }

    fn create_render_target(
        &mut self,
        name: &str,
        flags: TargetBufferFlags,
        width: u32,
        height: u32,
        _samples: u8,
        _color: &[TargetBufferInfo; 4],
        _depth: TargetBufferInfo,
        _stencil: TargetBufferInfo,
    ) -> RenderTargetHandle {
        self.render_targets_created += 1;
        let id = self.next();
        log::trace!(
            "DummyAllocator: creating render target '{}' ({}x{}, {:?}) -> {}",
            name,
            width,
            height,
            flags,
            id
        );
        RenderTargetHandle::new(id)
    }

    fn destroy_render_target(&mut self, handle: RenderTargetHandle) {
        self.render_targets_destroyed += 1;
        log::trace!("DummyAllocator: destroying render target {}", handle.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles() {
        assert!(TextureHandle::default().is_null());
        assert!(RenderTargetHandle::default().is_null());
        assert!(!TextureHandle::new(1).is_null());
    }

    #[test]
    fn test_dummy_allocator_counts() {
        let mut allocator = DummyAllocator::new();
        let t = allocator.create_texture(
            "t",
            &TextureDescriptor::new_2d(4, 4),
            TextureUsage::COLOR_ATTACHMENT,
        );
        assert!(!t.is_null());
        allocator.destroy_texture(t);
        assert_eq!(allocator.textures_created, 1);
        assert_eq!(allocator.textures_destroyed, 1);
    }
}
