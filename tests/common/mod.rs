//! Common utilities for frame graph integration tests.
//!
//! The mock allocator records every call it receives so tests can assert
//! allocator balance, resource lifetime bracketing and call ordering
//! without a GPU.

use framegraph::{
    RenderTargetHandle, ResourceAllocator, TargetBufferFlags, TargetBufferInfo, TextureDescriptor,
    TextureHandle, TextureUsage,
};

/// One recorded allocator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocatorEvent {
    CreateTexture {
        name: String,
        width: u32,
        height: u32,
        handle: TextureHandle,
    },
    DestroyTexture {
        handle: TextureHandle,
    },
    CreateRenderTarget {
        name: String,
        flags: TargetBufferFlags,
        width: u32,
        height: u32,
        handle: RenderTargetHandle,
    },
    DestroyRenderTarget {
        handle: RenderTargetHandle,
    },
}

/// Allocator that hands out sequential ids and logs every call.
#[derive(Debug, Default)]
pub struct MockAllocator {
    next_id: u32,
    pub events: Vec<AllocatorEvent>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn textures_created(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AllocatorEvent::CreateTexture { .. }))
            .count()
    }

    pub fn textures_destroyed(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AllocatorEvent::DestroyTexture { .. }))
            .count()
    }

    pub fn render_targets_created(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AllocatorEvent::CreateRenderTarget { .. }))
            .count()
    }

    pub fn render_targets_destroyed(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AllocatorEvent::DestroyRenderTarget { .. }))
            .count()
    }

    /// Whether a texture with the given name was ever created.
    pub fn created_texture_named(&self, name: &str) -> bool {
        self.events.iter().any(|e| {
            matches!(e, AllocatorEvent::CreateTexture { name: n, .. } if n == name)
        })
    }

    /// Index of the first event matching `predicate`.
    pub fn position<F: Fn(&AllocatorEvent) -> bool>(&self, predicate: F) -> Option<usize> {
        self.events.iter().position(|e| predicate(e))
    }
}

impl ResourceAllocator for MockAllocator {
    fn create_texture(
        &mut self,
        name: &str,
        descriptor: &TextureDescriptor,
        _usage: TextureUsage,
    ) -> TextureHandle {
        let handle = TextureHandle::new(self.next());
        self.events.push(AllocatorEvent::CreateTexture {
            name: name.to_string(),
            width: descriptor.width,
            height: descriptor.height,
            handle,
        });
        handle
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        self.events.push(AllocatorEvent::DestroyTexture { handle });
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
        let handle = RenderTargetHandle::new(self.next());
        self.events.push(AllocatorEvent::CreateRenderTarget {
            name: name.to_string(),
            flags,
            width,
            height,
            handle,
        });
        handle
    }

    fn destroy_render_target(&mut self, handle: RenderTargetHandle) {
        self.events
            .push(AllocatorEvent::DestroyRenderTarget { handle });
    }
}

/// Driver that ignores every command.
pub struct NoopDriver;
