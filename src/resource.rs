//! Virtual resources.
//!
//! A virtual resource is a placeholder for a GPU object: it only becomes
//! concrete between its first and last referencing pass. The generic
//! machinery is split between an object-safe [`VirtualResource`] trait the
//! frame graph stores behind `Box<dyn>`, and a typed [`Resource<R>`] carrier
//! that owns the kind-specific descriptor, usage flags and edge payloads.
//! Typed operations recover the carrier through `Any` downcasts.

use std::any::Any;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::backend::{RenderTargetHandle, ResourceAllocator, TextureHandle};
use crate::graph::{DependencyGraph, EdgeId};
use crate::handle::FrameGraphHandle;
use crate::render_target::RenderTargetDescriptor;
use crate::types::{TextureDescriptor, TextureSubResourceDescriptor, TextureUsage};

/// A resource kind the frame graph can schedule.
///
/// Implementors are small concrete-handle carriers; the associated types
/// describe how the kind is declared and used. Usage flags are
/// kind-specific, which is why each resource owns the payloads of its own
/// edges.
pub trait FrameGraphResource: Clone + Default + 'static {
    /// Creation parameters for the resource.
    type Descriptor: Clone + fmt::Debug + Default + 'static;
    /// Parameters selecting a portion of a parent resource.
    type SubResourceDescriptor: Clone + fmt::Debug + Default + 'static;
    /// Kind-specific usage flags.
    type Usage: Copy
        + Default
        + fmt::Debug
        + PartialEq
        + BitOr<Output = Self::Usage>
        + BitOrAssign
        + BitAnd<Output = Self::Usage>
        + 'static;

    /// Instantiate the concrete object through the allocator.
    fn create(
        &mut self,
        allocator: &mut dyn ResourceAllocator,
        name: &str,
        descriptor: &Self::Descriptor,
        usage: Self::Usage,
    );

    /// Release the concrete object through the allocator.
    fn destroy(&mut self, allocator: &mut dyn ResourceAllocator);
}

/// A texture resource. The default value is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Texture {
    /// Concrete backend handle; null until devirtualized.
    pub handle: TextureHandle,
}

impl FrameGraphResource for Texture {
    type Descriptor = TextureDescriptor;
    type SubResourceDescriptor = TextureSubResourceDescriptor;
    type Usage = TextureUsage;

    fn create(
        &mut self,
        allocator: &mut dyn ResourceAllocator,
        name: &str,
        descriptor: &Self::Descriptor,
        usage: Self::Usage,
    ) {
        self.handle = allocator.create_texture(name, descriptor, usage);
    }

    fn destroy(&mut self, allocator: &mut dyn ResourceAllocator) {
        if !self.handle.is_null() {
            allocator.destroy_texture(self.handle);
            self.handle = TextureHandle::default();
        }
    }
}

/// Type-erased interface over [`Resource<R>`].
///
/// The frame graph owns virtual resources behind this trait; the capability
/// set mirrors what compile and execute need without knowing the kind.
pub(crate) trait VirtualResource {
    fn name(&self) -> &str;
    fn version(&self) -> u16;
    fn bump_version(&mut self) -> u16;
    fn refcount(&self) -> u32;

    /// Record that a retained pass references this resource. Imported
    /// resources only count the reference; they are never bracketed by
    /// allocator calls, so first/last stay unset.
    fn needed_by_pass(&mut self, pass: usize);
    fn first(&self) -> Option<usize>;
    fn last(&self) -> Option<usize>;

    /// Handle of the parent resource when this is a subresource.
    fn parent_handle(&self) -> Option<FrameGraphHandle>;

    /// Fold the usages of this resource's edges into its effective usage.
    /// Reader edges only count while valid; writer edges always count, so
    /// an attachment whose readers were all culled still reports the usage
    /// it was produced with.
    fn resolve_usage(&mut self, graph: &DependencyGraph);

    /// Fold a subresource's resolved usage into this resource.
    fn merge_usage_of_child(&mut self, child: &dyn VirtualResource);

    /// Instantiate the concrete object. Subresources receive their parent
    /// and alias its concrete object instead of allocating.
    fn devirtualize(
        &mut self,
        allocator: &mut dyn ResourceAllocator,
        parent: Option<&dyn VirtualResource>,
    );

    /// Release the concrete object. Subresources only drop their alias.
    fn destroy(&mut self, allocator: &mut dyn ResourceAllocator);

    fn is_imported(&self) -> bool;

    /// The imported render target pre-bound to this resource, if any.
    fn imported_render_target(&self) -> Option<&ImportedRenderTarget>;

    /// The typed [`Resource<R>`] carrier, for downcasts.
    fn resource_any(&self) -> &dyn Any;
    fn resource_any_mut(&mut self) -> &mut dyn Any;
}

/// Kind-specific state of a virtual resource.
pub(crate) struct Resource<R: FrameGraphResource> {
    name: String,
    version: u16,
    refcount: u32,
    first: Option<usize>,
    last: Option<usize>,
    parent: Option<FrameGraphHandle>,
    /// Usage mask the resource was imported with; `None` for owned resources.
    allowed: Option<R::Usage>,
    /// Creation descriptor.
    pub descriptor: R::Descriptor,
    /// Subresource selection, meaningful when `parent` is set.
    pub sub_descriptor: R::SubResourceDescriptor,
    /// Effective usage, resolved during compile.
    pub usage: R::Usage,
    /// Reader edges with their declared usage.
    reads: Vec<(EdgeId, R::Usage)>,
    /// Writer edges with their declared usage.
    writes: Vec<(EdgeId, R::Usage)>,
    /// Concrete object, valid between devirtualize and destroy.
    pub resource: R,
}

impl<R: FrameGraphResource> Resource<R> {
    pub(crate) fn new(name: &str, descriptor: R::Descriptor) -> Self {
        Self {
            name: name.to_string(),
            version: 0,
            refcount: 0,
            first: None,
            last: None,
            parent: None,
            allowed: None,
            descriptor,
            sub_descriptor: R::SubResourceDescriptor::default(),
            usage: R::Usage::default(),
            reads: Vec::new(),
            writes: Vec::new(),
            resource: R::default(),
        }
    }

    pub(crate) fn new_subresource(
        name: &str,
        parent: FrameGraphHandle,
        descriptor: R::Descriptor,
        sub_descriptor: R::SubResourceDescriptor,
    ) -> Self {
        let mut resource = Self::new(name, descriptor);
        resource.parent = Some(parent);
        resource.sub_descriptor = sub_descriptor;
        resource
    }

    pub(crate) fn new_imported(
        name: &str,
        descriptor: R::Descriptor,
        allowed: R::Usage,
        concrete: R,
    ) -> Self {
        let mut resource = Self::new(name, descriptor);
        resource.allowed = Some(allowed);
        resource.resource = concrete;
        resource
    }

    /// Check a declared usage against the imported usage mask.
    pub(crate) fn is_usage_allowed(&self, usage: R::Usage) -> bool {
        match self.allowed {
            Some(allowed) => usage & allowed == usage,
            None => true,
        }
    }

    pub(crate) fn record_read(&mut self, edge: EdgeId, usage: R::Usage) {
        self.reads.push((edge, usage));
    }

    pub(crate) fn record_write(&mut self, edge: EdgeId, usage: R::Usage) {
        self.writes.push((edge, usage));
    }
}

impl<R: FrameGraphResource> VirtualResource for Resource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u16 {
        self.version
    }

    fn bump_version(&mut self) -> u16 {
        self.version += 1;
        self.version
    }

    fn refcount(&self) -> u32 {
        self.refcount
    }

    fn needed_by_pass(&mut self, pass: usize) {
        self.refcount += 1;
        if self.allowed.is_some() {
            return;
        }
        if self.first.is_none() {
            self.first = Some(pass);
        }
        match self.last {
            Some(last) if last >= pass => {}
            _ => self.last = Some(pass),
        }
    }

    fn first(&self) -> Option<usize> {
        self.first
    }

    fn last(&self) -> Option<usize> {
        self.last
    }

    fn parent_handle(&self) -> Option<FrameGraphHandle> {
        self.parent
    }

    fn resolve_usage(&mut self, graph: &DependencyGraph) {
        for &(edge, usage) in &self.reads {
            if graph.is_edge_valid(edge) {
                self.usage |= usage;
            }
        }
        for &(_, usage) in &self.writes {
            self.usage |= usage;
        }
    }

    fn merge_usage_of_child(&mut self, child: &dyn VirtualResource) {
        if let Some(child) = child.resource_any().downcast_ref::<Resource<R>>() {
            self.usage |= child.usage;
        }
    }

    fn devirtualize(
        &mut self,
        allocator: &mut dyn ResourceAllocator,
        parent: Option<&dyn VirtualResource>,
    ) {
        if self.allowed.is_some() {
            return;
        }
        if let Some(parent) = parent {
            if let Some(parent) = parent.resource_any().downcast_ref::<Resource<R>>() {
                self.resource = parent.resource.clone();
            }
            return;
        }
        log::trace!("devirtualizing '{}'", self.name);
        self.resource
            .create(allocator, &self.name, &self.descriptor, self.usage);
    }

    fn destroy(&mut self, allocator: &mut dyn ResourceAllocator) {
        if self.allowed.is_some() {
            return;
        }
        if self.parent.is_some() {
            // only an alias of the parent's concrete object
            self.resource = R::default();
            return;
        }
        log::trace!("destroying '{}'", self.name);
        self.resource.destroy(allocator);
    }

    fn is_imported(&self) -> bool {
        self.allowed.is_some()
    }

    fn imported_render_target(&self) -> Option<&ImportedRenderTarget> {
        None
    }

    fn resource_any(&self) -> &dyn Any {
        self
    }

    fn resource_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An imported texture pre-bound to a concrete backend render target.
///
/// Declaring a render target whose color attachment resolves to one of
/// these skips render target devirtualization and uses the imported handle
/// verbatim.
pub(crate) struct ImportedRenderTarget {
    base: Resource<Texture>,
    /// The concrete backend render target.
    pub target: RenderTargetHandle,
    /// The imported target's declared parameters.
    pub rt_descriptor: RenderTargetDescriptor,
}

impl ImportedRenderTarget {
    pub(crate) fn new(
        name: &str,
        descriptor: TextureDescriptor,
        rt_descriptor: RenderTargetDescriptor,
        target: RenderTargetHandle,
    ) -> Self {
        Self {
            base: Resource::new_imported(
                name,
                descriptor,
                TextureUsage::attachment_mask(),
                Texture::default(),
            ),
            target,
            rt_descriptor,
        }
    }
}

impl VirtualResource for ImportedRenderTarget {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn version(&self) -> u16 {
        self.base.version()
    }

    fn bump_version(&mut self) -> u16 {
        self.base.bump_version()
    }

    fn refcount(&self) -> u32 {
        self.base.refcount()
    }

    fn needed_by_pass(&mut self, pass: usize) {
        self.base.needed_by_pass(pass);
    }

    fn first(&self) -> Option<usize> {
        self.base.first()
    }

    fn last(&self) -> Option<usize> {
        self.base.last()
    }

    fn parent_handle(&self) -> Option<FrameGraphHandle> {
        self.base.parent_handle()
    }

    fn resolve_usage(&mut self, graph: &DependencyGraph) {
        self.base.resolve_usage(graph);
    }

    fn merge_usage_of_child(&mut self, child: &dyn VirtualResource) {
        self.base.merge_usage_of_child(child);
    }

    fn devirtualize(
        &mut self,
        _allocator: &mut dyn ResourceAllocator,
        _parent: Option<&dyn VirtualResource>,
    ) {
    }

    fn destroy(&mut self, _allocator: &mut dyn ResourceAllocator) {}

    fn is_imported(&self) -> bool {
        true
    }

    fn imported_render_target(&self) -> Option<&ImportedRenderTarget> {
        Some(self)
    }

    fn resource_any(&self) -> &dyn Any {
        &self.base
    }

    fn resource_any_mut(&mut self) -> &mut dyn Any {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyAllocator;

    #[test]
    fn test_texture_create_destroy_roundtrip() {
        let mut allocator = DummyAllocator::new();
        let mut texture = Texture::default();
        texture.create(
            &mut allocator,
            "color",
            &TextureDescriptor::new_2d(8, 8),
            TextureUsage::COLOR_ATTACHMENT,
        );
        assert!(!texture.handle.is_null());
        texture.destroy(&mut allocator);
        assert!(texture.handle.is_null());
        assert_eq!(allocator.textures_created, allocator.textures_destroyed);
    }

    #[test]
    fn test_imported_usage_mask() {
        let resource = Resource::<Texture>::new_imported(
            "backbuffer",
            TextureDescriptor::new_2d(320, 200),
            TextureUsage::COLOR_ATTACHMENT,
            Texture {
                handle: TextureHandle::new(0x1234),
            },
        );
        assert!(resource.is_usage_allowed(TextureUsage::COLOR_ATTACHMENT));
        assert!(!resource.is_usage_allowed(TextureUsage::UPLOADABLE));
        assert!(resource.is_usage_allowed(TextureUsage::NONE));
    }

    #[test]
    fn test_imported_resources_skip_allocator() {
        let mut allocator = DummyAllocator::new();
        let mut resource = Resource::<Texture>::new_imported(
            "backbuffer",
            TextureDescriptor::new_2d(320, 200),
            TextureUsage::COLOR_ATTACHMENT,
            Texture {
                handle: TextureHandle::new(0x1234),
            },
        );
        resource.devirtualize(&mut allocator, None);
        resource.destroy(&mut allocator);
        assert_eq!(allocator.textures_created, 0);
        assert_eq!(allocator.textures_destroyed, 0);
        assert_eq!(resource.resource.handle.id(), 0x1234);
    }

    #[test]
    fn test_subresource_aliases_parent() {
        let mut allocator = DummyAllocator::new();
        let mut parent =
            Resource::<Texture>::new("mip chain", TextureDescriptor::new_2d(16, 16).with_levels(4));
        parent.usage = TextureUsage::COLOR_ATTACHMENT;
        parent.devirtualize(&mut allocator, None);

        let mut child = Resource::<Texture>::new_subresource(
            "mip 1",
            FrameGraphHandle::new(0, 0),
            parent.descriptor.clone(),
            TextureSubResourceDescriptor { level: 1, layer: 0 },
        );
        child.devirtualize(&mut allocator, Some(&parent as &dyn VirtualResource));
        assert_eq!(child.resource.handle, parent.resource.handle);

        child.destroy(&mut allocator);
        parent.destroy(&mut allocator);
        assert_eq!(allocator.textures_created, 1);
        assert_eq!(allocator.textures_destroyed, 1);
    }
}
