//! Versioned resource handles.
//!
//! A handle is a small `(index, version)` value: the index addresses a
//! resource slot in the frame graph, the version is compared against the
//! current version of the virtual resource the slot points to. Handles are
//! `Copy` and safe to capture in execute closures; a stale handle simply
//! fails validation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::resource::FrameGraphResource;

/// Untyped handle to a virtual resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameGraphHandle {
    index: u16,
    version: u16,
}

impl FrameGraphHandle {
    pub(crate) fn new(index: u16, version: u16) -> Self {
        Self { index, version }
    }

    /// The resource slot this handle addresses.
    pub fn index(self) -> u16 {
        self.index
    }

    /// The resource version this handle was minted for.
    pub fn version(self) -> u16 {
        self.version
    }
}

/// Typed handle to a virtual resource of kind `R`.
///
/// The type parameter only tags the API surface; the underlying handle is
/// untyped. Handles are invalidated by writes: writing through a handle
/// returns a replacement for the new version and the old handle goes stale.
pub struct FrameGraphId<R: FrameGraphResource> {
    handle: FrameGraphHandle,
    _kind: PhantomData<fn() -> R>,
}

impl<R: FrameGraphResource> FrameGraphId<R> {
    pub(crate) fn new(handle: FrameGraphHandle) -> Self {
        Self {
            handle,
            _kind: PhantomData,
        }
    }

    /// The untyped handle.
    pub fn handle(self) -> FrameGraphHandle {
        self.handle
    }

    /// The resource slot this handle addresses.
    pub fn index(self) -> u16 {
        self.handle.index
    }

    /// The resource version this handle was minted for.
    pub fn version(self) -> u16 {
        self.handle.version
    }
}

// manual impls: `R` itself does not need to be Clone/Eq for the id to be
impl<R: FrameGraphResource> Clone for FrameGraphId<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: FrameGraphResource> Copy for FrameGraphId<R> {}

impl<R: FrameGraphResource> PartialEq for FrameGraphId<R> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<R: FrameGraphResource> Eq for FrameGraphId<R> {}

impl<R: FrameGraphResource> Hash for FrameGraphId<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<R: FrameGraphResource> fmt::Debug for FrameGraphId<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameGraphId")
            .field("index", &self.handle.index)
            .field("version", &self.handle.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Texture;

    #[test]
    fn test_typed_handle_is_copy_and_eq() {
        let a: FrameGraphId<Texture> = FrameGraphId::new(FrameGraphHandle::new(3, 1));
        let b = a;
        assert_eq!(a, b);
        assert_eq!(a.index(), 3);
        assert_eq!(a.version(), 1);
    }

    #[test]
    fn test_handles_differ_by_version() {
        let a: FrameGraphId<Texture> = FrameGraphId::new(FrameGraphHandle::new(0, 0));
        let b: FrameGraphId<Texture> = FrameGraphId::new(FrameGraphHandle::new(0, 1));
        assert_ne!(a, b);
    }
}
