//! # framegraph
//!
//! A declarative render frame graph: once per frame, client code describes
//! a set of GPU passes and the virtual resources each pass reads and
//! writes; a compile phase then culls unused work, resolves effective
//! resource usages, computes minimal resource lifetimes and infers
//! load/store (discard) flags for every render target attachment; execute
//! finally drives the retained passes in declaration order, handing each
//! one its realized resources.
//!
//! The graph owns nothing concrete: textures and render targets are
//! created and destroyed through a [`ResourceAllocator`] borrowed during
//! execution, and drawing commands are issued by user callbacks against an
//! opaque [`DriverApi`].
//!
//! # Example
//!
//! ```ignore
//! use framegraph::{FrameGraph, FrameGraphId, Texture, TextureDescriptor, TextureUsage};
//!
//! #[derive(Default, Clone)]
//! struct DepthPassData {
//!     depth: Option<FrameGraphId<Texture>>,
//! }
//!
//! let mut fg = FrameGraph::new();
//! let pass = fg.add_pass::<DepthPassData, _, _>(
//!     "depth prepass",
//!     |builder, data| {
//!         let mut depth = builder.create("depth", TextureDescriptor::new_2d(1920, 1080));
//!         builder.use_as_targets(None, Some(&mut depth)).unwrap();
//!         data.depth = Some(depth);
//!     },
//!     |resources, data, driver| {
//!         let depth = resources.get(data.depth.unwrap());
//!         // record draw commands against depth.handle
//!     },
//! );
//! fg.present(pass.depth.unwrap()).unwrap();
//! fg.compile().unwrap();
//! fg.execute(&mut allocator, &mut driver).unwrap();
//! ```

mod backend;
mod error;
mod frame_graph;
mod graph;
mod handle;
mod pass;
mod render_target;
mod resource;
mod resource_node;
mod resources;
mod types;

pub use backend::{
    DriverApi, DummyAllocator, RenderTargetHandle, ResourceAllocator, TargetBufferInfo,
    TextureHandle,
};
pub use error::FrameGraphError;
pub use frame_graph::{Builder, FrameGraph};
pub use graph::{DependencyGraph, Edge, EdgeId, NodeId};
pub use handle::{FrameGraphHandle, FrameGraphId};
pub use render_target::{
    Attachments, RenderTarget, RenderTargetDescriptor, MAX_COLOR_ATTACHMENTS,
};
pub use resource::{FrameGraphResource, Texture};
pub use resources::{FrameGraphResources, RenderPassInfo};
pub use types::{
    RenderPassFlags, RenderPassParams, SamplerKind, TargetBufferFlags, TextureDescriptor,
    TextureFormat, TextureSubResourceDescriptor, TextureUsage, Viewport,
};
