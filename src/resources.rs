//! Read-only resource access for pass execute callbacks.

use crate::backend::RenderTargetHandle;
use crate::frame_graph::FrameGraph;
use crate::handle::FrameGraphId;
use crate::resource::{FrameGraphResource, Resource};
use crate::types::RenderPassParams;

/// Everything the backend needs to begin one of the pass's render targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassInfo {
    /// Resolved clear, discard and viewport parameters.
    pub params: RenderPassParams,
    /// Concrete render target. Only valid within the current execute
    /// invocation.
    pub target: RenderTargetHandle,
}

/// The view a pass's execute callback receives.
///
/// All accessors are read-only; the graph is frozen once execution starts.
/// `get` returns a default (null-handle) resource for stale handles and for
/// resources that were culled along with every pass referencing them; this
/// is the documented way a callback observes that a resource it captured
/// did not survive compilation.
pub struct FrameGraphResources<'a> {
    frame_graph: &'a FrameGraph,
    pass: usize,
}

impl<'a> FrameGraphResources<'a> {
    pub(crate) fn new(frame_graph: &'a FrameGraph, pass: usize) -> Self {
        Self { frame_graph, pass }
    }

    /// Name of the executing pass.
    pub fn pass_name(&self) -> &str {
        &self.frame_graph.passes[self.pass].name
    }

    /// The concrete resource for a handle.
    ///
    /// Returns the default value (a null handle) when the handle is stale,
    /// the resource was culled, or its concrete object is not alive at this
    /// point of the frame.
    pub fn get<R: FrameGraphResource>(&self, id: FrameGraphId<R>) -> R {
        if !self.frame_graph.is_valid(id) {
            return R::default();
        }
        let rid = self.frame_graph.slots[id.index() as usize].rid;
        let resource = &self.frame_graph.resources[rid];
        if resource.refcount() == 0 {
            return R::default();
        }
        resource
            .resource_any()
            .downcast_ref::<Resource<R>>()
            .map(|r| r.resource.clone())
            .unwrap_or_default()
    }

    /// The descriptor a resource was declared with.
    pub fn get_descriptor<R: FrameGraphResource>(&self, id: FrameGraphId<R>) -> R::Descriptor {
        let rid = self.frame_graph.slots[id.index() as usize].rid;
        self.frame_graph.resources[rid]
            .resource_any()
            .downcast_ref::<Resource<R>>()
            .map(|r| r.descriptor.clone())
            .unwrap_or_default()
    }

    /// The subresource selection of a resource.
    pub fn get_sub_descriptor<R: FrameGraphResource>(
        &self,
        id: FrameGraphId<R>,
    ) -> R::SubResourceDescriptor {
        let rid = self.frame_graph.slots[id.index() as usize].rid;
        self.frame_graph.resources[rid]
            .resource_any()
            .downcast_ref::<Resource<R>>()
            .map(|r| r.sub_descriptor.clone())
            .unwrap_or_default()
    }

    /// The effective usage resolved during compile.
    pub fn get_usage<R: FrameGraphResource>(&self, id: FrameGraphId<R>) -> R::Usage {
        let rid = self.frame_graph.slots[id.index() as usize].rid;
        self.frame_graph.resources[rid]
            .resource_any()
            .downcast_ref::<Resource<R>>()
            .map(|r| r.usage)
            .unwrap_or_default()
    }

    /// Parameters and concrete target of the `id`-th render target declared
    /// by this pass, or `None` when the pass declared fewer targets.
    pub fn get_render_pass_info(&self, id: u32) -> Option<RenderPassInfo> {
        self.frame_graph.passes[self.pass]
            .render_targets()
            .get(id as usize)
            .map(|rt| RenderPassInfo {
                params: rt.params,
                target: rt.backend_target,
            })
    }
}
