//! The frame graph facade and per-pass builder.
//!
//! All graph objects live in index-addressed tables owned by the
//! [`FrameGraph`]: resource slots, virtual resources, resource nodes and
//! pass nodes. The tables act as the per-frame arena; `reset` (or dropping
//! the graph) releases everything at once, and handles are small
//! `(index, version)` values that never dangle.

use crate::backend::{DriverApi, RenderTargetHandle, ResourceAllocator, TargetBufferInfo};
use crate::error::FrameGraphError;
use crate::graph::{DependencyGraph, NodeId};
use crate::handle::{FrameGraphHandle, FrameGraphId};
use crate::pass::{AttachmentSlot, PassClosure, PassKind, PassNode, RenderTargetData};
use crate::render_target::{RenderTarget, RenderTargetDescriptor, ATTACHMENT_COUNT};
use crate::resource::{
    FrameGraphResource, ImportedRenderTarget, Resource, Texture, VirtualResource,
};
use crate::resource_node::{has_active_readers, has_writer, ResourceNode};
use crate::resources::FrameGraphResources;
use crate::types::{TextureDescriptor, TextureUsage, Viewport, ATTACHMENT_FLAGS};

/// Indirection from a handle index to the current resource and node.
///
/// Slots are stable for a handle's lifetime; `forward_subresource`
/// redirects the values inside a slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResourceSlot {
    pub rid: usize,
    pub nid: usize,
}

/// What a dependency graph node stands for.
#[derive(Debug, Clone, Copy)]
enum GraphNodeRef {
    Pass(usize),
    Resource(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Building,
    Compiled,
    Executed,
}

/// A declarative scheduler for one frame of GPU work.
///
/// Declare passes with [`FrameGraph::add_pass`]; each pass's setup closure
/// runs synchronously against a [`Builder`]. After declaration,
/// [`FrameGraph::compile`] culls unreferenced work and freezes the graph,
/// and [`FrameGraph::execute`] drives the retained passes in declaration
/// order.
///
/// ```ignore
/// let mut fg = FrameGraph::new();
///
/// #[derive(Default, Clone)]
/// struct DepthPassData {
///     depth: Option<FrameGraphId<Texture>>,
/// }
///
/// let pass = fg.add_pass::<DepthPassData, _, _>(
///     "depth",
///     |builder, data| {
///         let mut depth = builder.create("depth buffer", TextureDescriptor::new_2d(16, 32));
///         builder.use_as_targets(None, Some(&mut depth)).unwrap();
///         data.depth = Some(depth);
///     },
///     |resources, data, _driver| {
///         let depth = resources.get(data.depth.unwrap());
///         // issue backend commands against depth.handle
///     },
/// );
///
/// fg.present(pass.depth.unwrap()).unwrap();
/// fg.compile().unwrap();
/// fg.execute(&mut allocator, &mut driver).unwrap();
/// ```
pub struct FrameGraph {
    graph: DependencyGraph,
    pub(crate) slots: Vec<ResourceSlot>,
    pub(crate) resources: Vec<Box<dyn VirtualResource>>,
    resource_nodes: Vec<ResourceNode>,
    pub(crate) passes: Vec<PassNode>,
    node_refs: Vec<GraphNodeRef>,
    state: LifecycleState,
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGraph {
    /// Create an empty frame graph.
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
            slots: Vec::new(),
            resources: Vec::new(),
            resource_nodes: Vec::new(),
            passes: Vec::new(),
            node_refs: Vec::new(),
            state: LifecycleState::Building,
        }
    }

    /// Drop every declaration, returning the graph to an empty building
    /// state. Bulk-releases all passes, resources, nodes and edges.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.slots.clear();
        self.resources.clear();
        self.resource_nodes.clear();
        self.passes.clear();
        self.node_refs.clear();
        self.state = LifecycleState::Building;
    }

    /// Add a pass.
    ///
    /// `setup` runs synchronously and declares the pass's resources through
    /// the [`Builder`]. `execute` is stored and invoked during
    /// [`FrameGraph::execute`] with a read-only [`FrameGraphResources`]
    /// view; it must capture by value.
    ///
    /// Returns a copy of the pass data as it stood after setup, so later
    /// passes can pick up the handles this pass produced.
    pub fn add_pass<D, Setup, Execute>(&mut self, name: &str, setup: Setup, execute: Execute) -> D
    where
        D: Default + Clone + 'static,
        Setup: FnOnce(&mut Builder<'_>, &mut D),
        Execute: FnOnce(&FrameGraphResources<'_>, &D, &mut dyn DriverApi) + 'static,
    {
        let pass_index = self.passes.len();
        let node = self.new_graph_node(GraphNodeRef::Pass(pass_index));
        self.passes.push(PassNode::new_render(name, node));
        log::trace!("declared pass '{}'", name);

        let mut data = D::default();
        {
            let mut builder = Builder {
                frame_graph: self,
                pass: pass_index,
            };
            setup(&mut builder, &mut data);
        }

        let result = data.clone();
        if let PassKind::Render { executor, .. } = &mut self.passes[pass_index].kind {
            *executor = Some(Box::new(PassClosure { data, execute }));
        }
        result
    }

    /// Import an externally owned resource.
    ///
    /// The graph never creates or destroys imported resources; `allowed`
    /// restricts the usages passes may declare on it.
    pub fn import<R: FrameGraphResource>(
        &mut self,
        name: &str,
        descriptor: R::Descriptor,
        allowed: R::Usage,
        resource: R,
    ) -> FrameGraphId<R> {
        let handle = self.add_resource(Box::new(Resource::<R>::new_imported(
            name, descriptor, allowed, resource,
        )));
        FrameGraphId::new(handle)
    }

    /// Import a concrete render target as a texture-shaped resource.
    ///
    /// Declaring a render target whose color attachment is this resource
    /// uses `target` verbatim instead of allocating one.
    pub fn import_render_target(
        &mut self,
        name: &str,
        descriptor: TextureDescriptor,
        rt_descriptor: RenderTargetDescriptor,
        target: RenderTargetHandle,
    ) -> FrameGraphId<Texture> {
        let handle = self.add_resource(Box::new(ImportedRenderTarget::new(
            name,
            descriptor,
            rt_descriptor,
            target,
        )));
        FrameGraphId::new(handle)
    }

    /// Anchor a resource against culling with a synthetic present pass.
    pub fn present<R: FrameGraphResource>(
        &mut self,
        id: FrameGraphId<R>,
    ) -> Result<(), FrameGraphError> {
        self.validate(id.handle())?;
        let pass_index = self.passes.len();
        let node = self.new_graph_node(GraphNodeRef::Pass(pass_index));
        self.passes.push(PassNode::new_present(node));
        self.graph.make_target(node);
        self.read_internal(pass_index, id, R::Usage::default())?;
        Ok(())
    }

    /// Redirect the slot of `replaced` to the resource behind `subresource`.
    ///
    /// Acts like a write on `subresource` (its version advances); the
    /// `replaced` handle becomes permanently invalid, and anything that
    /// later resolves its slot lands on the forwarded resource.
    pub fn forward_subresource<R: FrameGraphResource>(
        &mut self,
        subresource: FrameGraphId<R>,
        replaced: FrameGraphId<R>,
    ) -> Result<FrameGraphId<R>, FrameGraphError> {
        let (sub_rid, _) = self.validate(subresource.handle())?;
        self.validate(replaced.handle())?;

        let version = self.resources[sub_rid].bump_version();
        let nid = self.push_resource_node(sub_rid);
        self.slots[subresource.index() as usize].nid = nid;
        self.slots[replaced.index() as usize] = ResourceSlot { rid: sub_rid, nid };
        log::trace!(
            "forwarded '{}' over slot {}",
            self.resources[sub_rid].name(),
            replaced.index()
        );
        Ok(FrameGraphId::new(FrameGraphHandle::new(
            subresource.index(),
            version,
        )))
    }

    /// Check whether a handle still refers to the current version of its
    /// resource.
    pub fn is_valid<R: FrameGraphResource>(&self, id: FrameGraphId<R>) -> bool {
        self.validate(id.handle()).is_ok()
    }

    /// Cull unreferenced passes, resolve effective usages and resource
    /// lifetimes, and finalize render target parameters.
    ///
    /// Must be called exactly once between declaration and execution.
    pub fn compile(&mut self) -> Result<&mut Self, FrameGraphError> {
        if self.state != LifecycleState::Building {
            return Err(FrameGraphError::DoubleCompile);
        }

        let culled = self.graph.cull();
        for node in culled {
            match self.node_refs[node.index()] {
                GraphNodeRef::Pass(index) => {
                    log::trace!("culled pass '{}'", self.passes[index].name);
                }
                GraphNodeRef::Resource(index) => {
                    let rid = self.resource_nodes[index].rid;
                    log::trace!("culled a version of '{}'", self.resources[rid].name());
                }
            }
        }

        // effective usage per resource, then fold subresources into their
        // ancestors (descending so grandchildren settle before children)
        for resource in &mut self.resources {
            resource.resolve_usage(&self.graph);
        }
        for rid in (0..self.resources.len()).rev() {
            if let Some(parent) = self.resources[rid].parent_handle() {
                let parent_rid = self.slots[parent.index() as usize].rid;
                debug_assert!(parent_rid < rid, "parents are created before children");
                let (left, right) = self.resources.split_at_mut(rid);
                left[parent_rid].merge_usage_of_child(right[0].as_ref());
            }
        }

        // first/last pass per resource, walking up the parent chain so the
        // owning resource brackets every use of its subresources
        for pass_index in 0..self.passes.len() {
            let node = self.passes[pass_index].node;
            if self.graph.is_culled(node) {
                continue;
            }
            let mut rids = Vec::new();
            for &edge in self.graph.incoming_edges(node) {
                let from = self.graph.edge(edge).from;
                if let GraphNodeRef::Resource(index) = self.node_refs[from.index()] {
                    rids.push(self.resource_nodes[index].rid);
                }
            }
            for &edge in self.graph.outgoing_edges(node) {
                let to = self.graph.edge(edge).to;
                if let GraphNodeRef::Resource(index) = self.node_refs[to.index()] {
                    rids.push(self.resource_nodes[index].rid);
                }
            }
            for rid in rids {
                let mut current = Some(rid);
                while let Some(rid) = current {
                    self.resources[rid].needed_by_pass(pass_index);
                    current = self.resources[rid]
                        .parent_handle()
                        .map(|p| self.slots[p.index() as usize].rid);
                }
            }
        }

        for rid in 0..self.resources.len() {
            if let (Some(first), Some(last)) = (self.resources[rid].first(), self.resources[rid].last())
            {
                self.passes[first].devirtualize.push(rid);
                self.passes[last].destroy.push(rid);
            }
        }

        self.resolve_render_targets();

        log::debug!(
            "frame graph compiled: {}/{} passes retained",
            self.retained_pass_count(),
            self.passes.len()
        );
        self.state = LifecycleState::Compiled;
        Ok(self)
    }

    /// Run every retained pass in declaration order.
    ///
    /// Around each pass, resources entering their first use are
    /// devirtualized through `allocator` and resources past their last use
    /// are destroyed; render targets are materialized for the duration of
    /// the pass's execute callback.
    pub fn execute(
        &mut self,
        allocator: &mut dyn ResourceAllocator,
        driver: &mut dyn DriverApi,
    ) -> Result<(), FrameGraphError> {
        if self.state != LifecycleState::Compiled {
            return Err(FrameGraphError::ExecuteBeforeCompile);
        }

        for pass_index in 0..self.passes.len() {
            if self.graph.is_culled(self.passes[pass_index].node) {
                log::trace!("skipping culled pass '{}'", self.passes[pass_index].name);
                continue;
            }
            log::trace!("executing pass '{}'", self.passes[pass_index].name);

            let to_create = self.passes[pass_index].devirtualize.clone();
            for rid in to_create {
                let parent_rid = self.resources[rid]
                    .parent_handle()
                    .map(|p| self.slots[p.index() as usize].rid);
                match parent_rid {
                    Some(parent_rid) => {
                        debug_assert!(parent_rid < rid);
                        let (left, right) = self.resources.split_at_mut(rid);
                        right[0].devirtualize(allocator, Some(left[parent_rid].as_ref()));
                    }
                    None => self.resources[rid].devirtualize(allocator, None),
                }
            }

            self.devirtualize_render_targets(pass_index, allocator);

            if let Some(executor) = self.passes[pass_index].take_executor() {
                let resources = FrameGraphResources::new(self, pass_index);
                executor.execute(&resources, driver);
            }

            self.destroy_render_targets(pass_index, allocator);

            let to_destroy = self.passes[pass_index].destroy.clone();
            for rid in to_destroy {
                self.resources[rid].destroy(allocator);
            }
        }

        self.state = LifecycleState::Executed;
        Ok(())
    }

    /// Number of declared passes, including synthetic present passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Number of declared virtual resources.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of passes that survived culling. Before `compile`, every
    /// declared pass counts as retained.
    pub fn retained_pass_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|pass| !self.graph.is_culled(pass.node))
            .count()
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn new_graph_node(&mut self, reference: GraphNodeRef) -> NodeId {
        let node = self.graph.add_node();
        debug_assert_eq!(node.index(), self.node_refs.len());
        self.node_refs.push(reference);
        node
    }

    /// Create a resource node for the current version of `rid`, linking it
    /// to its parent's current node for subresources.
    fn push_resource_node(&mut self, rid: usize) -> usize {
        let index = self.resource_nodes.len();
        let node = self.new_graph_node(GraphNodeRef::Resource(index));
        let mut resource_node = ResourceNode::new(node, rid);
        if let Some(parent) = self.resources[rid].parent_handle() {
            let parent_nid = self.slots[parent.index() as usize].nid;
            let edge = self
                .graph
                .add_edge(node, self.resource_nodes[parent_nid].node);
            resource_node.parent_edge = Some(edge);
            resource_node.parent_node = Some(parent_nid);
            self.resource_nodes[parent_nid].children.push(index);
        }
        self.resource_nodes.push(resource_node);
        index
    }

    fn add_resource(&mut self, resource: Box<dyn VirtualResource>) -> FrameGraphHandle {
        let rid = self.resources.len();
        self.resources.push(resource);
        let slot_index = self.slots.len();
        // reserve the slot before the node so parent lookups resolve
        self.slots.push(ResourceSlot { rid, nid: 0 });
        let nid = self.push_resource_node(rid);
        self.slots[slot_index].nid = nid;
        FrameGraphHandle::new(slot_index as u16, 0)
    }

    fn validate(&self, handle: FrameGraphHandle) -> Result<(usize, usize), FrameGraphError> {
        let slot = self
            .slots
            .get(handle.index() as usize)
            .ok_or(FrameGraphError::InvalidHandle)?;
        if self.resources[slot.rid].version() != handle.version() {
            return Err(FrameGraphError::InvalidHandle);
        }
        Ok((slot.rid, slot.nid))
    }

    fn typed<R: FrameGraphResource>(&self, rid: usize) -> Result<&Resource<R>, FrameGraphError> {
        self.resources[rid]
            .resource_any()
            .downcast_ref::<Resource<R>>()
            .ok_or(FrameGraphError::InvalidHandle)
    }

    fn read_internal<R: FrameGraphResource>(
        &mut self,
        pass: usize,
        id: FrameGraphId<R>,
        usage: R::Usage,
    ) -> Result<FrameGraphId<R>, FrameGraphError> {
        let (rid, nid) = self.validate(id.handle())?;
        if !self.typed::<R>(rid)?.is_usage_allowed(usage) {
            return Err(FrameGraphError::IncompatibleUsage);
        }

        let edge = self
            .graph
            .add_edge(self.resource_nodes[nid].node, self.passes[pass].node);
        self.resource_nodes[nid].readers.push(edge);
        if let Some(resource) = self.resources[rid]
            .resource_any_mut()
            .downcast_mut::<Resource<R>>()
        {
            resource.record_read(edge, usage);
        }
        Ok(id)
    }

    fn write_internal<R: FrameGraphResource>(
        &mut self,
        pass: usize,
        id: FrameGraphId<R>,
        usage: R::Usage,
    ) -> Result<FrameGraphId<R>, FrameGraphError> {
        let (rid, _) = self.validate(id.handle())?;
        if !self.typed::<R>(rid)?.is_usage_allowed(usage) {
            return Err(FrameGraphError::IncompatibleUsage);
        }

        // a write renames the resource: new version, new node, and the
        // handle that was written through goes stale
        let version = self.resources[rid].bump_version();
        let nid = self.push_resource_node(rid);
        self.slots[id.index() as usize].nid = nid;

        let edge = self
            .graph
            .add_edge(self.passes[pass].node, self.resource_nodes[nid].node);
        self.resource_nodes[nid].writer = Some(edge);
        if let Some(resource) = self.resources[rid]
            .resource_any_mut()
            .downcast_mut::<Resource<R>>()
        {
            resource.record_write(edge, usage);
        }
        Ok(FrameGraphId::new(FrameGraphHandle::new(
            id.index(),
            version,
        )))
    }

    fn create_internal<R: FrameGraphResource>(
        &mut self,
        name: &str,
        descriptor: R::Descriptor,
    ) -> FrameGraphId<R> {
        let handle = self.add_resource(Box::new(Resource::<R>::new(name, descriptor)));
        FrameGraphId::new(handle)
    }

    fn create_subresource_internal<R: FrameGraphResource>(
        &mut self,
        parent: &mut FrameGraphId<R>,
        name: &str,
        sub_descriptor: R::SubResourceDescriptor,
    ) -> Result<FrameGraphId<R>, FrameGraphError> {
        let (parent_rid, _) = self.validate(parent.handle())?;
        let descriptor = self.typed::<R>(parent_rid)?.descriptor.clone();

        let child = Box::new(Resource::<R>::new_subresource(
            name,
            parent.handle(),
            descriptor,
            sub_descriptor,
        ));
        let child_handle = self.add_resource(child);

        // the subresource counts as a new generation of the parent
        let version = self.resources[parent_rid].bump_version();
        let nid = self.push_resource_node(parent_rid);
        self.slots[parent.index() as usize].nid = nid;
        *parent = FrameGraphId::new(FrameGraphHandle::new(parent.index(), version));

        Ok(FrameGraphId::new(child_handle))
    }

    fn declare_render_target(
        &mut self,
        pass: usize,
        name: &str,
        descriptor: RenderTargetDescriptor,
    ) -> Result<RenderTarget, FrameGraphError> {
        // vet the whole declaration before mutating anything
        let mut samples = None;
        let mut any = false;
        for slot in 0..ATTACHMENT_COUNT {
            let Some(id) = descriptor.attachments.slot(slot) else {
                continue;
            };
            any = true;
            let (rid, _) = self.validate(id.handle())?;
            let resource = self.typed::<Texture>(rid)?;
            if !resource.is_usage_allowed(attachment_usage(slot)) {
                return Err(FrameGraphError::IncompatibleUsage);
            }
            let attachment_samples = resource.descriptor.samples;
            match samples {
                Some(samples) if samples != attachment_samples => {
                    return Err(FrameGraphError::RenderTargetMisconfigured(format!(
                        "attachment sample counts conflict ({samples} vs {attachment_samples})"
                    )));
                }
                _ => samples = Some(attachment_samples),
            }
        }
        if !any {
            return Err(FrameGraphError::RenderTargetMisconfigured(
                "render target declares no attachments".to_string(),
            ));
        }

        let mut data = RenderTargetData::new(name, descriptor.clone());
        let mut attachments = descriptor.attachments;
        for slot in 0..ATTACHMENT_COUNT {
            let Some(id) = descriptor.attachments.slot(slot) else {
                continue;
            };
            let pre_nid = self.slots[id.index() as usize].nid;
            let fresh = self.resource_nodes[pre_nid].is_untouched();
            let written = self.write_internal(pass, id, attachment_usage(slot))?;
            data.attachments[slot] = Some(AttachmentSlot {
                handle: written.handle(),
                // a freshly created attachment carries nothing to load
                incoming: if fresh { None } else { Some(pre_nid) },
                outgoing: self.slots[id.index() as usize].nid,
            });
            attachments.set_slot(slot, written);
            data.target_flags |= ATTACHMENT_FLAGS[slot];
        }

        if let Some(color0) = &data.attachments[0] {
            let rid = self.slots[color0.handle.index() as usize].rid;
            if let Some(imported) = self.resources[rid].imported_render_target() {
                data.imported = true;
                data.imported_target = imported.target;
                data.descriptor.samples = imported.rt_descriptor.samples;
                if data.descriptor.viewport.is_empty() {
                    data.descriptor.viewport = imported.rt_descriptor.viewport;
                }
            }
        }

        data.params.clear_color = data.descriptor.clear_color;
        data.params.flags.clear = data.descriptor.clear_flags & data.target_flags;

        let id = match &mut self.passes[pass].kind {
            PassKind::Render { render_targets, .. } => {
                render_targets.push(data);
                (render_targets.len() - 1) as u32
            }
            PassKind::Present => unreachable!("present passes declare no render targets"),
        };
        Ok(RenderTarget { attachments, id })
    }

    /// Finalize discard flags, viewports and sample counts for every
    /// retained render pass.
    fn resolve_render_targets(&mut self) {
        for pass_index in 0..self.passes.len() {
            if self.graph.is_culled(self.passes[pass_index].node) {
                continue;
            }
            for rt_index in 0..self.passes[pass_index].render_targets().len() {
                self.resolve_one_render_target(pass_index, rt_index);
            }
        }
    }

    fn resolve_one_render_target(&mut self, pass_index: usize, rt_index: usize) {
        {
            let graph = &self.graph;
            let resource_nodes = &self.resource_nodes;
            let rt = &mut self.passes[pass_index].render_targets_mut()[rt_index];

            for slot in 0..ATTACHMENT_COUNT {
                let Some(att) = rt.attachments[slot] else {
                    continue;
                };
                let flag = ATTACHMENT_FLAGS[slot];
                // every present attachment starts out discarded on both ends
                rt.params.flags.discard_start |= flag;
                rt.params.flags.discard_end |= flag;
                if has_active_readers(resource_nodes, graph, att.outgoing) {
                    rt.params.flags.discard_end &= !flag;
                }
                if let Some(incoming) = att.incoming {
                    if has_writer(resource_nodes, incoming) {
                        rt.params.flags.discard_start &= !flag;
                    }
                }
            }
            // clearing an attachment makes its previous contents undefined
            rt.params.flags.discard_start |= rt.params.flags.clear;
        }

        // viewport: derive from level-adjusted attachment extents when the
        // declaration left it empty
        let viewport_empty = self.passes[pass_index].render_targets()[rt_index]
            .descriptor
            .viewport
            .is_empty();
        if viewport_empty {
            let mut width = 0;
            let mut height = 0;
            for slot in 0..ATTACHMENT_COUNT {
                let Some(att) = self.passes[pass_index].render_targets()[rt_index].attachments[slot]
                else {
                    continue;
                };
                let rid = self.slots[att.handle.index() as usize].rid;
                if let Ok(resource) = self.typed::<Texture>(rid) {
                    let level = resource.sub_descriptor.level;
                    width = width.max(resource.descriptor.level_width(level));
                    height = height.max(resource.descriptor.level_height(level));
                }
            }
            let rt = &mut self.passes[pass_index].render_targets_mut()[rt_index];
            rt.descriptor.viewport = Viewport::new(width, height);
        }
        {
            let rt = &mut self.passes[pass_index].render_targets_mut()[rt_index];
            rt.params.viewport = rt.descriptor.viewport;
        }

        // a multisampled target propagates its sample count to attachments
        // that are never sampled directly
        let (imported, samples) = {
            let rt = &self.passes[pass_index].render_targets()[rt_index];
            (rt.imported, rt.descriptor.samples)
        };
        if !imported && samples > 1 {
            for slot in 0..ATTACHMENT_COUNT {
                let Some(att) = self.passes[pass_index].render_targets()[rt_index].attachments[slot]
                else {
                    continue;
                };
                let rid = self.slots[att.handle.index() as usize].rid;
                if let Some(resource) = self.resources[rid]
                    .resource_any_mut()
                    .downcast_mut::<Resource<Texture>>()
                {
                    if !resource.usage.contains(TextureUsage::SAMPLEABLE) {
                        resource.descriptor.samples = samples;
                    }
                }
            }
        }
    }

    fn devirtualize_render_targets(
        &mut self,
        pass_index: usize,
        allocator: &mut dyn ResourceAllocator,
    ) {
        for rt_index in 0..self.passes[pass_index].render_targets().len() {
            let (imported, imported_target) = {
                let rt = &self.passes[pass_index].render_targets()[rt_index];
                (rt.imported, rt.imported_target)
            };
            if imported {
                self.passes[pass_index].render_targets_mut()[rt_index].backend_target =
                    imported_target;
                continue;
            }

            let mut color = [TargetBufferInfo::default(); 4];
            let mut depth = TargetBufferInfo::default();
            let mut stencil = TargetBufferInfo::default();
            let (name, flags, viewport, samples) = {
                let rt = &self.passes[pass_index].render_targets()[rt_index];
                for slot in 0..ATTACHMENT_COUNT {
                    let Some(att) = rt.attachments[slot] else {
                        continue;
                    };
                    let rid = self.slots[att.handle.index() as usize].rid;
                    let Ok(resource) = self.typed::<Texture>(rid) else {
                        continue;
                    };
                    let info = TargetBufferInfo {
                        handle: resource.resource.handle,
                        level: resource.sub_descriptor.level,
                        layer: resource.sub_descriptor.layer,
                    };
                    match slot {
                        0..=3 => color[slot] = info,
                        4 => depth = info,
                        _ => stencil = info,
                    }
                }
                (
                    rt.name.clone(),
                    rt.target_flags,
                    rt.params.viewport,
                    rt.descriptor.samples,
                )
            };

            let target = allocator.create_render_target(
                &name,
                flags,
                viewport.width,
                viewport.height,
                samples,
                &color,
                depth,
                stencil,
            );
            self.passes[pass_index].render_targets_mut()[rt_index].backend_target = target;
        }
    }

    fn destroy_render_targets(&mut self, pass_index: usize, allocator: &mut dyn ResourceAllocator) {
        for rt in self.passes[pass_index].render_targets_mut() {
            if !rt.imported && !rt.backend_target.is_null() {
                allocator.destroy_render_target(rt.backend_target);
            }
            rt.backend_target = RenderTargetHandle::default();
        }
    }
}

fn attachment_usage(slot: usize) -> TextureUsage {
    match slot {
        0..=3 => TextureUsage::COLOR_ATTACHMENT,
        4 => TextureUsage::DEPTH_ATTACHMENT,
        _ => TextureUsage::STENCIL_ATTACHMENT,
    }
}

/// Scoped, per-pass capability mediating all graph mutation during setup.
///
/// A builder only lives for the duration of its pass's setup closure and
/// cannot outlive the pass.
pub struct Builder<'a> {
    frame_graph: &'a mut FrameGraph,
    pass: usize,
}

impl Builder<'_> {
    /// Create a virtual resource.
    pub fn create<R: FrameGraphResource>(
        &mut self,
        name: &str,
        descriptor: R::Descriptor,
    ) -> FrameGraphId<R> {
        self.frame_graph.create_internal(name, descriptor)
    }

    /// Create a subresource aliasing a portion of `parent`.
    ///
    /// The parent advances to a new version; the caller's handle is
    /// rewritten to it.
    pub fn create_subresource<R: FrameGraphResource>(
        &mut self,
        parent: &mut FrameGraphId<R>,
        name: &str,
        sub_descriptor: R::SubResourceDescriptor,
    ) -> Result<FrameGraphId<R>, FrameGraphError> {
        self.frame_graph
            .create_subresource_internal(parent, name, sub_descriptor)
    }

    /// Declare a read of `id` by this pass. The handle stays valid.
    pub fn read<R: FrameGraphResource>(
        &mut self,
        id: FrameGraphId<R>,
        usage: R::Usage,
    ) -> Result<FrameGraphId<R>, FrameGraphError> {
        self.frame_graph.read_internal(self.pass, id, usage)
    }

    /// Declare a write of `id` by this pass.
    ///
    /// Returns the handle of the new resource version; `id` goes stale and
    /// any further use of it fails with
    /// [`FrameGraphError::InvalidHandle`].
    pub fn write<R: FrameGraphResource>(
        &mut self,
        id: FrameGraphId<R>,
        usage: R::Usage,
    ) -> Result<FrameGraphId<R>, FrameGraphError> {
        self.frame_graph.write_internal(self.pass, id, usage)
    }

    /// Declare a render target for this pass.
    ///
    /// Writes every valid attachment with the slot-specific attachment
    /// usage; the returned [`RenderTarget`] carries the post-write handles
    /// and the id to fetch the concrete target during execute. A read of an
    /// attachment, if needed, must be declared before this call.
    pub fn use_as_render_target(
        &mut self,
        name: &str,
        descriptor: RenderTargetDescriptor,
    ) -> Result<RenderTarget, FrameGraphError> {
        self.frame_graph
            .declare_render_target(self.pass, name, descriptor)
    }

    /// Declare a render target with a single color attachment, rewriting
    /// the caller's handle to the post-write version. Returns the target id.
    pub fn use_as_color_target(
        &mut self,
        color: &mut FrameGraphId<Texture>,
    ) -> Result<u32, FrameGraphError> {
        self.use_as_targets(Some(color), None)
    }

    /// Declare a render target from optional color and depth attachments,
    /// rewriting the caller's handles to their post-write versions. At
    /// least one attachment must be given. Returns the target id.
    pub fn use_as_targets(
        &mut self,
        color: Option<&mut FrameGraphId<Texture>>,
        depth: Option<&mut FrameGraphId<Texture>>,
    ) -> Result<u32, FrameGraphError> {
        let mut descriptor = RenderTargetDescriptor::default();
        if let Some(id) = color.as_deref() {
            descriptor.attachments.color[0] = Some(*id);
        }
        if let Some(id) = depth.as_deref() {
            descriptor.attachments.depth = Some(*id);
        }
        let name = descriptor
            .attachments
            .slot(0)
            .or(descriptor.attachments.slot(4))
            .map(|id| {
                let rid = self.frame_graph.slots[id.index() as usize].rid;
                self.frame_graph.resources[rid].name().to_string()
            })
            .unwrap_or_default();

        let target = self
            .frame_graph
            .declare_render_target(self.pass, &name, descriptor)?;
        if let Some(color) = color {
            if let Some(id) = target.attachments.color[0] {
                *color = id;
            }
        }
        if let Some(depth) = depth {
            if let Some(id) = target.attachments.depth {
                *depth = id;
            }
        }
        Ok(target.id)
    }

    /// Check whether a handle still refers to the current version of its
    /// resource.
    pub fn is_valid<R: FrameGraphResource>(&self, id: FrameGraphId<R>) -> bool {
        self.frame_graph.is_valid(id)
    }

    /// Mark this pass as having side effects, pinning it against culling.
    pub fn side_effect(&mut self) {
        let node = self.frame_graph.passes[self.pass].node;
        self.frame_graph.graph.make_target(node);
    }

    /// The descriptor a resource was declared with.
    pub fn get_descriptor<R: FrameGraphResource>(
        &self,
        id: FrameGraphId<R>,
    ) -> Result<R::Descriptor, FrameGraphError> {
        let (rid, _) = self.frame_graph.validate(id.handle())?;
        Ok(self.frame_graph.typed::<R>(rid)?.descriptor.clone())
    }

    /// The subresource selection of a resource.
    pub fn get_sub_descriptor<R: FrameGraphResource>(
        &self,
        id: FrameGraphId<R>,
    ) -> Result<R::SubResourceDescriptor, FrameGraphError> {
        let (rid, _) = self.frame_graph.validate(id.handle())?;
        Ok(self.frame_graph.typed::<R>(rid)?.sub_descriptor.clone())
    }

    /// The name a resource was declared with. Works through stale handles,
    /// since the slot outlives every version.
    pub fn get_name(&self, handle: FrameGraphHandle) -> &str {
        let rid = self.frame_graph.slots[handle.index() as usize].rid;
        self.frame_graph.resources[rid].name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyAllocator;
    use crate::types::TextureDescriptor;

    struct NoopDriver;

    #[derive(Default, Clone)]
    struct Empty;

    #[test]
    fn test_write_invalidates_input_handle() {
        let mut fg = FrameGraph::new();
        let mut stale = None;
        let mut current = None;
        fg.add_pass::<Empty, _, _>(
            "producer",
            |builder, _| {
                let created = builder.create::<Texture>("buffer", TextureDescriptor::new_2d(4, 4));
                let written = builder
                    .write(created, TextureUsage::COLOR_ATTACHMENT)
                    .unwrap();
                stale = Some(created);
                current = Some(written);
            },
            |_, _, _| {},
        );
        assert!(!fg.is_valid(stale.unwrap()));
        assert!(fg.is_valid(current.unwrap()));
    }

    #[test]
    fn test_stale_handle_write_fails() {
        let mut fg = FrameGraph::new();
        fg.add_pass::<Empty, _, _>(
            "producer",
            |builder, _| {
                let created = builder.create::<Texture>("buffer", TextureDescriptor::new_2d(4, 4));
                let _written = builder
                    .write(created, TextureUsage::COLOR_ATTACHMENT)
                    .unwrap();
                assert_eq!(
                    builder.write(created, TextureUsage::COLOR_ATTACHMENT),
                    Err(FrameGraphError::InvalidHandle)
                );
            },
            |_, _, _| {},
        );
    }

    #[test]
    fn test_versions_increase_monotonically() {
        let mut fg = FrameGraph::new();
        fg.add_pass::<Empty, _, _>(
            "producer",
            |builder, _| {
                let v0 = builder.create::<Texture>("buffer", TextureDescriptor::new_2d(4, 4));
                let v1 = builder.write(v0, TextureUsage::COLOR_ATTACHMENT).unwrap();
                let v2 = builder.write(v1, TextureUsage::COLOR_ATTACHMENT).unwrap();
                assert!(v0.version() < v1.version());
                assert!(v1.version() < v2.version());
            },
            |_, _, _| {},
        );
    }

    #[test]
    fn test_read_keeps_handle_valid() {
        let mut fg = FrameGraph::new();
        let mut handle = None;
        fg.add_pass::<Empty, _, _>(
            "reader",
            |builder, _| {
                let id = builder.create::<Texture>("buffer", TextureDescriptor::new_2d(4, 4));
                let read = builder.read(id, TextureUsage::SAMPLEABLE).unwrap();
                assert_eq!(id, read);
                handle = Some(id);
            },
            |_, _, _| {},
        );
        assert!(fg.is_valid(handle.unwrap()));
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut fg = FrameGraph::new();
        let mut allocator = DummyAllocator::new();
        let mut driver = NoopDriver;
        assert_eq!(
            fg.execute(&mut allocator, &mut driver),
            Err(FrameGraphError::ExecuteBeforeCompile)
        );
        fg.compile().unwrap();
        assert_eq!(fg.compile().err(), Some(FrameGraphError::DoubleCompile));
        fg.execute(&mut allocator, &mut driver).unwrap();
        assert_eq!(
            fg.execute(&mut allocator, &mut driver),
            Err(FrameGraphError::ExecuteBeforeCompile)
        );
    }

    #[test]
    fn test_imported_usage_rejected() {
        let mut fg = FrameGraph::new();
        let imported = fg.import(
            "backbuffer",
            TextureDescriptor::new_2d(320, 200),
            TextureUsage::COLOR_ATTACHMENT,
            Texture::default(),
        );
        fg.add_pass::<Empty, _, _>(
            "upload",
            |builder, _| {
                assert_eq!(
                    builder.write(imported, TextureUsage::UPLOADABLE),
                    Err(FrameGraphError::IncompatibleUsage)
                );
                // the failed write must not have advanced the version
                assert_eq!(builder.read(imported, TextureUsage::NONE), Ok(imported));
            },
            |_, _, _| {},
        );
        assert!(fg.is_valid(imported));
    }

    #[test]
    fn test_empty_render_target_rejected() {
        let mut fg = FrameGraph::new();
        fg.add_pass::<Empty, _, _>(
            "empty",
            |builder, _| {
                let result = builder.use_as_render_target("rt", RenderTargetDescriptor::default());
                assert!(matches!(
                    result,
                    Err(FrameGraphError::RenderTargetMisconfigured(_))
                ));
            },
            |_, _, _| {},
        );
    }

    #[test]
    fn test_forward_subresource_invalidates_replaced() {
        let mut fg = FrameGraph::new();
        let mut parent = None;
        let mut sub = None;
        let mut replaced = None;
        fg.add_pass::<Empty, _, _>(
            "setup",
            |builder, _| {
                let mut p =
                    builder.create::<Texture>("parent", TextureDescriptor::new_2d(8, 8).with_levels(2));
                let s = builder
                    .create_subresource(
                        &mut p,
                        "parent mip 1",
                        crate::types::TextureSubResourceDescriptor { level: 1, layer: 0 },
                    )
                    .unwrap();
                let r = builder.create::<Texture>("replaced", TextureDescriptor::new_2d(8, 8));
                parent = Some(p);
                sub = Some(s);
                replaced = Some(r);
            },
            |_, _, _| {},
        );

        let forwarded = fg
            .forward_subresource(sub.unwrap(), replaced.unwrap())
            .unwrap();
        assert!(!fg.is_valid(replaced.unwrap()));
        assert!(!fg.is_valid(sub.unwrap()));
        assert!(fg.is_valid(forwarded));

        // the replaced slot now resolves to the forwarded resource and a
        // forward on the stale handle keeps failing
        assert_eq!(
            fg.forward_subresource(sub.unwrap(), replaced.unwrap()),
            Err(FrameGraphError::InvalidHandle)
        );
    }

    #[test]
    fn test_unreferenced_pass_is_culled() {
        let mut fg = FrameGraph::new();
        fg.add_pass::<Empty, _, _>(
            "dead",
            |builder, _| {
                let mut id = builder.create::<Texture>("junk", TextureDescriptor::new_2d(4, 4));
                builder.use_as_color_target(&mut id).unwrap();
            },
            |_, _, _| panic!("culled pass must not execute"),
        );
        fg.compile().unwrap();
        assert_eq!(fg.retained_pass_count(), 0);

        let mut allocator = DummyAllocator::new();
        let mut driver = NoopDriver;
        fg.execute(&mut allocator, &mut driver).unwrap();
        assert_eq!(allocator.textures_created, 0);
        assert_eq!(allocator.render_targets_created, 0);
    }

    #[test]
    fn test_side_effect_pins_pass() {
        use std::cell::Cell;
        use std::rc::Rc;

        let ran = Rc::new(Cell::new(false));
        let observed = ran.clone();

        let mut fg = FrameGraph::new();
        fg.add_pass::<Empty, _, _>(
            "side effects",
            |builder, _| {
                let mut id = builder.create::<Texture>("junk", TextureDescriptor::new_2d(4, 4));
                builder.use_as_color_target(&mut id).unwrap();
                builder.side_effect();
            },
            move |_, _, _| observed.set(true),
        );
        fg.compile().unwrap();
        assert_eq!(fg.retained_pass_count(), 1);

        let mut allocator = DummyAllocator::new();
        let mut driver = NoopDriver;
        fg.execute(&mut allocator, &mut driver).unwrap();
        assert!(ran.get());
        // the render target the pass declared was created and released
        assert_eq!(allocator.render_targets_created, 1);
        assert_eq!(allocator.render_targets_destroyed, 1);
    }
}
