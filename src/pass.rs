//! Pass nodes.
//!
//! Every declared pass owns a node in the dependency graph, the lists of
//! resources to devirtualize and destroy around its execution, and either a
//! user execute callback with its declared render targets, or nothing at
//! all for the synthetic present pass that anchors presented resources
//! against culling.

use crate::backend::{DriverApi, RenderTargetHandle};
use crate::graph::NodeId;
use crate::handle::FrameGraphHandle;
use crate::render_target::{RenderTargetDescriptor, ATTACHMENT_COUNT};
use crate::resources::FrameGraphResources;
use crate::types::{RenderPassParams, TargetBufferFlags};

/// Type-erased carrier for a pass's data and execute callback.
pub(crate) trait PassExecutor {
    fn execute(self: Box<Self>, resources: &FrameGraphResources<'_>, driver: &mut dyn DriverApi);
}

/// Pairs a user data struct with its execute closure.
pub(crate) struct PassClosure<D, E> {
    pub data: D,
    pub execute: E,
}

impl<D, E> PassExecutor for PassClosure<D, E>
where
    E: FnOnce(&FrameGraphResources<'_>, &D, &mut dyn DriverApi),
{
    fn execute(self: Box<Self>, resources: &FrameGraphResources<'_>, driver: &mut dyn DriverApi) {
        (self.execute)(resources, &self.data, driver);
    }
}

/// One attachment slot of a declared render target.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttachmentSlot {
    /// Post-write handle of the attachment.
    pub handle: FrameGraphHandle,
    /// Resource node holding the pre-write contents; `None` when the
    /// attachment was freshly created and carries nothing to load.
    pub incoming: Option<usize>,
    /// Resource node produced by the attachment write.
    pub outgoing: usize,
}

/// A render target declared by a pass, with everything compile and execute
/// need: attachment nodes for discard inference, the materialized pass
/// params, and the backend target devirtualized around the execute callback.
pub(crate) struct RenderTargetData {
    pub name: String,
    pub descriptor: RenderTargetDescriptor,
    pub attachments: [Option<AttachmentSlot>; ATTACHMENT_COUNT],
    /// Attachment slots actually present.
    pub target_flags: TargetBufferFlags,
    pub params: RenderPassParams,
    /// Set when the color0 attachment resolves to an imported render target.
    pub imported: bool,
    /// The pre-bound backend target for imported entries.
    pub imported_target: RenderTargetHandle,
    /// Concrete target; valid only while the declaring pass executes.
    pub backend_target: RenderTargetHandle,
}

impl RenderTargetData {
    pub(crate) fn new(name: &str, descriptor: RenderTargetDescriptor) -> Self {
        Self {
            name: name.to_string(),
            descriptor,
            attachments: [None; ATTACHMENT_COUNT],
            target_flags: TargetBufferFlags::NONE,
            params: RenderPassParams::default(),
            imported: false,
            imported_target: RenderTargetHandle::default(),
            backend_target: RenderTargetHandle::default(),
        }
    }
}

/// Pass payload specific to the pass kind.
pub(crate) enum PassKind {
    /// A user pass: execute callback plus declared render targets.
    Render {
        executor: Option<Box<dyn PassExecutor>>,
        render_targets: Vec<RenderTargetData>,
    },
    /// Synthetic sink pass created by `present`.
    Present,
}

/// A declared pass.
pub(crate) struct PassNode {
    pub name: String,
    /// Backing dependency graph node.
    pub node: NodeId,
    /// Resources to instantiate before this pass runs (their first use).
    pub devirtualize: Vec<usize>,
    /// Resources to release after this pass runs (their last use).
    pub destroy: Vec<usize>,
    pub kind: PassKind,
}

impl PassNode {
    pub(crate) fn new_render(name: &str, node: NodeId) -> Self {
        Self {
            name: name.to_string(),
            node,
            devirtualize: Vec::new(),
            destroy: Vec::new(),
            kind: PassKind::Render {
                executor: None,
                render_targets: Vec::new(),
            },
        }
    }

    pub(crate) fn new_present(node: NodeId) -> Self {
        Self {
            name: "Present".to_string(),
            node,
            devirtualize: Vec::new(),
            destroy: Vec::new(),
            kind: PassKind::Present,
        }
    }

    pub(crate) fn render_targets(&self) -> &[RenderTargetData] {
        match &self.kind {
            PassKind::Render { render_targets, .. } => render_targets,
            PassKind::Present => &[],
        }
    }

    pub(crate) fn render_targets_mut(&mut self) -> &mut [RenderTargetData] {
        match &mut self.kind {
            PassKind::Render { render_targets, .. } => render_targets,
            PassKind::Present => &mut [],
        }
    }

    pub(crate) fn take_executor(&mut self) -> Option<Box<dyn PassExecutor>> {
        match &mut self.kind {
            PassKind::Render { executor, .. } => executor.take(),
            PassKind::Present => None,
        }
    }
}
