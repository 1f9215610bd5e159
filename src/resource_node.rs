//! Versioned resource nodes.
//!
//! Each node represents one generation of a virtual resource: it carries at
//! most one writer edge (the pass that produced this version) and any number
//! of reader edges. Subresource lineage is expressed through a parent edge
//! from the child node to the parent's node current at creation time, with a
//! back-link list on the parent side.

use crate::graph::{DependencyGraph, EdgeId, NodeId};

/// One version of a virtual resource inside the dependency graph.
#[derive(Debug)]
pub(crate) struct ResourceNode {
    /// Backing dependency graph node.
    pub node: NodeId,
    /// Index of the virtual resource this node is a version of.
    pub rid: usize,
    /// The write edge that produced this version, if any.
    pub writer: Option<EdgeId>,
    /// Read edges from this version to passes.
    pub readers: Vec<EdgeId>,
    /// Edge to the parent resource's node, for subresources.
    pub parent_edge: Option<EdgeId>,
    /// Resource-node index of the parent, for subresources.
    pub parent_node: Option<usize>,
    /// Resource-node indices of children pointing at this node.
    pub children: Vec<usize>,
}

impl ResourceNode {
    pub(crate) fn new(node: NodeId, rid: usize) -> Self {
        Self {
            node,
            rid,
            writer: None,
            readers: Vec::new(),
            parent_edge: None,
            parent_node: None,
            children: Vec::new(),
        }
    }

    /// Whether this version was never written or read. Used to detect
    /// freshly created attachments when declaring render targets.
    pub(crate) fn is_untouched(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }
}

/// Whether anything downstream still observes the contents of this version.
///
/// True when a valid reader edge leads to a retained pass, when the parent
/// edge leads to a retained parent node (the shared device object lives on
/// through the parent), or when any descendant version still has retained
/// readers. Drives the discard-end inference: contents with an active
/// reader must be preserved past the producing pass.
pub(crate) fn has_active_readers(
    nodes: &[ResourceNode],
    graph: &DependencyGraph,
    index: usize,
) -> bool {
    let node = &nodes[index];
    if node.readers.iter().any(|&edge| graph.is_edge_valid(edge)) {
        return true;
    }
    if let Some(parent_edge) = node.parent_edge {
        if graph.is_edge_valid(parent_edge) {
            return true;
        }
    }
    node.children
        .iter()
        .any(|&child| descendants_have_readers(nodes, graph, child))
}

fn descendants_have_readers(nodes: &[ResourceNode], graph: &DependencyGraph, index: usize) -> bool {
    let node = &nodes[index];
    node.readers.iter().any(|&edge| graph.is_edge_valid(edge))
        || node
            .children
            .iter()
            .any(|&child| descendants_have_readers(nodes, graph, child))
}

/// Whether this version, or any ancestor version it aliases, was produced
/// by a pass. Drives the discard-start inference: previously written
/// contents must be loaded instead of discarded.
pub(crate) fn has_writer(nodes: &[ResourceNode], index: usize) -> bool {
    let mut current = Some(index);
    while let Some(i) = current {
        if nodes[i].writer.is_some() {
            return true;
        }
        current = nodes[i].parent_node;
    }
    false
}
