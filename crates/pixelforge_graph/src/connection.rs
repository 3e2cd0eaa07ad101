// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.

use crate::node::NodeId;

/// A directed edge from an output port to an input port.
///
/// Port handles are optional because the editor leaves them out for nodes
/// with a single port in that direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Editor-assigned edge ID, if any
    pub id: Option<String>,
    /// Source node ID
    pub source: NodeId,
    /// Source output port name
    pub source_handle: Option<String>,
    /// Target node ID
    pub target: NodeId,
    /// Target input port name
    pub target_handle: Option<String>,
}

impl Edge {
    /// Create a new edge between named ports
    pub fn new(
        source: impl Into<NodeId>,
        source_handle: &str,
        target: impl Into<NodeId>,
        target_handle: &str,
    ) -> Self {
        Self {
            id: None,
            source: source.into(),
            source_handle: Some(source_handle.to_string()),
            target: target.into(),
            target_handle: Some(target_handle.to_string()),
        }
    }

    /// Create an edge without port handles
    pub fn between(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: None,
            source: source.into(),
            source_handle: None,
            target: target.into(),
            target_handle: None,
        }
    }

    /// Set the edge ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.source == *node_id || self.target == *node_id
    }
}
