// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the compositing graph.

use crate::port::{color_input, Port, PortDirection};
use crate::value::ValueType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node.
///
/// Ids are opaque strings chosen by the editor; ordering is lexicographic
/// and is what the evaluator uses to break ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node ID from an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random node ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

const COLOR_SOURCE_INPUTS: &[Port] = &[];
const COLOR_SOURCE_OUTPUTS: &[Port] = &[Port::output("color", ValueType::Rgba)];
const MIX_INPUTS: &[Port] = &[color_input("a"), color_input("b")];
const MIX_OUTPUTS: &[Port] = &[Port::output("out", ValueType::Rgba)];
const OUTPUT_INPUTS: &[Port] = &[color_input("in")];
const OUTPUT_OUTPUTS: &[Port] = &[];

/// The closed set of node kinds.
///
/// Tags the core does not recognise are kept as [`NodeKind::Unknown`] so the
/// evaluator can report them instead of the parser rejecting the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    /// Emits a constant color
    ColorSource,
    /// Blends two colors by a factor
    Mix,
    /// Graph sink handed to the rasterizer
    Output,
    /// Unrecognised kind tag
    Unknown(String),
}

impl NodeKind {
    /// Canonical wire tag
    pub fn tag(&self) -> &str {
        match self {
            Self::ColorSource => "ColorSource",
            Self::Mix => "Mix",
            Self::Output => "Output",
            Self::Unknown(tag) => tag.as_str(),
        }
    }

    /// Parse a wire tag; the editor's `colorNode`-style tags are accepted too
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ColorSource" | "colorNode" => Self::ColorSource,
            "Mix" | "mixNode" => Self::Mix,
            "Output" | "outputNode" => Self::Output,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether this kind is one the core can evaluate
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Declared input ports
    pub fn inputs(&self) -> &'static [Port] {
        match self {
            Self::ColorSource => COLOR_SOURCE_INPUTS,
            Self::Mix => MIX_INPUTS,
            Self::Output => OUTPUT_INPUTS,
            Self::Unknown(_) => &[],
        }
    }

    /// Declared output ports
    pub fn outputs(&self) -> &'static [Port] {
        match self {
            Self::ColorSource => COLOR_SOURCE_OUTPUTS,
            Self::Mix => MIX_OUTPUTS,
            Self::Output => OUTPUT_OUTPUTS,
            Self::Unknown(_) => &[],
        }
    }

    /// Resolve an edge handle to a declared port.
    ///
    /// A missing handle names the kind's only port in that direction.
    pub fn resolve_port(&self, handle: Option<&str>, direction: PortDirection) -> Option<&'static Port> {
        let ports = match direction {
            PortDirection::Input => self.inputs(),
            PortDirection::Output => self.outputs(),
        };
        match handle {
            Some(name) => ports.iter().find(|p| p.name == name),
            None if ports.len() == 1 => ports.first(),
            None => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.tag().to_string()
    }
}

/// Primitive parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Number
    Number(f64),
    /// Boolean
    Bool(bool),
    /// Text (e.g. an editor label)
    Text(String),
}

impl ParamValue {
    /// Get the number, if this is one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Ordered parameter map of a node
pub type Params = IndexMap<String, ParamValue>;

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node kind
    pub kind: NodeKind,
    /// Kind-specific parameters
    pub params: Params,
}

impl Node {
    /// Create a node without parameters
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            params: Params::new(),
        }
    }

    /// Create a `ColorSource` node
    pub fn color_source(id: impl Into<NodeId>, r: u8, g: u8, b: u8, a: f32) -> Self {
        Self::new(id, NodeKind::ColorSource)
            .with_param("r", f64::from(r))
            .with_param("g", f64::from(g))
            .with_param("b", f64::from(b))
            .with_param("a", f64::from(a))
    }

    /// Create a `Mix` node
    pub fn mix(id: impl Into<NodeId>, factor: f32) -> Self {
        Self::new(id, NodeKind::Mix).with_param("factor", f64::from(factor))
    }

    /// Create an `Output` node
    pub fn output(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Output)
    }

    /// Set a parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Get a parameter by name
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(NodeKind::from_tag("colorNode"), NodeKind::ColorSource);
        assert_eq!(NodeKind::from_tag("Mix"), NodeKind::Mix);
        assert_eq!(NodeKind::from_tag("outputNode"), NodeKind::Output);
        assert_eq!(NodeKind::from_tag("blur"), NodeKind::Unknown("blur".to_string()));
        assert_eq!(NodeKind::Mix.tag(), "Mix");
        assert!(!NodeKind::from_tag("blur").is_known());
    }

    #[test]
    fn test_resolve_port() {
        let mix = NodeKind::Mix;
        assert_eq!(mix.resolve_port(Some("b"), PortDirection::Input).map(|p| p.name), Some("b"));
        // Two inputs: a missing handle is ambiguous
        assert!(mix.resolve_port(None, PortDirection::Input).is_none());
        assert_eq!(mix.resolve_port(None, PortDirection::Output).map(|p| p.name), Some("out"));
        assert!(NodeKind::Output.resolve_port(None, PortDirection::Output).is_none());
        assert!(NodeKind::ColorSource.resolve_port(Some("a"), PortDirection::Input).is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(NodeId::generate(), NodeId::generate());
    }

    #[test]
    fn test_color_source_params() {
        let node = Node::color_source("c", 1, 2, 3, 0.5);
        assert_eq!(node.param("g").and_then(ParamValue::as_number), Some(2.0));
        assert_eq!(node.param("a").and_then(ParamValue::as_number), Some(0.5));
    }
}
