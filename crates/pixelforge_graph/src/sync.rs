// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire format shared by the editor and the evaluator.
//!
//! A graph travels as JSON:
//!
//! ```json
//! {
//!   "nodes": [{ "id": "1", "kind": "ColorSource", "position": { "x": 0, "y": 0 },
//!               "params": { "r": 255, "g": 0, "b": 0, "a": 1 } }],
//!   "edges": [{ "source": "1", "sourceHandle": "color", "target": "2", "targetHandle": "in" }]
//! }
//! ```
//!
//! Payloads straight from the node editor are accepted as well: `type` for
//! `kind` (with `colorNode`-style tags), `data` for `params` with a nested
//! `color` object. Positions are editor metadata and are dropped. Rendered
//! frames go back as raw RGBA bytes without any framing.

use crate::connection::Edge;
use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeKind, ParamValue, Params};
use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::ser;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Params key whose object value is flattened into channel params
const NESTED_COLOR_KEY: &str = "color";

#[derive(Debug, Serialize, Deserialize)]
struct WireGraph {
    #[serde(default)]
    nodes: Vec<WireNode>,
    #[serde(default)]
    edges: Vec<WireEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireNode {
    id: String,
    #[serde(alias = "type")]
    kind: String,
    #[serde(default, skip_serializing)]
    position: Option<IgnoredAny>,
    #[serde(default, alias = "data")]
    params: IndexMap<String, JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    source: String,
    #[serde(default)]
    source_handle: Option<String>,
    target: String,
    #[serde(default)]
    target_handle: Option<String>,
}

/// Encode a graph snapshot as JSON.
///
/// JSON has no NaN or infinity, so a non-finite numeric param is an error
/// rather than a silently dropped value.
pub fn serialize(graph: &Graph) -> Result<String, serde_json::Error> {
    let nodes: Vec<WireNode> = graph
        .nodes()
        .map(|node| -> Result<WireNode, serde_json::Error> {
            let params = node
                .params
                .iter()
                .map(|(name, value)| -> Result<(String, JsonValue), serde_json::Error> {
                    Ok((name.clone(), param_to_json(&node.id, name, value)?))
                })
                .collect::<Result<IndexMap<String, JsonValue>, serde_json::Error>>()?;
            Ok(WireNode {
                id: node.id.to_string(),
                kind: node.kind.tag().to_string(),
                position: None,
                params,
            })
        })
        .collect::<Result<_, _>>()?;
    let wire = WireGraph {
        nodes,
        edges: graph
            .edges()
            .map(|edge| WireEdge {
                id: edge.id.clone(),
                source: edge.source.to_string(),
                source_handle: edge.source_handle.clone(),
                target: edge.target.to_string(),
                target_handle: edge.target_handle.clone(),
            })
            .collect(),
    };
    serde_json::to_string(&wire)
}

/// Decode a graph snapshot from JSON.
///
/// Only the payload shape is checked here; structural problems are left to
/// [`Graph::validate`].
pub fn deserialize(text: &str) -> Result<Graph, ParseError> {
    let wire: WireGraph = serde_json::from_str(text)?;
    let nodes = wire
        .nodes
        .into_iter()
        .map(|node| Node {
            params: params_from_json(&node.id, node.params),
            id: NodeId::from(node.id),
            kind: NodeKind::from_tag(&node.kind),
        })
        .collect();
    let edges = wire
        .edges
        .into_iter()
        .map(|edge| Edge {
            id: edge.id,
            source: NodeId::from(edge.source),
            source_handle: edge.source_handle,
            target: NodeId::from(edge.target),
            target_handle: edge.target_handle,
        })
        .collect();
    Ok(Graph::from_parts(nodes, edges))
}

fn param_to_json(node: &NodeId, name: &str, value: &ParamValue) -> Result<JsonValue, serde_json::Error> {
    Ok(match value {
        ParamValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .ok_or_else(|| {
                <serde_json::Error as ser::Error>::custom(format!("node {node}: param {name} is not finite ({n})"))
            })?,
        ParamValue::Bool(b) => JsonValue::Bool(*b),
        ParamValue::Text(text) => JsonValue::String(text.clone()),
    })
}

fn params_from_json(node_id: &str, raw: IndexMap<String, JsonValue>) -> Params {
    let mut params = Params::new();
    for (name, value) in raw {
        match value {
            JsonValue::Object(nested) if name == NESTED_COLOR_KEY => {
                for (channel, value) in nested {
                    if let Some(param) = primitive_param(value) {
                        params.insert(channel, param);
                    }
                }
            }
            other => match primitive_param(other) {
                Some(param) => {
                    params.insert(name, param);
                }
                None => tracing::debug!(node = node_id, param = %name, "dropping non-primitive param"),
            },
        }
    }
    params
}

fn primitive_param(value: JsonValue) -> Option<ParamValue> {
    match value {
        JsonValue::Number(n) => n.as_f64().map(ParamValue::Number),
        JsonValue::Bool(b) => Some(ParamValue::Bool(b)),
        JsonValue::String(s) => Some(ParamValue::Text(s)),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Malformed wire payload
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Not valid JSON, or not shaped like a graph
    #[error("malformed graph payload: {0}")]
    Json(#[from] serde_json::Error),
}
