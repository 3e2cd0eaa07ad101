// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.

use crate::graph::{Graph, InputSources, ValidationError, ValidationIssue};
use crate::kernel::{self, KernelError, KernelSettings, NodeInputs, NodeOutput};
use crate::node::{Node, NodeId, NodeKind};
use crate::value::{Rgba, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Context for a single graph evaluation.
///
/// Created fresh for every call and dropped afterwards, so nothing leaks
/// from one evaluation into the next.
pub struct EvaluationContext<'a> {
    /// The graph being evaluated
    pub graph: &'a Graph,
    /// Output values keyed by `(node, port)`
    outputs: HashMap<(&'a NodeId, &'static str), Value>,
    /// Connected inputs and the output feeding each
    sources: InputSources<'a>,
    /// Evaluation order
    order: Vec<&'a NodeId>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context for a validated graph
    pub fn new(graph: &'a Graph) -> Result<Self, EvaluationError> {
        let order = topological_order(graph)?;
        Ok(Self {
            graph,
            outputs: HashMap::new(),
            sources: graph.input_sources(),
            order,
        })
    }

    /// Get the value arriving at an input port, if it is connected
    pub fn get_input(&self, node_id: &NodeId, port: &'static str) -> Option<&Value> {
        let (source, source_port) = self.sources.get(&(node_id, port))?;
        self.outputs.get(&(*source, *source_port))
    }

    /// Gather every declared input of a node, falling back to port defaults
    pub fn gather_inputs(&self, node: &Node) -> NodeInputs {
        let mut inputs = NodeInputs::new();
        for port in node.kind.inputs() {
            let value = self
                .get_input(&node.id, port.name)
                .copied()
                .or(port.default_value);
            if let Some(value) = value {
                inputs.set(port.name, value);
            }
        }
        inputs
    }

    /// Store a node's outputs
    pub fn set_output(&mut self, node_id: &'a NodeId, output: NodeOutput) {
        for (port, value) in output.values {
            self.outputs.insert((node_id, port), value);
        }
    }

    /// Get the evaluation order
    pub fn order(&self) -> &[&'a NodeId] {
        &self.order
    }
}

/// Order nodes so every node comes after the nodes it reads from.
///
/// Kahn's algorithm; among ready nodes the smallest id goes first.
pub fn topological_order(graph: &Graph) -> Result<Vec<&NodeId>, EvaluationError> {
    let deps = graph.dependencies();
    let mut pending: BTreeMap<&NodeId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&NodeId, Vec<&NodeId>> = BTreeMap::new();
    for (target, sources) in &deps {
        pending.insert(*target, sources.len());
        for source in sources {
            dependents.entry(*source).or_default().push(*target);
        }
    }

    let mut ready: BTreeSet<&NodeId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while let Some(node_id) = ready.pop_first() {
        order.push(node_id);
        for dependent in dependents.get(node_id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != pending.len() {
        let stuck = pending
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(id, _)| id.clone())
            .collect();
        return Err(EvaluationError::Validation(ValidationError {
            issues: vec![ValidationIssue::Cycle { nodes: stuck }],
        }));
    }
    Ok(order)
}

/// Evaluates graph snapshots into a final color
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    settings: KernelSettings,
}

impl Evaluator {
    /// Create an evaluator with the given kernel settings
    pub fn new(settings: KernelSettings) -> Self {
        Self { settings }
    }

    /// Kernel settings in use
    pub fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    /// Evaluate a graph down to the value reaching its `Output` node.
    ///
    /// Validation and the output checks happen before any kernel runs, and
    /// a failure anywhere discards everything computed so far.
    pub fn evaluate(&self, graph: &Graph) -> Result<Rgba, EvaluationError> {
        let _span = tracing::debug_span!(
            "evaluate",
            nodes = graph.node_count(),
            edges = graph.edge_count()
        )
        .entered();

        graph.validate()?;

        if let Some(node) = graph.nodes().find(|n| !n.kind.is_known()) {
            return Err(EvaluationError::UnknownNodeKind {
                node: node.id.clone(),
                kind: node.kind.tag().to_string(),
            });
        }

        let output_node = find_output(graph)?;
        let mut ctx = EvaluationContext::new(graph)?;
        let mut result = None;

        let index = graph.node_index();
        let order = ctx.order().to_vec();
        for node_id in order {
            let Some(node) = index.get(node_id).copied() else {
                return Err(EvaluationError::NodeNotFound(node_id.clone()));
            };
            let inputs = ctx.gather_inputs(node);
            let output = kernel::run(&node.kind, &node.params, &inputs, &self.settings)
                .map_err(|err| EvaluationError::from_kernel(node_id, err))?;
            tracing::trace!(node = %node_id, kind = %node.kind, "kernel finished");

            if node.id == output_node.id {
                result = inputs.get("in").and_then(Value::as_rgba);
            }
            ctx.set_output(node_id, output);
        }

        let color = result.ok_or_else(|| EvaluationError::NodeNotFound(output_node.id.clone()))?;
        tracing::debug!(%color, output = %output_node.id, "graph evaluated");
        Ok(color)
    }
}

/// The single `Output` node of the graph
fn find_output(graph: &Graph) -> Result<&Node, EvaluationError> {
    let outputs: Vec<&Node> = graph
        .nodes()
        .filter(|n| n.kind == NodeKind::Output)
        .collect();
    match outputs.as_slice() {
        [] => Err(EvaluationError::NoOutput),
        [single] => Ok(*single),
        many => Err(EvaluationError::MultipleOutputs(
            many.iter().map(|n| n.id.clone()).collect(),
        )),
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// Graph failed structural validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Graph has no `Output` node
    #[error("graph has no output node")]
    NoOutput,

    /// Graph has more than one `Output` node
    #[error("graph has {n} output nodes: {0:?}", n = .0.len())]
    MultipleOutputs(Vec<NodeId>),

    /// Node kind has no kernel
    #[error("node {node} has unknown kind {kind:?}")]
    UnknownNodeKind {
        /// Offending node
        node: NodeId,
        /// Kind tag as received
        kind: String,
    },

    /// Node parameter has an unusable value
    #[error("node {node}: invalid param {param}: {reason}")]
    InvalidParam {
        /// Offending node
        node: NodeId,
        /// Param name
        param: String,
        /// What was wrong
        reason: String,
    },

    /// Node not found
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Kernel was not given an input it needs
    #[error("node {node}: missing input {port}")]
    MissingInput {
        /// Offending node
        node: NodeId,
        /// Input port name
        port: String,
    },
}

impl EvaluationError {
    fn from_kernel(node_id: &NodeId, err: KernelError) -> Self {
        let node = node_id.clone();
        match err {
            KernelError::UnknownNodeKind(kind) => Self::UnknownNodeKind { node, kind },
            KernelError::InvalidParam { param, reason } => Self::InvalidParam {
                node,
                param: param.to_string(),
                reason,
            },
            KernelError::MissingInput(port) => Self::MissingInput {
                node,
                port: port.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Edge;

    fn evaluate(graph: &Graph) -> Result<Rgba, EvaluationError> {
        Evaluator::default().evaluate(graph)
    }

    fn mix_graph(factor: f32, a: Option<Rgba>, b: Option<Rgba>) -> Graph {
        let mut graph = Graph::new()
            .with_node(Node::mix("mix", factor))
            .with_node(Node::output("out"))
            .with_edge(Edge::new("mix", "out", "out", "in"));
        for (id, port, color) in [("ca", "a", a), ("cb", "b", b)] {
            if let Some(c) = color {
                graph.add_node(Node::color_source(id, c.r, c.g, c.b, c.a));
                graph.add_edge(Edge::new(id, "color", "mix", port));
            }
        }
        graph
    }

    #[test]
    fn test_color_source_to_output() {
        let graph = Graph::new()
            .with_node(Node::color_source("1", 255, 0, 0, 1.0))
            .with_node(Node::output("2"))
            .with_edge(Edge::new("1", "color", "2", "in"));
        assert_eq!(evaluate(&graph).unwrap(), Rgba::new(255, 0, 0, 1.0));
    }

    #[test]
    fn test_mix_factors() {
        let a = Rgba::new(30, 60, 90, 1.0);
        let b = Rgba::new(200, 100, 0, 0.5);
        assert_eq!(evaluate(&mix_graph(0.0, Some(a), Some(b))).unwrap(), a);
        assert_eq!(evaluate(&mix_graph(1.0, Some(a), Some(b))).unwrap(), b);

        let black = Rgba::new(0, 0, 0, 1.0);
        let white = Rgba::new(255, 255, 255, 1.0);
        assert_eq!(
            evaluate(&mix_graph(0.5, Some(black), Some(white))).unwrap(),
            Rgba::new(128, 128, 128, 1.0)
        );
    }

    #[test]
    fn test_unconnected_mix_input_is_opaque_black() {
        let b = Rgba::new(200, 10, 10, 1.0);
        assert_eq!(evaluate(&mix_graph(1.0, None, Some(b))).unwrap(), b);
        assert_eq!(
            evaluate(&mix_graph(0.0, None, Some(b))).unwrap(),
            Rgba::OPAQUE_BLACK
        );
    }

    #[test]
    fn test_unconnected_output_is_opaque_black() {
        let graph = Graph::new().with_node(Node::output("out"));
        assert_eq!(evaluate(&graph).unwrap(), Rgba::OPAQUE_BLACK);
    }

    #[test]
    fn test_cycle_rejected() {
        let graph = Graph::new()
            .with_node(Node::mix("A", 0.5))
            .with_node(Node::mix("B", 0.5))
            .with_node(Node::output("out"))
            .with_edge(Edge::new("A", "out", "B", "a"))
            .with_edge(Edge::new("B", "out", "A", "a"))
            .with_edge(Edge::new("B", "out", "out", "in"));
        match evaluate(&graph) {
            Err(EvaluationError::Validation(err)) => assert!(err.has_cycle()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_output_count() {
        let none = Graph::new().with_node(Node::color_source("c", 1, 2, 3, 1.0));
        assert_eq!(evaluate(&none), Err(EvaluationError::NoOutput));

        let two = Graph::new()
            .with_node(Node::output("o1"))
            .with_node(Node::output("o2"));
        assert_eq!(
            evaluate(&two),
            Err(EvaluationError::MultipleOutputs(vec![
                NodeId::from("o1"),
                NodeId::from("o2"),
            ]))
        );

        assert_eq!(evaluate(&Graph::new()), Err(EvaluationError::NoOutput));
    }

    #[test]
    fn test_unknown_kind() {
        let graph = Graph::new()
            .with_node(Node::new("n", NodeKind::from_tag("noise")))
            .with_node(Node::output("out"))
            .with_edge(Edge::new("n", "image", "out", "in"));
        assert_eq!(
            evaluate(&graph),
            Err(EvaluationError::UnknownNodeKind {
                node: NodeId::from("n"),
                kind: "noise".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_param_aborts() {
        let graph = Graph::new()
            .with_node(Node::new("c", NodeKind::ColorSource).with_param("r", true_value()))
            .with_node(Node::output("out"))
            .with_edge(Edge::between("c", "out"));
        assert!(matches!(
            evaluate(&graph),
            Err(EvaluationError::InvalidParam { ref param, .. }) if param == "r"
        ));
    }

    fn true_value() -> crate::node::ParamValue {
        crate::node::ParamValue::Bool(true)
    }

    #[test]
    fn test_topological_order_breaks_ties_by_id() {
        let graph = Graph::new()
            .with_node(Node::output("z_out"))
            .with_node(Node::mix("m", 0.5))
            .with_node(Node::color_source("c2", 0, 0, 0, 1.0))
            .with_node(Node::color_source("c1", 0, 0, 0, 1.0))
            .with_edge(Edge::new("c2", "color", "m", "a"))
            .with_edge(Edge::new("c1", "color", "m", "b"))
            .with_edge(Edge::new("m", "out", "z_out", "in"));
        let order: Vec<&str> = topological_order(&graph)
            .unwrap()
            .into_iter()
            .map(NodeId::as_str)
            .collect();
        assert_eq!(order, vec!["c1", "c2", "m", "z_out"]);
    }

    #[test]
    fn test_chained_mixes() {
        // (black, white, 0.5) -> 128 grey, then towards red by 0.25
        let graph = mix_graph(
            0.5,
            Some(Rgba::new(0, 0, 0, 1.0)),
            Some(Rgba::new(255, 255, 255, 1.0)),
        );
        let mut graph = graph;
        graph.remove_node(&NodeId::from("out"));
        let graph = graph
            .with_node(Node::mix("tint", 0.25))
            .with_node(Node::color_source("red", 255, 0, 0, 0.0))
            .with_node(Node::output("out"))
            .with_edge(Edge::new("mix", "out", "tint", "a"))
            .with_edge(Edge::new("red", "color", "tint", "b"))
            .with_edge(Edge::new("tint", "out", "out", "in"));
        // 128*0.75 + 255*0.25 = 159.75, 128*0.75 = 96
        assert_eq!(evaluate(&graph).unwrap(), Rgba::new(160, 96, 96, 0.75));
    }

    #[test]
    fn test_long_chain_evaluates() {
        let mut graph = Graph::new().with_node(Node::color_source("c", 1, 2, 3, 1.0));
        let mut prev = ("c".to_string(), "color");
        for i in 0..20_000 {
            let id = format!("m{i:05}");
            graph.add_node(Node::mix(id.as_str(), 0.0));
            graph.add_edge(Edge::new(prev.0.as_str(), prev.1, id.as_str(), "a"));
            prev = (id, "out");
        }
        graph.add_node(Node::output("out"));
        graph.add_edge(Edge::new(prev.0.as_str(), prev.1, "out", "in"));
        assert_eq!(evaluate(&graph).unwrap(), Rgba::new(1, 2, 3, 1.0));
    }

    #[test]
    fn test_deterministic() {
        let graph = mix_graph(
            0.37,
            Some(Rgba::new(3, 141, 59, 0.26)),
            Some(Rgba::new(53, 58, 97, 0.93)),
        );
        let first = evaluate(&graph).unwrap();
        let second = evaluate(&graph).unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
        assert_eq!(first.a.to_bits(), second.a.to_bits());
    }
}
