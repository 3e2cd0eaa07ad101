// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges, and its structural
//! validation.

use crate::connection::Edge;
use crate::node::{Node, NodeId};
use crate::port::{Port, PortDirection};
use crate::value::ValueType;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A snapshot of the compositing graph.
///
/// Nodes are kept in editor order. Duplicate ids are representable so that
/// [`Graph::validate`] can report them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    /// Nodes in the graph
    nodes: Vec<Node>,
    /// Edges between nodes
    edges: Vec<Edge>,
}

/// Input port `(node, port)` mapped to the output port feeding it
pub(crate) type InputSources<'a> = HashMap<(&'a NodeId, &'static str), (&'a NodeId, &'static str)>;

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph from nodes and edges
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Builder-style [`Graph::add_node`]
    pub fn with_node(mut self, node: Node) -> Self {
        self.add_node(node);
        self
    }

    /// Remove a node and its edges
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        self.edges.retain(|e| !e.involves_node(node_id));
        let index = self.nodes.iter().position(|n| n.id == *node_id)?;
        Some(self.nodes.remove(index))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == *node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == *node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add an edge. Nothing is checked until [`Graph::validate`].
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Builder-style [`Graph::add_edge`]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.add_edge(edge);
        self
    }

    /// Get all edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// First node for each id
    pub(crate) fn node_index(&self) -> HashMap<&NodeId, &Node> {
        let mut index = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            index.entry(&node.id).or_insert(node);
        }
        index
    }

    /// Resolve both ends of an edge to declared ports
    fn resolve_edge(
        index: &HashMap<&NodeId, &Node>,
        edge: &Edge,
    ) -> Option<(&'static Port, &'static Port)> {
        let source = index.get(&edge.source)?;
        let target = index.get(&edge.target)?;
        let out = source
            .kind
            .resolve_port(edge.source_handle.as_deref(), PortDirection::Output)?;
        let input = target
            .kind
            .resolve_port(edge.target_handle.as_deref(), PortDirection::Input)?;
        Some((out, input))
    }

    /// Map every connected input port to the output port feeding it.
    ///
    /// Edges that do not resolve are skipped; on a validated graph there are
    /// none.
    pub(crate) fn input_sources(&self) -> InputSources<'_> {
        let index = self.node_index();
        let mut sources = HashMap::new();
        for edge in &self.edges {
            if let Some((out, input)) = Self::resolve_edge(&index, edge) {
                sources.insert((&edge.target, input.name), (&edge.source, out.name));
            }
        }
        sources
    }

    /// Dependencies of each node: target node -> source nodes it reads from.
    ///
    /// Dangling edges are left out.
    pub fn dependencies(&self) -> Dependencies<'_> {
        let index = self.node_index();
        let mut deps: Dependencies<'_> =
            index.keys().map(|id| (*id, BTreeSet::new())).collect();
        for edge in &self.edges {
            if index.contains_key(&edge.source) && index.contains_key(&edge.target) {
                deps.entry(&edge.target).or_default().insert(&edge.source);
            }
        }
        deps
    }

    /// Check the structural invariants of the graph.
    ///
    /// Every violation is collected, in this order: duplicate ids, dangling
    /// edges, unknown ports, type mismatches, inputs with several edges and
    /// finally cycles.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let index = self.node_index();

        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                duplicates.insert(&node.id);
            }
        }
        issues.extend(
            duplicates
                .into_iter()
                .map(|id| ValidationIssue::DuplicateNodeId { id: id.clone() }),
        );

        for (i, edge) in self.edges.iter().enumerate() {
            for id in [&edge.source, &edge.target] {
                if !index.contains_key(id) {
                    issues.push(ValidationIssue::DanglingEdge {
                        edge: i,
                        missing: id.clone(),
                    });
                }
            }
        }

        let mut port_issues = Vec::new();
        let mut type_issues = Vec::new();
        let mut inputs: BTreeMap<(&NodeId, &'static str), Vec<usize>> = BTreeMap::new();
        for (i, edge) in self.edges.iter().enumerate() {
            let (Some(source), Some(target)) = (index.get(&edge.source), index.get(&edge.target))
            else {
                continue;
            };

            let out = if source.kind.is_known() {
                let port = source
                    .kind
                    .resolve_port(edge.source_handle.as_deref(), PortDirection::Output);
                if port.is_none() {
                    port_issues.push(ValidationIssue::UnknownPort {
                        edge: i,
                        node: source.id.clone(),
                        port: edge.source_handle.clone(),
                        direction: PortDirection::Output,
                    });
                }
                port
            } else {
                None
            };

            let input = if target.kind.is_known() {
                let port = target
                    .kind
                    .resolve_port(edge.target_handle.as_deref(), PortDirection::Input);
                if port.is_none() {
                    port_issues.push(ValidationIssue::UnknownPort {
                        edge: i,
                        node: target.id.clone(),
                        port: edge.target_handle.clone(),
                        direction: PortDirection::Input,
                    });
                }
                port
            } else {
                None
            };

            if let Some(input) = input {
                inputs.entry((&target.id, input.name)).or_default().push(i);
                if let Some(out) = out {
                    if !out.can_connect(input) {
                        type_issues.push(ValidationIssue::PortTypeMismatch {
                            edge: i,
                            output: out.value_type,
                            input: input.value_type,
                        });
                    }
                }
            }
        }
        issues.extend(port_issues);
        issues.extend(type_issues);

        for ((node, port), edges) in inputs {
            if edges.len() > 1 {
                issues.push(ValidationIssue::MultipleEdgesOnInput {
                    node: node.clone(),
                    port: port.to_string(),
                    edges,
                });
            }
        }

        issues.extend(
            find_cycles(&self.dependencies())
                .into_iter()
                .map(|nodes| ValidationIssue::Cycle { nodes }),
        );

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Each node mapped to the nodes it reads from
pub type Dependencies<'a> = BTreeMap<&'a NodeId, BTreeSet<&'a NodeId>>;

/// Remaining sources of a node still to be explored
type SourceIter<'d, 'a> = std::iter::Flatten<std::option::IntoIter<&'d BTreeSet<&'a NodeId>>>;

fn sources_of<'d, 'a>(deps: &'d Dependencies<'a>, node_id: &NodeId) -> SourceIter<'d, 'a> {
    deps.get(node_id).into_iter().flatten()
}

/// Three-colour depth-first search; every back edge yields one cycle.
///
/// Runs on an explicit frame stack so chain length is bounded by the heap,
/// not the thread stack.
fn find_cycles<'a>(deps: &Dependencies<'a>) -> Vec<Vec<NodeId>> {
    let mut marks: HashMap<&'a NodeId, Mark> = HashMap::new();
    let mut cycles = Vec::new();

    for root in deps.keys() {
        if marks.contains_key(root) {
            continue;
        }
        marks.insert(*root, Mark::InProgress);
        let mut frames = vec![(*root, sources_of(deps, root))];

        loop {
            let Some((node_id, sources)) = frames.last_mut() else {
                break;
            };
            let node_id = *node_id;
            let Some(&source) = sources.next() else {
                marks.insert(node_id, Mark::Done);
                frames.pop();
                continue;
            };

            match marks.get(source) {
                None => {
                    marks.insert(source, Mark::InProgress);
                    frames.push((source, sources_of(deps, source)));
                }
                Some(Mark::InProgress) => {
                    let start = frames.iter().position(|(id, _)| *id == source).unwrap_or(0);
                    cycles.push(frames[start..].iter().map(|(id, _)| (*id).clone()).collect());
                }
                Some(Mark::Done) => {}
            }
        }
    }
    cycles
}

/// A single structural problem found by [`Graph::validate`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationIssue {
    /// Two nodes share an id
    #[error("duplicate node id {id}")]
    DuplicateNodeId {
        /// The repeated id
        id: NodeId,
    },

    /// Edge references a node that does not exist
    #[error("edge #{edge} references missing node {missing}")]
    DanglingEdge {
        /// Edge index
        edge: usize,
        /// The id that was not found
        missing: NodeId,
    },

    /// Edge names a port the node kind does not declare
    #[error("edge #{edge} names unknown {direction:?} port {port:?} on node {node}")]
    UnknownPort {
        /// Edge index
        edge: usize,
        /// Node the port was looked up on
        node: NodeId,
        /// The handle as given
        port: Option<String>,
        /// Direction the port was expected to have
        direction: PortDirection,
    },

    /// Source and target ports carry different value types
    #[error("edge #{edge} connects {output} output to {input} input")]
    PortTypeMismatch {
        /// Edge index
        edge: usize,
        /// Output value type
        output: ValueType,
        /// Input value type
        input: ValueType,
    },

    /// More than one edge feeds an input port
    #[error("input {port} of node {node} has {} incoming edges", .edges.len())]
    MultipleEdgesOnInput {
        /// Target node
        node: NodeId,
        /// Input port name
        port: String,
        /// Indices of the offending edges
        edges: Vec<usize>,
    },

    /// Nodes that depend on each other in a loop
    #[error("cycle through nodes {nodes:?}")]
    Cycle {
        /// Nodes on the cycle, in dependency order
        nodes: Vec<NodeId>,
    },
}

/// Graph failed validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("graph failed validation with {} issue(s)", .issues.len())]
pub struct ValidationError {
    /// Every issue found
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Whether any issue is a cycle
    pub fn has_cycle(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::Cycle { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ParamValue;

    fn color_to_output() -> Graph {
        Graph::new()
            .with_node(Node::color_source("color", 10, 20, 30, 1.0))
            .with_node(Node::output("out"))
            .with_edge(Edge::new("color", "color", "out", "in"))
    }

    #[test]
    fn test_valid_graph() {
        assert!(color_to_output().validate().is_ok());
    }

    #[test]
    fn test_missing_handles_resolve_to_single_ports() {
        let graph = Graph::new()
            .with_node(Node::color_source("color", 0, 0, 0, 1.0))
            .with_node(Node::output("out"))
            .with_edge(Edge::between("color", "out"));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_two_node_cycle() {
        let graph = Graph::new()
            .with_node(Node::mix("A", 0.5))
            .with_node(Node::mix("B", 0.5))
            .with_edge(Edge::new("A", "out", "B", "a"))
            .with_edge(Edge::new("B", "out", "A", "a"));
        let err = graph.validate().unwrap_err();
        assert_eq!(
            err.issues,
            vec![ValidationIssue::Cycle {
                nodes: vec![NodeId::from("A"), NodeId::from("B")],
            }]
        );
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let graph = Graph::new()
            .with_node(Node::mix("m", 0.5))
            .with_edge(Edge::new("m", "out", "m", "b"));
        let err = graph.validate().unwrap_err();
        assert!(err.has_cycle());
        assert!(err
            .issues
            .contains(&ValidationIssue::Cycle { nodes: vec![NodeId::from("m")] }));
    }

    #[test]
    fn test_dangling_reported_before_cycle() {
        let graph = Graph::new()
            .with_node(Node::mix("A", 0.5))
            .with_node(Node::mix("B", 0.5))
            .with_edge(Edge::new("A", "out", "B", "a"))
            .with_edge(Edge::new("B", "out", "A", "a"))
            .with_edge(Edge::new("ghost", "out", "A", "b"));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(
            err.issues[0],
            ValidationIssue::DanglingEdge {
                edge: 2,
                missing: NodeId::from("ghost"),
            }
        );
        assert!(matches!(err.issues[1], ValidationIssue::Cycle { .. }));
    }

    #[test]
    fn test_multiple_edges_on_input() {
        let graph = color_to_output()
            .with_node(Node::color_source("other", 1, 1, 1, 1.0))
            .with_edge(Edge::new("other", "color", "out", "in"));
        let err = graph.validate().unwrap_err();
        assert_eq!(
            err.issues,
            vec![ValidationIssue::MultipleEdgesOnInput {
                node: NodeId::from("out"),
                port: "in".to_string(),
                edges: vec![0, 1],
            }]
        );
    }

    #[test]
    fn test_reports_every_issue() {
        let graph = Graph::new()
            .with_node(Node::mix("m", 0.5))
            .with_node(Node::mix("m", 0.2))
            .with_node(Node::output("out"))
            .with_edge(Edge::new("m", "a", "out", "in"))
            .with_edge(Edge::new("nowhere", "out", "out", "in"))
            .with_edge(Edge::between("out", "m"));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.issues.len(), 6);
        assert_eq!(err.issues[0], ValidationIssue::DuplicateNodeId { id: NodeId::from("m") });
        assert!(matches!(err.issues[1], ValidationIssue::DanglingEdge { edge: 1, .. }));
        assert!(matches!(
            err.issues[2],
            ValidationIssue::UnknownPort { edge: 0, direction: PortDirection::Output, .. }
        ));
        // `out` has no outputs and `m` has two inputs, so a bare edge misses both
        assert!(matches!(
            err.issues[3],
            ValidationIssue::UnknownPort { edge: 2, direction: PortDirection::Output, .. }
        ));
        assert!(matches!(
            err.issues[4],
            ValidationIssue::UnknownPort { edge: 2, direction: PortDirection::Input, .. }
        ));
        // Edges with unresolved ports still count as dependencies
        assert_eq!(
            err.issues[5],
            ValidationIssue::Cycle {
                nodes: vec![NodeId::from("m"), NodeId::from("out")],
            }
        );
    }

    #[test]
    fn test_unknown_kind_skips_port_checks() {
        let graph = Graph::new()
            .with_node(Node::new("blur", crate::node::NodeKind::from_tag("blur")))
            .with_node(Node::output("out"))
            .with_edge(Edge::new("blur", "image", "out", "in"));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_deep_chain_validates() {
        const DEPTH: usize = 50_000;
        let mut graph = Graph::new().with_node(Node::color_source("n00000", 1, 2, 3, 1.0));
        for i in 1..DEPTH {
            let id = format!("n{i:05}");
            let prev = format!("n{:05}", i - 1);
            let handle = if i == 1 { "color" } else { "out" };
            graph.add_node(Node::mix(id.as_str(), 0.5));
            graph.add_edge(Edge::new(prev.as_str(), handle, id.as_str(), "a"));
        }
        let last = format!("n{:05}", DEPTH - 1);
        graph.add_node(Node::output("z_out"));
        graph.add_edge(Edge::new(last.as_str(), "out", "z_out", "in"));
        assert!(graph.validate().is_ok());

        // Close the chain into one long loop
        graph.add_edge(Edge::new(last.as_str(), "out", "n00001", "b"));
        let err = graph.validate().unwrap_err();
        assert_eq!(err.issues.len(), 1);
        match &err.issues[0] {
            ValidationIssue::Cycle { nodes } => assert_eq!(nodes.len(), DEPTH - 1),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_node_mut_edits_params() {
        let mut graph = color_to_output();
        let node = graph.node_mut(&NodeId::from("color")).unwrap();
        node.params.insert("r".to_string(), ParamValue::Number(99.0));
        assert_eq!(
            graph.node(&NodeId::from("color")).and_then(|n| n.param("r")),
            Some(&ParamValue::Number(99.0))
        );
        assert!(graph.node_mut(&NodeId::from("missing")).is_none());
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let mut graph = color_to_output();
        let removed = graph.remove_node(&NodeId::from("color"));
        assert!(removed.is_some());
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_dependencies() {
        let graph = color_to_output();
        let deps = graph.dependencies();
        let out = NodeId::from("out");
        let color = NodeId::from("color");
        assert!(deps[&out].contains(&color));
        assert!(deps[&color].is_empty());
    }
}
