// SPDX-License-Identifier: MIT OR Apache-2.0
//! Initialization and evaluation entry points.
//!
//! An [`Engine`] owns the rendering backend and turns serialized graphs into
//! raw frames. Each call works on its own graph snapshot; the backend is the
//! only shared state and is read-only once created.

use crate::backend::RenderBackend;
use crate::config::EngineConfig;
use crate::evaluation::{EvaluationError, Evaluator};
use crate::graph::{Graph, ValidationError};
use crate::raster::{Raster, RasterError};
use crate::sync::{self, ParseError};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

/// Graph evaluator plus the rendering backend it draws with
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    evaluator: Evaluator,
    backend: RwLock<Option<Arc<dyn RenderBackend>>>,
}

impl Engine {
    /// Create an engine; the backend is not available until
    /// [`Engine::initialize`] succeeds.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            evaluator: Evaluator::new(config.kernel_settings()),
            config,
            backend: RwLock::new(None),
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Prepare the rendering backend.
    ///
    /// Calling this again keeps the existing backend.
    pub fn initialize(&self) -> Result<String, EngineError> {
        let mut backend = self.backend.write();
        if let Some(existing) = backend.as_ref() {
            tracing::debug!(backend = existing.name(), "backend already initialized");
            return Ok(describe(existing.as_ref()));
        }

        let created = self.config.backend.create();
        let info = describe(created.as_ref());
        tracing::info!("{info}");
        *backend = Some(created);
        Ok(info)
    }

    /// Whether [`Engine::initialize`] has succeeded
    pub fn is_initialized(&self) -> bool {
        self.backend.read().is_some()
    }

    fn backend(&self) -> Result<Arc<dyn RenderBackend>, EngineError> {
        self.backend
            .read()
            .as_ref()
            .cloned()
            .ok_or(EngineError::BackendUnavailable)
    }

    /// Evaluate a graph snapshot into a frame of the configured size
    pub fn render(&self, graph: &Graph) -> Result<Raster, EngineError> {
        let backend = self.backend()?;
        let color = self.evaluator.evaluate(graph)?;
        let raster = backend.render(color, self.config.width, self.config.height)?;
        Ok(raster)
    }

    /// Evaluate a serialized graph into raw RGBA bytes.
    ///
    /// The result is exactly `width * height * 4` bytes; on any error no
    /// pixel data is returned.
    pub fn evaluate_json(&self, graph_json: &str) -> Result<Vec<u8>, EngineError> {
        let graph = sync::deserialize(graph_json)?;
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "received graph"
        );
        let raster = self.render(&graph)?;
        Ok(raster.into_bytes())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn describe(backend: &dyn RenderBackend) -> String {
    format!("Initialized {} render backend", backend.name())
}

static GLOBAL: OnceLock<Engine> = OnceLock::new();

/// The process-wide engine, created with the default configuration
pub fn global() -> &'static Engine {
    GLOBAL.get_or_init(Engine::default)
}

/// Initialize the process-wide engine
pub fn initialize() -> Result<String, EngineError> {
    global().initialize()
}

/// Evaluate a serialized graph on the process-wide engine
pub fn evaluate_graph(graph_json: &str) -> Result<Vec<u8>, EngineError> {
    global().evaluate_json(graph_json)
}

/// Any failure of an evaluation request
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed wire payload
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Graph failed structural validation
    #[error(transparent)]
    Validation(ValidationError),

    /// Graph could not be evaluated
    #[error(transparent)]
    Evaluation(EvaluationError),

    /// Rendering resource was not initialized
    #[error("render backend not initialized")]
    BackendUnavailable,

    /// Backend failed to produce the frame
    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl From<EvaluationError> for EngineError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::Validation(err) => Self::Validation(err),
            other => Self::Evaluation(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Edge;
    use crate::node::Node;

    fn ready_engine() -> Engine {
        let engine = Engine::default();
        engine.initialize().unwrap();
        engine
    }

    fn color_graph_json(r: u8, g: u8, b: u8, a: f32) -> String {
        let graph = Graph::new()
            .with_node(Node::color_source("1", r, g, b, a))
            .with_node(Node::output("2"))
            .with_edge(Edge::new("1", "color", "2", "in"));
        sync::serialize(&graph).unwrap()
    }

    #[test]
    fn test_uninitialized_backend() {
        let engine = Engine::default();
        assert!(!engine.is_initialized());
        assert!(matches!(
            engine.evaluate_json(&color_graph_json(1, 2, 3, 1.0)),
            Err(EngineError::BackendUnavailable)
        ));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let engine = Engine::default();
        let first = engine.initialize().unwrap();
        let second = engine.initialize().unwrap();
        assert_eq!(first, second);
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_uniform_frame() {
        let engine = ready_engine();
        let bytes = engine.evaluate_json(&color_graph_json(200, 10, 10, 1.0)).unwrap();
        assert_eq!(bytes.len(), 256 * 256 * 4);
        assert!(bytes.chunks_exact(4).all(|px| px == [200, 10, 10, 255]));
    }

    #[test]
    fn test_frames_are_deterministic() {
        let engine = ready_engine();
        let json = color_graph_json(17, 99, 230, 0.4);
        assert_eq!(engine.evaluate_json(&json).unwrap(), engine.evaluate_json(&json).unwrap());
    }

    #[test]
    fn test_error_taxonomy() {
        let engine = ready_engine();
        assert!(matches!(engine.evaluate_json("{"), Err(EngineError::Parse(_))));

        let cyclic = r#"{"nodes": [
            {"id": "A", "kind": "Mix"}, {"id": "B", "kind": "Mix"}, {"id": "O", "kind": "Output"}
        ], "edges": [
            {"source": "A", "sourceHandle": "out", "target": "B", "targetHandle": "a"},
            {"source": "B", "sourceHandle": "out", "target": "A", "targetHandle": "a"}
        ]}"#;
        match engine.evaluate_json(cyclic) {
            Err(EngineError::Validation(err)) => assert!(err.has_cycle()),
            other => panic!("expected validation error, got {other:?}"),
        }

        let no_output = r#"{"nodes": [{"id": "c", "kind": "ColorSource"}], "edges": []}"#;
        assert!(matches!(
            engine.evaluate_json(no_output),
            Err(EngineError::Evaluation(EvaluationError::NoOutput))
        ));

        let unknown = r#"{"nodes": [{"id": "o", "kind": "Output"}, {"id": "n", "kind": "Noise"}], "edges": []}"#;
        assert!(matches!(
            engine.evaluate_json(unknown),
            Err(EngineError::Evaluation(EvaluationError::UnknownNodeKind { .. }))
        ));
    }

    #[test]
    fn test_configured_size() {
        let engine = Engine::new(EngineConfig {
            width: 3,
            height: 5,
            ..EngineConfig::default()
        });
        engine.initialize().unwrap();
        let bytes = engine.evaluate_json(&color_graph_json(1, 1, 1, 1.0)).unwrap();
        assert_eq!(bytes.len(), engine.config().frame_len());
        assert_eq!(bytes.len(), 3 * 5 * 4);
    }

    #[test]
    fn test_global_engine() {
        initialize().unwrap();
        let bytes = evaluate_graph(&color_graph_json(5, 6, 7, 1.0)).unwrap();
        assert_eq!(&bytes[..4], &[5, 6, 7, 255]);
    }
}
