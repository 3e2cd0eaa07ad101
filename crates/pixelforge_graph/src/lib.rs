// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compositing node graph for `PixelForge`.
//!
//! An editor describes a graph of color-producing nodes; this crate checks
//! it, evaluates it in dependency order and rasterizes the single result
//! into an RGBA8 frame.
//!
//! ## Architecture
//!
//! - [`graph`]: nodes, edges and structural validation
//! - [`kernel`]: per-kind node computations
//! - [`evaluation`]: topological scheduling of kernels
//! - [`raster`] and [`backend`]: turning the final value into pixels
//! - [`sync`]: the JSON wire format shared with the editor
//! - [`engine`]: initialization and evaluation entry points
//!
//! ```
//! let engine = pixelforge_graph::Engine::default();
//! engine.initialize().unwrap();
//! let json = r#"{
//!     "nodes": [
//!         {"id": "1", "kind": "ColorSource", "params": {"r": 255, "g": 0, "b": 0, "a": 1}},
//!         {"id": "2", "kind": "Output"}
//!     ],
//!     "edges": [{"source": "1", "sourceHandle": "color", "target": "2", "targetHandle": "in"}]
//! }"#;
//! let frame = engine.evaluate_json(json).unwrap();
//! assert_eq!(&frame[..4], &[255, 0, 0, 255]);
//! ```

pub mod value;
pub mod port;
pub mod node;
pub mod connection;
pub mod graph;
pub mod kernel;
pub mod evaluation;
pub mod raster;
pub mod backend;
pub mod config;
pub mod sync;
pub mod engine;

pub use backend::{BackendKind, CpuBackend, RenderBackend};
pub use config::{ConfigError, EngineConfig};
pub use connection::Edge;
pub use engine::{evaluate_graph, initialize, Engine, EngineError};
pub use evaluation::{EvaluationError, Evaluator};
pub use graph::{Graph, ValidationError, ValidationIssue};
pub use node::{Node, NodeId, NodeKind, ParamValue, Params};
pub use port::{Port, PortDirection};
pub use raster::{rasterize, Raster, RasterError};
pub use sync::ParseError;
pub use value::{Rgba, Value, ValueType};
