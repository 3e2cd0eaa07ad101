// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node kernels: the pure computation behind each node kind.
//!
//! Kernels are selected by a single exhaustive match over [`NodeKind`], so a
//! new kind does not compile until it has a kernel.

use crate::node::{NodeKind, ParamValue, Params};
use crate::value::{Rgba, Value};
use std::collections::HashMap;

/// Default `Mix` factor when the node carries none
pub const DEFAULT_MIX_FACTOR: f32 = 0.5;

/// Settings shared by all kernels of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSettings {
    /// Factor used by `Mix` nodes without a `factor` param
    pub default_mix_factor: f32,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            default_mix_factor: DEFAULT_MIX_FACTOR,
        }
    }
}

/// Values a kernel receives, by input port name
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    values: HashMap<&'static str, Value>,
}

impl NodeInputs {
    /// Create an empty input set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an input value
    pub fn set(&mut self, port: &'static str, value: Value) {
        self.values.insert(port, value);
    }

    /// Get an input value
    pub fn get(&self, port: &str) -> Option<&Value> {
        self.values.get(port)
    }

    fn color(&self, port: &'static str) -> Result<Rgba, KernelError> {
        self.get(port)
            .and_then(Value::as_rgba)
            .ok_or(KernelError::MissingInput(port))
    }
}

/// Result of evaluating a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOutput {
    /// Output values by port name
    pub values: HashMap<&'static str, Value>,
}

impl NodeOutput {
    /// Create a new empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set
    pub fn with(mut self, port: &'static str, value: Value) -> Self {
        self.set(port, value);
        self
    }

    /// Set an output value
    pub fn set(&mut self, port: &'static str, value: Value) {
        self.values.insert(port, value);
    }

    /// Get an output value
    pub fn get(&self, port: &str) -> Option<&Value> {
        self.values.get(port)
    }
}

/// Run the kernel for `kind`.
///
/// `inputs` must hold a value for every declared input; the evaluator fills
/// unconnected ports with their defaults.
pub fn run(
    kind: &NodeKind,
    params: &Params,
    inputs: &NodeInputs,
    settings: &KernelSettings,
) -> Result<NodeOutput, KernelError> {
    match kind {
        NodeKind::ColorSource => color_source(params),
        NodeKind::Mix => mix(params, inputs, settings),
        NodeKind::Output => {
            // Sink: the evaluator hands the input to the rasterizer
            inputs.color("in")?;
            Ok(NodeOutput::new())
        }
        NodeKind::Unknown(tag) => Err(KernelError::UnknownNodeKind(tag.clone())),
    }
}

fn color_source(params: &Params) -> Result<NodeOutput, KernelError> {
    let component = |name: &'static str| -> Result<Option<f64>, KernelError> {
        match number_param(params, name)? {
            Some(n) if n.is_nan() => Err(KernelError::InvalidParam {
                param: name,
                reason: "not a number".to_string(),
            }),
            other => Ok(other),
        }
    };
    let channel = |name: &'static str| -> Result<u8, KernelError> {
        Ok(component(name)?.map_or(0, |n| n.round().clamp(0.0, 255.0) as u8))
    };
    let alpha = component("a")?.map_or(1.0, |n| n.clamp(0.0, 1.0) as f32);
    let color = Rgba::new(channel("r")?, channel("g")?, channel("b")?, alpha);
    Ok(NodeOutput::new().with("color", Value::Rgba(color)))
}

fn mix(params: &Params, inputs: &NodeInputs, settings: &KernelSettings) -> Result<NodeOutput, KernelError> {
    // NaN factors fall through to `lerp`, which treats them as 0
    let factor = number_param(params, "factor")?.map_or(settings.default_mix_factor, |n| n as f32);
    let a = inputs.color("a")?;
    let b = inputs.color("b")?;
    Ok(NodeOutput::new().with("out", Value::Rgba(a.lerp(b, factor))))
}

/// Read an optional numeric param
fn number_param(params: &Params, name: &'static str) -> Result<Option<f64>, KernelError> {
    match params.get(name) {
        None => Ok(None),
        Some(ParamValue::Number(n)) => Ok(Some(*n)),
        Some(other) => Err(KernelError::InvalidParam {
            param: name,
            reason: format!("expected a number, got {other:?}"),
        }),
    }
}

/// Error raised by a kernel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// Node kind has no kernel
    #[error("unknown node kind {0:?}")]
    UnknownNodeKind(String),

    /// Parameter present with an unusable value
    #[error("invalid param {param}: {reason}")]
    InvalidParam {
        /// Param name
        param: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Input value was not supplied
    #[error("missing input {0}")]
    MissingInput(&'static str),
}
