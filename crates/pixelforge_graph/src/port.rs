// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::value::{Rgba, Value, ValueType};
use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// A port declared by a node kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Port {
    /// Port name, as used by edge handles
    pub name: &'static str,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub value_type: ValueType,
    /// Value used when an input is left unconnected
    pub default_value: Option<Value>,
}

impl Port {
    /// Create a new input port
    pub const fn input(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            value_type,
            default_value: None,
        }
    }

    /// Create a new output port
    pub const fn output(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            value_type,
            default_value: None,
        }
    }

    /// Set the default value
    pub const fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Check if a connection from this port to `other` is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        self.direction == PortDirection::Output
            && other.direction == PortDirection::Input
            && self.value_type == other.value_type
    }
}

/// Color input that reads as opaque black when unconnected
pub(crate) const fn color_input(name: &'static str) -> Port {
    Port::input(name, ValueType::Rgba).with_default(Value::Rgba(Rgba::OPAQUE_BLACK))
}
