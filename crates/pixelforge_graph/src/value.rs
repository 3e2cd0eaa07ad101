// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values flowing along graph edges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An RGBA color with 8-bit color channels and a floating point alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha in `[0, 1]`
    pub a: f32,
}

impl Rgba {
    /// Opaque black, the default for unconnected color inputs
    pub const OPAQUE_BLACK: Self = Self::new(0, 0, 0, 1.0);

    /// Create a new color
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Linearly interpolate towards `other`.
    ///
    /// `t` is clamped to `[0, 1]` (NaN counts as 0). Color channels are
    /// rounded to the nearest integer with ties away from zero, alpha is
    /// interpolated as a float.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let channel = |a: u8, b: u8| -> u8 {
            let t = f64::from(t);
            let mixed = f64::from(a) * (1.0 - t) + f64::from(b) * t;
            mixed.round().clamp(0.0, 255.0) as u8
        };
        Self {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
            a: self.a * (1.0 - t) + other.a * t,
        }
    }

    /// Pack into four bytes; alpha is scaled to `0..=255`
    pub fn to_bytes(self) -> [u8; 4] {
        let alpha = if self.a.is_nan() { 0.0 } else { self.a.clamp(0.0, 1.0) };
        [self.r, self.g, self.b, (alpha * 255.0).round() as u8]
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::OPAQUE_BLACK
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Data type that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Color (RGBA)
    Rgba,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba => f.write_str("RGBA"),
        }
    }
}

/// A value produced by a kernel and carried by an edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Color value
    Rgba(Rgba),
}

impl Value {
    /// Get the value type
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Rgba(_) => ValueType::Rgba,
        }
    }

    /// Get the color, if this is a color value
    pub fn as_rgba(&self) -> Option<Rgba> {
        match self {
            Self::Rgba(color) => Some(*color),
        }
    }
}

impl From<Rgba> for Value {
    fn from(color: Rgba) -> Self {
        Self::Rgba(color)
    }
}
