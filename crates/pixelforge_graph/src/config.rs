// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.
//!
//! Stored as RON, e.g.
//!
//! ```ron
//! (
//!     width: 256,
//!     height: 256,
//!     default_mix_factor: 0.5,
//!     backend: Cpu,
//! )
//! ```

use crate::backend::BackendKind;
use crate::kernel::{KernelSettings, DEFAULT_MIX_FACTOR};
use crate::raster::{CANONICAL_HEIGHT, CANONICAL_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Raster width in pixels
    pub width: u32,
    /// Raster height in pixels
    pub height: u32,
    /// Factor for `Mix` nodes without one
    pub default_mix_factor: f32,
    /// Backend created by initialization
    pub backend: BackendKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            default_mix_factor: DEFAULT_MIX_FACTOR,
            backend: BackendKind::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&source)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "raster size {}x{} must be non-empty",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.default_mix_factor) {
            return Err(ConfigError::Invalid(format!(
                "default_mix_factor {} outside [0, 1]",
                self.default_mix_factor
            )));
        }
        Ok(())
    }

    /// Kernel settings derived from this config
    pub fn kernel_settings(&self) -> KernelSettings {
        KernelSettings {
            default_mix_factor: self.default_mix_factor,
        }
    }

    /// Byte length of one rendered frame
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * crate::raster::BYTES_PER_PIXEL
    }
}

/// Error loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON could not be parsed
    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON could not be written
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Value out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}
