// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rendering backends that turn the evaluated color into pixels.

use crate::raster::{rasterize, Raster, RasterError};
use crate::value::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A rendering resource, created once and shared by every evaluation
pub trait RenderBackend: Send + Sync + fmt::Debug {
    /// Human readable backend name
    fn name(&self) -> &str;

    /// Fill a raster of the given size with `value`
    fn render(&self, value: Rgba, width: u32, height: u32) -> Result<Raster, RasterError>;
}

/// Which backend to create at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// Software rasterizer
    #[default]
    Cpu,
}

impl BackendKind {
    /// Create the backend
    pub fn create(self) -> Arc<dyn RenderBackend> {
        match self {
            Self::Cpu => Arc::new(CpuBackend),
        }
    }
}

/// Software backend writing straight into host memory
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl RenderBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn render(&self, value: Rgba, width: u32, height: u32) -> Result<Raster, RasterError> {
        rasterize(value, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_backend_renders_uniform_color() {
        let backend = BackendKind::Cpu.create();
        assert_eq!(backend.name(), "cpu");
        let raster = backend.render(Rgba::new(9, 8, 7, 1.0), 4, 4).unwrap();
        assert_eq!(raster.pixel(3, 3), Some([9, 8, 7, 255]));
    }
}
