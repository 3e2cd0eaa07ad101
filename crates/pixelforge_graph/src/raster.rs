// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rasterization of the final graph value into a pixel buffer.
//!
//! Buffers are row-major, top to bottom, four bytes per pixel in R, G, B, A
//! order, with a row stride of `width * 4` bytes.

use crate::value::Rgba;
use image::{ImageBuffer, ImageFormat};
use std::io::Cursor;

/// Canonical raster width
pub const CANONICAL_WIDTH: u32 = 256;

/// Canonical raster height
pub const CANONICAL_HEIGHT: u32 = 256;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// An RGBA8 pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Wrap raw RGBA bytes received from the evaluator
    pub fn from_bytes(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        let expected = frame_len(width, height)?;
        if pixels.len() != expected {
            return Err(RasterError::LengthMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Raw pixel bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Take the raw pixel bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// Get the pixel at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let bytes = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Encode as PNG
    pub fn to_png(&self) -> Result<Vec<u8>, RasterError> {
        let image: ImageBuffer<image::Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice()).ok_or(
                RasterError::TooLarge {
                    width: self.width,
                    height: self.height,
                },
            )?;
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| RasterError::Encode(e.to_string()))?;
        Ok(png)
    }
}

/// Fill a `width` x `height` raster with a single color
pub fn rasterize(value: Rgba, width: u32, height: u32) -> Result<Raster, RasterError> {
    let len = frame_len(width, height)?;
    let pixels = value.to_bytes().repeat(len / BYTES_PER_PIXEL);
    debug_assert_eq!(pixels.len(), len);
    Ok(Raster {
        width,
        height,
        pixels,
    })
}

/// Byte length of a `width` x `height` frame
fn frame_len(width: u32, height: u32) -> Result<usize, RasterError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or(RasterError::TooLarge { width, height })
}

/// Error while producing or encoding a raster
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RasterError {
    /// Dimensions overflow the address space
    #[error("raster of {width}x{height} is too large")]
    TooLarge {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Byte buffer does not match the dimensions
    #[error("expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Bytes the dimensions call for
        expected: usize,
        /// Bytes received
        actual: usize,
    },

    /// PNG encoding failed
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_fill() {
        let color = Rgba::new(255, 0, 0, 1.0);
        let raster = rasterize(color, CANONICAL_WIDTH, CANONICAL_HEIGHT).unwrap();
        assert_eq!(raster.as_bytes().len(), 256 * 256 * 4);
        assert_eq!(raster.stride(), 1024);
        assert!(raster
            .as_bytes()
            .chunks_exact(BYTES_PER_PIXEL)
            .all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn test_pixel_lookup() {
        let raster = rasterize(Rgba::new(1, 2, 3, 0.0), 3, 2).unwrap();
        assert_eq!(raster.pixel(2, 1), Some([1, 2, 3, 0]));
        assert_eq!(raster.pixel(3, 0), None);
        assert_eq!(raster.pixel(0, 2), None);
    }

    #[test]
    fn test_empty_raster() {
        let raster = rasterize(Rgba::OPAQUE_BLACK, 0, 16).unwrap();
        assert!(raster.into_bytes().is_empty());
    }

    #[test]
    fn test_from_bytes_checks_length() {
        let raster = Raster::from_bytes(2, 2, vec![7; 16]).unwrap();
        assert_eq!(raster.pixel(1, 1), Some([7, 7, 7, 7]));
        assert_eq!(
            Raster::from_bytes(2, 2, vec![0; 15]),
            Err(RasterError::LengthMismatch {
                expected: 16,
                actual: 15,
            })
        );
    }

    #[test]
    fn test_png_encoding() {
        let raster = rasterize(Rgba::new(10, 20, 30, 1.0), 8, 4).unwrap();
        let png = raster.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.into_raw(), raster.into_bytes());
    }
}
