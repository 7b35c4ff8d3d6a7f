//! Image frames and regions of interest
//!
//! Converts decoded rasters into the buffer/geometry contract the engine
//! expects and submits them to a live handle.

use crate::engine::EngineHandle;
use crate::error::OcrError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Sub-rectangle of a frame. A zero-area region means the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from left/top/right/bottom edges
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, (right - left).max(0), (bottom - top).max(0))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// A decoded page as handed over by an image codec. Owns its pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
}

impl DecodedImage {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, bits_per_pixel: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            bits_per_pixel,
        }
    }

    /// Flatten a decoded image into a packed 8, 24 or 32 bpp buffer.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        match img {
            DynamicImage::ImageLuma8(gray) => Self::new(gray.as_raw().clone(), width, height, 8),
            DynamicImage::ImageRgb8(rgb) => Self::new(rgb.as_raw().clone(), width, height, 24),
            DynamicImage::ImageRgba8(rgba) => Self::new(rgba.as_raw().clone(), width, height, 32),
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) => {
                Self::new(img.to_luma8().into_raw(), width, height, 8)
            }
            _ => Self::new(img.to_rgb8().into_raw(), width, height, 24),
        }
    }

    /// Borrow as a validated frame
    pub fn frame(&self) -> Result<Frame<'_>, OcrError> {
        Frame::new(&self.pixels, self.width, self.height, self.bits_per_pixel)
    }
}

/// Bytes per row for a packed raster: ceil(width * bpp / 8)
pub fn row_stride(width: u32, bits_per_pixel: u32) -> usize {
    (width as usize * bits_per_pixel as usize).div_ceil(8)
}

/// A validated view over pixel memory owned by someone else
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    bits_per_pixel: u32,
}

impl<'a> Frame<'a> {
    /// Validate geometry against the buffer. Supported depths are 1, 8, 24 and 32 bits.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        bits_per_pixel: u32,
    ) -> Result<Self, OcrError> {
        if !matches!(bits_per_pixel, 1 | 8 | 24 | 32) {
            return Err(OcrError::InvalidFrame(format!(
                "unsupported bit depth: {} bpp",
                bits_per_pixel
            )));
        }
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidFrame(format!(
                "frame dimensions must be non-zero (got {}x{})",
                width, height
            )));
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(OcrError::InvalidFrame(format!(
                "frame dimensions too large: {}x{}",
                width, height
            )));
        }

        let required = row_stride(width, bits_per_pixel) * height as usize;
        if data.len() < required {
            return Err(OcrError::InvalidFrame(format!(
                "buffer holds {} bytes, {}x{} at {} bpp needs {}",
                data.len(),
                width,
                height,
                bits_per_pixel,
                required
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            bits_per_pixel,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.bits_per_pixel
    }

    /// Whole bytes per pixel; 0 for bilevel images
    pub fn bytes_per_pixel(&self) -> u32 {
        self.bits_per_pixel / 8
    }

    pub fn bytes_per_line(&self) -> usize {
        row_stride(self.width, self.bits_per_pixel)
    }
}

/// Hand a frame, and optionally a recognition rectangle, to the engine.
///
/// Must run exactly once per page before any text or iterator extraction.
pub fn submit<H: EngineHandle>(handle: &mut H, frame: &Frame<'_>, roi: Option<&Region>) {
    tracing::debug!(
        "Submitting frame {}x{} at {} bpp ({} bytes/line)",
        frame.width(),
        frame.height(),
        frame.bits_per_pixel(),
        frame.bytes_per_line()
    );
    handle.set_image(frame);

    if let Some(region) = roi.filter(|r| !r.is_empty()) {
        tracing::debug!(
            "Restricting recognition to {}x{} at ({}, {})",
            region.width,
            region.height,
            region.x,
            region.y
        );
        handle.set_rectangle(region);
    }
}
