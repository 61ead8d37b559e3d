//! Source images for mosaic generation.
//!
//! A [`SourceImage`] is the decoded raster the engine works from. It is
//! immutable once loaded; downscaling produces a new image.
//!
//! # Size Bound
//!
//! Images wider or taller than the engine's maximum dimension (680 pixels by
//! default) are downscaled proportionally so the larger side equals the bound.
//! Images already within the bound pass through untouched, including images
//! exactly at the bound.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbaImage};
use tracing::debug;

use crate::error::MosaicError;

/// Default maximum width or height of the working image.
pub const DEFAULT_MAX_DIMENSION: u32 = 680;

/// A decoded source raster, stored as 8-bit RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    /// Wrap an already decoded image.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            pixels: image.into_rgba8(),
        }
    }

    /// Wrap an RGBA buffer.
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Decode an image from encoded bytes, guessing the format from its header.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MosaicError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| MosaicError::Decode {
                message: e.to_string(),
            })?;

        let image = reader.decode().map_err(|e| MosaicError::Decode {
            message: e.to_string(),
        })?;

        Ok(Self::new(image))
    }

    /// Decode an image from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MosaicError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| MosaicError::Io {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_bytes(&data)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// True when the image has no pixels to rasterize.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Borrow the RGBA pixels.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Downscale so that neither side exceeds `max_dimension`.
    ///
    /// Returns `self` unchanged when the image already fits.
    pub fn fit_within(self, max_dimension: u32) -> Self {
        let (width, height) = self.dimensions();
        let (target_width, target_height) = scaled_dimensions(width, height, max_dimension);

        if (target_width, target_height) == (width, height) {
            return self;
        }

        debug!(
            width,
            height, target_width, target_height, "Downscaling source image"
        );

        let pixels = imageops::resize(
            &self.pixels,
            target_width,
            target_height,
            FilterType::Triangle,
        );
        Self { pixels }
    }
}

/// Compute the dimensions of an image scaled to fit within `max_dimension`.
///
/// The larger side becomes exactly `max_dimension`; the other side is scaled
/// by the same ratio and rounded down, never below one pixel. Dimensions
/// already within the bound are returned unchanged.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |side: u32, longest: u32| -> u32 {
        let scaled = side as u64 * max_dimension as u64 / longest as u64;
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

// =============================================================================
// Tests
// =============================================================================
