//! Tiles and the tile slicer.
//!
//! A mosaic run partitions its source image into a uniform grid of tiles.
//! Every other stage addresses tiles by their row-major index:
//!
//! ```text
//!         col 0   col 1   col 2
//!       ┌───────┬───────┬───────┐
//! row 0 │   0   │   1   │   2   │
//!       ├───────┼───────┼───────┤
//! row 1 │   3   │   4   │   5   │
//!       └───────┴───────┴───────┘
//!         (partial strips at the right/bottom edge are dropped)
//! ```
//!
//! Each tile moves through `Sliced → ColorComputed → SwatchResolved`. Its
//! pixel buffer is moved out when the tile is submitted for reduction, its
//! color is written once by the reduction result and its swatch once by the
//! resolver.

mod slicer;

use std::sync::Arc;

use image::RgbaImage;

use crate::error::MosaicError;

pub use slicer::{grid_size, slice, TileGrid};

/// Default tile width in pixels.
pub const DEFAULT_TILE_WIDTH: u32 = 16;

/// Default tile height in pixels.
pub const DEFAULT_TILE_HEIGHT: u32 = 16;

/// Pipeline stage a tile has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TileState {
    /// Cut from the source image, pixels not yet reduced
    Sliced,
    /// Average color known
    ColorComputed,
    /// Swatch image loaded
    SwatchResolved,
}

/// A rectangular cell of the source image.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Row-major position in the grid (0-based)
    pub index: usize,

    /// Left edge in the working image
    pub x: u32,

    /// Top edge in the working image
    pub y: u32,

    /// Cell width in pixels
    pub width: u32,

    /// Cell height in pixels
    pub height: u32,

    /// Raw RGBA samples, present until handed to the reducer
    pixels: Option<Vec<u8>>,

    /// `#rrggbb` average color
    color_hex: Option<String>,

    /// Loaded swatch
    swatch: Option<Arc<RgbaImage>>,
}

impl Tile {
    /// Create a freshly sliced tile.
    pub fn new(index: usize, x: u32, y: u32, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            index,
            x,
            y,
            width,
            height,
            pixels: Some(pixels),
            color_hex: None,
            swatch: None,
        }
    }

    /// Current stage of this tile.
    pub fn state(&self) -> TileState {
        if self.swatch.is_some() {
            TileState::SwatchResolved
        } else if self.color_hex.is_some() {
            TileState::ColorComputed
        } else {
            TileState::Sliced
        }
    }

    /// Borrow the pixel buffer if it has not been consumed.
    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    /// Move the pixel buffer out of the tile.
    pub fn take_pixels(&mut self) -> Option<Vec<u8>> {
        self.pixels.take()
    }

    /// The tile's average color as `#rrggbb`.
    pub fn color_hex(&self) -> Option<&str> {
        self.color_hex.as_deref()
    }

    /// The tile's swatch image.
    pub fn swatch(&self) -> Option<&Arc<RgbaImage>> {
        self.swatch.as_ref()
    }

    /// Record the reduced color. A tile's color is written at most once.
    pub fn set_color(&mut self, color_hex: impl Into<String>) -> Result<(), MosaicError> {
        if self.color_hex.is_some() {
            return Err(MosaicError::DuplicateResult {
                index: self.index,
                stage: "color",
            });
        }
        self.color_hex = Some(color_hex.into());
        Ok(())
    }

    /// Record the loaded swatch. This is the last mutation a tile sees.
    pub fn set_swatch(&mut self, swatch: Arc<RgbaImage>) -> Result<(), MosaicError> {
        if self.swatch.is_some() {
            return Err(MosaicError::DuplicateResult {
                index: self.index,
                stage: "swatch",
            });
        }
        self.swatch = Some(swatch);
        Ok(())
    }
}
