//! Tile slicer.
//!
//! Cuts a source image into a row-major grid of fixed-size tiles and copies
//! out each tile's RGBA samples. Partial tiles at the right and bottom edges
//! are excluded rather than padded, so those strips stay undrawn in the
//! final mosaic.

use image::imageops;
use tracing::debug;

use crate::source::SourceImage;

use super::Tile;

/// Grid geometry for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    /// Number of whole tiles across
    pub columns: u32,

    /// Number of whole tiles down
    pub rows: u32,

    /// Width of each tile in pixels
    pub tile_width: u32,

    /// Height of each tile in pixels
    pub tile_height: u32,
}

impl TileGrid {
    /// Grid of whole tiles that fit in an image of `width` x `height`.
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        let (columns, rows) = grid_size(width, height, tile_width, tile_height);
        Self {
            columns,
            rows,
            tile_width,
            tile_height,
        }
    }

    /// Grid for a source image; a zero-area image has no tiles.
    pub fn for_image(image: &SourceImage, tile_width: u32, tile_height: u32) -> Self {
        if image.is_empty() {
            return Self::new(0, 0, tile_width, tile_height);
        }
        Self::new(image.width(), image.height(), tile_width, tile_height)
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// True when the grid holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(x, y)` of the tile at a row-major index.
    pub fn origin(&self, index: usize) -> Option<(u32, u32)> {
        if index >= self.len() {
            return None;
        }
        let col = (index % self.columns as usize) as u32;
        let row = (index / self.columns as usize) as u32;
        Some((col * self.tile_width, row * self.tile_height))
    }
}

/// Number of whole `(columns, rows)` that fit in an image.
///
/// A zero tile dimension yields an empty grid.
pub fn grid_size(width: u32, height: u32, tile_width: u32, tile_height: u32) -> (u32, u32) {
    if tile_width == 0 || tile_height == 0 {
        return (0, 0);
    }
    (width / tile_width, height / tile_height)
}

/// Slice an image into tiles of `tile_width` x `tile_height`.
///
/// Tiles come back in row-major order, with `index = row * columns + col`.
/// A zero-area image or zero tile size produces an empty list, which callers
/// treat as a valid run with nothing to draw.
pub fn slice(image: &SourceImage, tile_width: u32, tile_height: u32) -> Vec<Tile> {
    let grid = TileGrid::for_image(image, tile_width, tile_height);

    if grid.is_empty() {
        debug!(
            width = image.width(),
            height = image.height(),
            tile_width,
            tile_height,
            "Image yields no whole tiles"
        );
        return Vec::new();
    }

    let mut tiles = Vec::with_capacity(grid.len());
    for row in 0..grid.rows {
        for col in 0..grid.columns {
            let x = col * tile_width;
            let y = row * tile_height;
            let pixels = imageops::crop_imm(image.pixels(), x, y, tile_width, tile_height)
                .to_image()
                .into_raw();

            let index = tiles.len();
            tiles.push(Tile::new(index, x, y, tile_width, tile_height, pixels));
        }
    }

    debug!(
        columns = grid.columns,
        rows = grid.rows,
        tiles = tiles.len(),
        "Sliced source image"
    );

    tiles
}

// =============================================================================
// Tests
// =============================================================================
