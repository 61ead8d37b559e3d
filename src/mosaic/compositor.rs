//! Mosaic compositor.
//!
//! Draws every tile's swatch onto a transparent canvas the size of the
//! working image. Tile regions are disjoint, so draw order has no effect on
//! the output. Strips the slicer dropped at the right and bottom edges are
//! left transparent.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::trace;

use crate::error::MosaicError;
use crate::tile::Tile;

/// Compose resolved tiles into a `width` x `height` canvas.
///
/// Every tile must have a swatch. Swatches whose size differs from the tile's
/// cell are scaled to fit it exactly.
pub fn composite(tiles: &[Tile], width: u32, height: u32) -> Result<RgbaImage, MosaicError> {
    // Check all tiles first so a failure never leaves a half-drawn canvas
    if let Some(tile) = tiles.iter().find(|tile| tile.swatch().is_none()) {
        return Err(MosaicError::UnresolvedTile { index: tile.index });
    }

    let mut canvas = RgbaImage::new(width, height);

    for tile in tiles {
        let Some(swatch) = tile.swatch() else {
            return Err(MosaicError::UnresolvedTile { index: tile.index });
        };

        if swatch.dimensions() == (tile.width, tile.height) {
            imageops::replace(&mut canvas, &**swatch, tile.x as i64, tile.y as i64);
        } else {
            trace!(
                index = tile.index,
                swatch_width = swatch.width(),
                swatch_height = swatch.height(),
                "Scaling swatch to tile size"
            );
            let scaled = imageops::resize(
                &**swatch,
                tile.width,
                tile.height,
                FilterType::Triangle,
            );
            imageops::replace(&mut canvas, &scaled, tile.x as i64, tile.y as i64);
        }
    }

    Ok(canvas)
}

// =============================================================================
// Tests
// =============================================================================
