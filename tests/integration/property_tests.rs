//! Property-based tests for slicing, downscaling and color reduction.

use image::{Rgba, RgbaImage};
use proptest::prelude::*;

use photo_mosaic::reduce::{average_color, rgb_to_hex, Rgb, DEFAULT_SAMPLE_STRIDE};
use photo_mosaic::source::{scaled_dimensions, SourceImage, DEFAULT_MAX_DIMENSION};
use photo_mosaic::tile::{slice, TileGrid};

fn create_test_image(width: u32, height: u32) -> SourceImage {
    SourceImage::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn slicer_count_and_indices(
        width in 0u32..=96,
        height in 0u32..=96,
        tile_width in 1u32..=24,
        tile_height in 1u32..=24,
    ) {
        let image = create_test_image(width, height);
        let tiles = slice(&image, tile_width, tile_height);

        let columns = width / tile_width;
        let rows = height / tile_height;
        prop_assert_eq!(tiles.len(), (columns * rows) as usize);

        let grid = TileGrid::for_image(&image, tile_width, tile_height);
        for (i, tile) in tiles.iter().enumerate() {
            prop_assert_eq!(tile.index, i);
            prop_assert_eq!(Some((tile.x, tile.y)), grid.origin(i));
            prop_assert!(tile.x + tile.width <= width);
            prop_assert!(tile.y + tile.height <= height);
            prop_assert_eq!(
                tile.pixels().map(|p| p.len()),
                Some((tile_width * tile_height * 4) as usize)
            );
        }
    }

    #[test]
    fn downscale_respects_bound(width in 1u32..=4000, height in 1u32..=4000) {
        let (w, h) = scaled_dimensions(width, height, DEFAULT_MAX_DIMENSION);

        prop_assert!(w >= 1 && h >= 1);
        prop_assert!(w <= DEFAULT_MAX_DIMENSION && h <= DEFAULT_MAX_DIMENSION);

        if width <= DEFAULT_MAX_DIMENSION && height <= DEFAULT_MAX_DIMENSION {
            prop_assert_eq!((w, h), (width, height));
        } else {
            // Larger side hits the bound and nothing grows
            prop_assert_eq!(w.max(h), DEFAULT_MAX_DIMENSION);
            prop_assert!(w <= width && h <= height);
        }
    }

    #[test]
    fn uniform_tile_average_is_exact(
        r in any::<u8>(),
        g in any::<u8>(),
        b in any::<u8>(),
        pixels in 1usize..=300,
        stride in 1usize..=9,
    ) {
        let buffer: Vec<u8> = [r, g, b, 255].iter().copied().cycle().take(pixels * 4).collect();

        prop_assert_eq!(average_color(&buffer, stride).unwrap(), Rgb::new(r, g, b));
        prop_assert_eq!(
            average_color(&buffer, DEFAULT_SAMPLE_STRIDE).unwrap(),
            Rgb::new(r, g, b)
        );
    }

    #[test]
    fn hex_is_seven_lowercase_chars(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let hex = rgb_to_hex(r, g, b);
        prop_assert_eq!(hex.len(), 7);
        prop_assert!(hex.starts_with('#'));
        let packed = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
        prop_assert_eq!(u32::from_str_radix(&hex[1..], 16).unwrap(), packed);
        prop_assert_eq!(hex.to_lowercase(), hex);
    }
}
