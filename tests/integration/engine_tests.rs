//! End-to-end mosaic engine tests.
//!
//! Tests verify:
//! - Tile counts and placement across the whole pipeline
//! - No cross-assignment between concurrently reduced tiles
//! - First failure rejects the run with no composite
//! - Zero-tile images, downscaling, cancellation and the one-run rule
//! - Bit-identical output across repeated runs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};

use photo_mosaic::error::{MosaicError, ReductionError, SwatchError};
use photo_mosaic::mosaic::{CancelToken, EngineState, MosaicConfig, MosaicEngine};
use photo_mosaic::reduce::rgb_to_hex;
use photo_mosaic::source::SourceImage;

use super::test_utils::{
    distinct_tiles_image, gradient_image, solid_image, tile_color, FailingReducer,
    FailingSwatchProvider, JitterReducer, SolidSwatchProvider,
};

fn config(tile: u32) -> MosaicConfig {
    MosaicConfig::default().with_tile_size(tile, tile)
}

// =============================================================================
// Tile Placement
// =============================================================================

#[tokio::test]
async fn test_every_tile_lands_in_its_own_cell() {
    let (width, height, tile) = (160, 96, 8);
    let engine = MosaicEngine::new(SolidSwatchProvider::new(), config(tile))
        .with_reducer(Arc::new(JitterReducer));

    let result = engine
        .generate(distinct_tiles_image(width, height, tile, tile))
        .await
        .unwrap();

    let (columns, rows) = (width / tile, height / tile);
    assert_eq!(result.tile_count(), (columns * rows) as usize);

    for row in 0..rows {
        for col in 0..columns {
            let index = (row * columns + col) as usize;
            let [r, g, b] = tile_color(index);
            let expected = Rgba([r, g, b, 255]);

            // Corners and centre of the cell all carry this tile's color
            for (dx, dy) in [(0, 0), (tile - 1, 0), (tile / 2, tile / 2), (tile - 1, tile - 1)] {
                assert_eq!(
                    result.image.get_pixel(col * tile + dx, row * tile + dy),
                    &expected,
                    "tile {} at ({}, {})",
                    index,
                    col,
                    row
                );
            }
        }
    }
}

#[tokio::test]
async fn test_each_color_requested_once_per_distinct_tile() {
    let provider = Arc::new(SolidSwatchProvider::new());
    let engine = MosaicEngine::new(Arc::clone(&provider), config(4));

    engine
        .generate(distinct_tiles_image(64, 32, 4, 4))
        .await
        .unwrap();

    let expected: HashSet<String> = (0..128)
        .map(|i| {
            let [r, g, b] = tile_color(i);
            rgb_to_hex(r, g, b).trim_start_matches('#').to_string()
        })
        .collect();

    assert_eq!(provider.distinct_colors(), expected);
    assert_eq!(provider.load_count(), 128);
}

#[tokio::test]
async fn test_partial_edge_strips_are_dropped() {
    let engine = MosaicEngine::new(SolidSwatchProvider::new(), config(16));

    let result = engine
        .generate(solid_image(50, 40, [9, 8, 7]))
        .await
        .unwrap();

    assert_eq!(result.image.dimensions(), (50, 40));
    assert_eq!((result.grid.columns, result.grid.rows), (3, 2));
    assert_eq!(result.image.get_pixel(47, 31), &Rgba([9, 8, 7, 255]));

    // Right strip (x >= 48) and bottom strip (y >= 32) stay undrawn
    assert_eq!(result.image.get_pixel(48, 0)[3], 0);
    assert_eq!(result.image.get_pixel(0, 32)[3], 0);
}

#[tokio::test]
async fn test_repeated_colors_share_swatches() {
    let provider = Arc::new(SolidSwatchProvider::with_delay(Duration::from_millis(10)));
    let engine = MosaicEngine::new(Arc::clone(&provider), config(8));

    let result = engine
        .generate(solid_image(128, 128, [40, 80, 120]))
        .await
        .unwrap();

    assert_eq!(result.tile_count(), 256);
    assert_eq!(provider.load_count(), 1);

    // The cache outlives the run
    engine
        .generate(solid_image(64, 64, [40, 80, 120]))
        .await
        .unwrap();
    assert_eq!(provider.load_count(), 1);
}

// =============================================================================
// Failure Propagation
// =============================================================================

#[tokio::test]
async fn test_reduction_failure_rejects_run() {
    let failing = tile_color(5);
    let engine = MosaicEngine::new(SolidSwatchProvider::new(), config(8))
        .with_reducer(Arc::new(FailingReducer::new(failing)));

    let result = engine.generate(distinct_tiles_image(64, 64, 8, 8)).await;

    match result {
        Err(MosaicError::Reduction { index, source }) => {
            assert_eq!(index, 5);
            assert!(matches!(source, ReductionError::Rejected { .. }));
        }
        other => panic!("Expected Reduction error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(engine.state(), EngineState::Failed);
}

#[tokio::test]
async fn test_swatch_failure_rejects_run() {
    let [r, g, b] = tile_color(3);
    let engine = MosaicEngine::new(FailingSwatchProvider::new(&rgb_to_hex(r, g, b)), config(8));

    let result = engine.generate(distinct_tiles_image(32, 32, 8, 8)).await;

    match result {
        Err(MosaicError::SwatchLoad { index, source }) => {
            assert_eq!(index, 3);
            assert!(matches!(source, SwatchError::NotFound { .. }));
        }
        other => panic!("Expected SwatchLoad error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_engine_usable_after_failure() {
    let reducer = Arc::new(FailingReducer::new([1, 2, 3]));
    let engine =
        MosaicEngine::new(SolidSwatchProvider::new(), config(8)).with_reducer(reducer.clone());

    assert!(engine.generate(solid_image(16, 16, [1, 2, 3])).await.is_err());

    let result = engine.generate(solid_image(16, 16, [3, 2, 1])).await.unwrap();
    assert_eq!(result.tile_count(), 4);
    assert_eq!(engine.state(), EngineState::Done);
    assert!(reducer.calls() >= 4);
}

// =============================================================================
// Edge Cases
// =============================================================================

#[tokio::test]
async fn test_zero_tiles_completes_with_empty_composite() {
    let provider = Arc::new(SolidSwatchProvider::new());
    let engine = MosaicEngine::new(Arc::clone(&provider), config(16));

    // Smaller than one tile
    let result = engine.generate(solid_image(10, 40, [1, 1, 1])).await.unwrap();
    assert_eq!(result.tile_count(), 0);
    assert_eq!(result.image.dimensions(), (10, 40));
    assert!(result.image.pixels().all(|p| p[3] == 0));

    // Zero area
    let result = engine
        .generate(SourceImage::from_rgba(RgbaImage::new(0, 0)))
        .await
        .unwrap();
    assert_eq!(result.tile_count(), 0);

    assert_eq!(provider.load_count(), 0);
}

#[tokio::test]
async fn test_image_at_bound_not_rescaled() {
    let engine = MosaicEngine::new(SolidSwatchProvider::new(), config(20));

    let result = engine.generate(gradient_image(680, 680)).await.unwrap();
    assert_eq!(result.image.dimensions(), (680, 680));
    assert_eq!(result.tile_count(), 34 * 34);
}

#[tokio::test]
async fn test_wide_image_downscaled() {
    let engine = MosaicEngine::new(SolidSwatchProvider::new(), config(20));

    let result = engine.generate(gradient_image(1360, 680)).await.unwrap();
    assert_eq!(result.image.dimensions(), (680, 340));
    assert_eq!((result.grid.columns, result.grid.rows), (34, 17));
}

#[tokio::test]
async fn test_custom_max_dimension() {
    let engine = MosaicEngine::new(
        SolidSwatchProvider::new(),
        config(10).with_max_dimension(100),
    );

    let result = engine.generate(gradient_image(300, 150)).await.unwrap();
    assert_eq!(result.image.dimensions(), (100, 50));
    assert_eq!(result.tile_count(), 50);
}

// =============================================================================
// Determinism
// =============================================================================

#[tokio::test]
async fn test_repeated_runs_are_bit_identical() {
    let image = gradient_image(200, 120);

    let first = MosaicEngine::new(SolidSwatchProvider::new(), config(8))
        .generate(image.clone())
        .await
        .unwrap();

    // Different pool size and a warm cache must not change the output
    let engine = MosaicEngine::new(SolidSwatchProvider::new(), config(8).with_pool_size(3))
        .with_reducer(Arc::new(JitterReducer));
    let second = engine.generate(image.clone()).await.unwrap();
    let third = engine.generate(image).await.unwrap();

    assert_eq!(first.image.as_raw(), second.image.as_raw());
    assert_eq!(second.image.as_raw(), third.image.as_raw());
    assert_eq!(first.encode_png().unwrap(), third.encode_png().unwrap());
}

// =============================================================================
// Run Control
// =============================================================================

#[tokio::test]
async fn test_second_concurrent_run_is_busy() {
    let engine = Arc::new(MosaicEngine::new(
        SolidSwatchProvider::with_delay(Duration::from_millis(200)),
        config(8),
    ));

    let running = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.generate(solid_image(32, 32, [5, 5, 5])).await })
    };

    // Wait until the first run is underway
    let mut states = engine.subscribe();
    states
        .wait_for(|state| state.is_active())
        .await
        .unwrap();

    let second = engine.generate(solid_image(32, 32, [6, 6, 6])).await;
    assert!(matches!(second, Err(MosaicError::Busy)));

    let first = running.await.unwrap().unwrap();
    assert_eq!(first.tile_count(), 16);
}

#[tokio::test]
async fn test_cancel_during_run() {
    let engine = Arc::new(MosaicEngine::new(
        SolidSwatchProvider::with_delay(Duration::from_secs(5)),
        config(8),
    ));
    let token = CancelToken::new();

    let running = {
        let engine = Arc::clone(&engine);
        let token = token.clone();
        tokio::spawn(async move {
            engine
                .generate_with_cancel(distinct_tiles_image(32, 32, 8, 8), &token)
                .await
        })
    };

    let mut states = engine.subscribe();
    states
        .wait_for(|state| *state == EngineState::Reducing || *state == EngineState::Resolving)
        .await
        .unwrap();
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("cancelled run should finish promptly")
        .unwrap();
    assert!(matches!(result, Err(MosaicError::Cancelled)));
    assert_eq!(engine.state(), EngineState::Failed);
}

#[tokio::test]
async fn test_state_ends_done() {
    let engine = MosaicEngine::new(SolidSwatchProvider::new(), config(8));
    assert_eq!(engine.state(), EngineState::Idle);

    engine.generate(solid_image(16, 16, [0, 0, 0])).await.unwrap();
    assert_eq!(engine.state(), EngineState::Done);
}
