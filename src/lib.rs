//! # Photo Mosaic
//!
//! A photomosaic engine. An image is cut into a grid of tiles, each tile is
//! reduced to its average color on a pool of worker threads, and each tile
//! is replaced by a swatch image of that color fetched from a swatch
//! provider.
//!
//! ## Pipeline
//!
//! ```text
//! source image → downscale (≤ 680px) → tiles → colors (worker pool)
//!              → swatches (provider + cache) → composite
//! ```
//!
//! ## Architecture
//!
//! - [`source`] - Decoding and proportional downscaling of the input
//! - [`tile`] - Tile type and row-major slicer
//! - [`reduce`] - Sampled average color and the round-robin reducer pool
//! - [`swatch`] - Swatch providers, cache and resolver
//! - [`mosaic`] - Compositor and the engine that runs a generation
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use photo_mosaic::{HttpSwatchProvider, MosaicConfig, MosaicEngine, SourceImage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = HttpSwatchProvider::new("http://localhost:8765")?;
//!     let engine = MosaicEngine::new(provider, MosaicConfig::default());
//!
//!     let result = engine.generate(SourceImage::open("photo.jpg")?).await?;
//!     result.save("mosaic.png")?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mosaic;
pub mod reduce;
pub mod source;
pub mod swatch;
pub mod tile;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, GenerateConfig};
pub use error::{MosaicError, ReductionError, SwatchError};
pub use mosaic::{composite, CancelToken, EngineState, MosaicConfig, MosaicEngine, MosaicResult};
pub use reduce::{
    average_color, rgb_to_hex, ColorReducer, ReducerPool, Rgb, SampledAverage, DEFAULT_POOL_SIZE,
    DEFAULT_SAMPLE_STRIDE,
};
pub use source::{scaled_dimensions, SourceImage, DEFAULT_MAX_DIMENSION};
pub use swatch::{
    HttpSwatchProvider, SwatchCache, SwatchProvider, SwatchResolver,
    DEFAULT_SWATCH_CACHE_CAPACITY,
};
pub use tile::{grid_size, slice, Tile, TileGrid, TileState, DEFAULT_TILE_HEIGHT, DEFAULT_TILE_WIDTH};
