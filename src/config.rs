//! Configuration for the photo-mosaic command line.
//!
//! Settings come from:
//! - Command-line arguments via clap
//! - Environment variables with the `MOSAIC_` prefix
//! - Defaults matching the library defaults
//!
//! # Environment Variables
//!
//! - `MOSAIC_SWATCH_URL` - Swatch service base URL (default: http://localhost:8765)
//! - `MOSAIC_TILE_WIDTH` - Tile width in pixels (default: 16)
//! - `MOSAIC_TILE_HEIGHT` - Tile height in pixels (default: 16)
//! - `MOSAIC_MAX_DIMENSION` - Largest working image side (default: 680)
//! - `MOSAIC_WORKERS` - Reducer workers per run (default: 4)
//! - `MOSAIC_SWATCH_CACHE` - Cached swatches (default: 1024)
//! - `MOSAIC_SWATCH_TIMEOUT` - Swatch request timeout in seconds (default: 30)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::mosaic::MosaicConfig;
use crate::reduce::{hex_digits, DEFAULT_POOL_SIZE};
use crate::source::DEFAULT_MAX_DIMENSION;
use crate::swatch::{DEFAULT_SWATCH_CACHE_CAPACITY, DEFAULT_SWATCH_TIMEOUT};
use crate::tile::{DEFAULT_TILE_HEIGHT, DEFAULT_TILE_WIDTH};

// =============================================================================
// Default Values
// =============================================================================

/// Default swatch service URL.
pub const DEFAULT_SWATCH_URL: &str = "http://localhost:8765";

/// Default color fetched by `check`.
pub const DEFAULT_CHECK_COLOR: &str = "ff0000";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Photo Mosaic - turn an image into a mosaic of color swatches.
#[derive(Parser, Debug, Clone)]
#[command(name = "photo-mosaic")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a mosaic from an image file.
    Generate(GenerateConfig),

    /// Check that the swatch service is reachable and serves decodable swatches.
    Check(CheckConfig),
}

/// Options for `photo-mosaic generate`.
#[derive(Args, Debug, Clone)]
pub struct GenerateConfig {
    /// Source image (PNG or JPEG).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the mosaic; the format follows the extension.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Base URL of the swatch service.
    #[arg(long, default_value = DEFAULT_SWATCH_URL, env = "MOSAIC_SWATCH_URL")]
    pub swatch_url: String,

    /// Tile width in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_WIDTH, env = "MOSAIC_TILE_WIDTH")]
    pub tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_HEIGHT, env = "MOSAIC_TILE_HEIGHT")]
    pub tile_height: u32,

    /// Larger images are downscaled so neither side exceeds this.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "MOSAIC_MAX_DIMENSION")]
    pub max_dimension: u32,

    /// Number of reducer worker threads.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "MOSAIC_WORKERS")]
    pub workers: usize,

    /// Maximum number of swatches to keep in memory.
    #[arg(long, default_value_t = DEFAULT_SWATCH_CACHE_CAPACITY, env = "MOSAIC_SWATCH_CACHE")]
    pub swatch_cache: usize,

    /// Swatch request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_SWATCH_TIMEOUT.as_secs(), env = "MOSAIC_SWATCH_TIMEOUT")]
    pub timeout: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl GenerateConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_swatch_url(&self.swatch_url)?;
        validate_tile_size(self.tile_width, self.tile_height)?;

        if self.max_dimension < self.tile_width.max(self.tile_height) {
            return Err(format!(
                "max_dimension ({}) must be at least the tile size ({}x{})",
                self.max_dimension, self.tile_width, self.tile_height
            ));
        }
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.swatch_cache == 0 {
            return Err("swatch_cache must be greater than 0".to_string());
        }
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Engine settings for this invocation.
    pub fn mosaic_config(&self) -> MosaicConfig {
        MosaicConfig::new()
            .with_tile_size(self.tile_width, self.tile_height)
            .with_max_dimension(self.max_dimension)
            .with_pool_size(self.workers)
            .with_swatch_cache_capacity(self.swatch_cache)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Options for `photo-mosaic check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Base URL of the swatch service.
    #[arg(long, default_value = DEFAULT_SWATCH_URL, env = "MOSAIC_SWATCH_URL")]
    pub swatch_url: String,

    /// Color to fetch, as 6 hex digits with or without `#`.
    #[arg(long, default_value = DEFAULT_CHECK_COLOR)]
    pub color: String,

    /// Tile width in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_WIDTH, env = "MOSAIC_TILE_WIDTH")]
    pub tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_HEIGHT, env = "MOSAIC_TILE_HEIGHT")]
    pub tile_height: u32,

    /// Swatch request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_SWATCH_TIMEOUT.as_secs(), env = "MOSAIC_SWATCH_TIMEOUT")]
    pub timeout: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_swatch_url(&self.swatch_url)?;
        validate_tile_size(self.tile_width, self.tile_height)?;

        if hex_digits(&self.color).is_none() {
            return Err(format!(
                "color must be 6 hex digits (e.g. ff0000), got {:?}",
                self.color
            ));
        }
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn validate_swatch_url(swatch_url: &str) -> Result<(), String> {
    Url::parse(swatch_url)
        .map(|_| ())
        .map_err(|e| format!("Invalid swatch URL {:?}: {}", swatch_url, e))
}

fn validate_tile_size(width: u32, height: u32) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err("tile_width and tile_height must be greater than 0".to_string());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
