//! Photo Mosaic - turn an image into a mosaic of color swatches.
//!
//! This binary wires the CLI configuration to the mosaic engine.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_mosaic::{
    config::{CheckConfig, Cli, Command, GenerateConfig},
    reduce::hex_digits,
    swatch::{HttpSwatchProvider, SwatchProvider},
    MosaicEngine, SourceImage,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Generate(config) => run_generate(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Generate Command
// =============================================================================

async fn run_generate(config: GenerateConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Input: {}", config.input.display());
    info!("  Output: {}", config.output.display());
    info!("  Swatch service: {}", config.swatch_url);
    info!(
        "  Tiles: {}x{}, max dimension {}px",
        config.tile_width, config.tile_height, config.max_dimension
    );
    info!(
        "  Workers: {}, swatch cache: {}",
        config.workers, config.swatch_cache
    );

    let image = match SourceImage::open(&config.input) {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to load {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let provider = match HttpSwatchProvider::with_timeout(&config.swatch_url, config.timeout()) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create swatch provider: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let engine = MosaicEngine::new(provider, config.mosaic_config());

    let result = match engine.generate(image).await {
        Ok(result) => result,
        Err(e) => {
            error!("Mosaic generation failed: {}", e);
            if e.tile_index().is_some() {
                error!("  Is the swatch service at {} running?", config.swatch_url);
            }
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = result.save(&config.output) {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {}x{} mosaic ({} tiles) to {} in {}ms",
        result.width(),
        result.height(),
        result.tile_count(),
        config.output.display(),
        result.elapsed.as_millis()
    );

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "photo_mosaic=debug"
    } else {
        "photo_mosaic=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    // Check output goes to stdout; only log when asked
    if config.verbose {
        init_logging(true);
    }

    println!("Photo Mosaic Swatch Check");
    println!("═════════════════════════");
    println!();

    if let Err(e) = config.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let provider = match HttpSwatchProvider::with_timeout(&config.swatch_url, config.timeout()) {
        Ok(provider) => {
            println!("✓ Swatch service: {}", provider.identifier());
            provider
        }
        Err(e) => {
            println!("✗ Swatch service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let color = hex_digits(&config.color).unwrap_or_default();
    match provider.swatch_url(&color) {
        Ok(url) => println!("✓ Lookup URL: {}", url),
        Err(e) => {
            println!("✗ Lookup URL: {}", e);
            return ExitCode::FAILURE;
        }
    }
    println!();

    print!("Fetching swatch... ");

    match provider
        .load(&color, config.tile_width, config.tile_height)
        .await
    {
        Ok(swatch) => {
            println!("✓ success");
            println!();
            println!("  Swatch size: {}x{}", swatch.width(), swatch.height());
            if swatch.dimensions() != (config.tile_width, config.tile_height) {
                println!(
                    "  Note: swatches will be scaled to {}x{} tiles",
                    config.tile_width, config.tile_height
                );
            }
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The swatch service is running at {}", config.swatch_url);
            println!("  - It serves SVG, PNG or JPEG images at /color/<hex>");
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("All checks passed.");
    ExitCode::SUCCESS
}
