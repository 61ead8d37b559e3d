//! Mosaic engine.
//!
//! The engine owns one generation run end to end:
//!
//! ```text
//! idle → resizing → slicing → reducing → resolving → compositing → done
//!                                  └──────────┴────────────┴──────→ failed
//! ```
//!
//! All tiles are submitted to a [`ReducerPool`] spawned for the run. Each
//! tile then follows its own reduce → resolve-swatch pipeline on a task;
//! reductions are bounded by the pool size, swatch loads are not. Tasks
//! report back over a channel and only the coordinating loop mutates tiles,
//! so every tile's color and swatch are written exactly once.
//!
//! The first failing tile fails the run. Work already issued for other tiles
//! is left to finish in the background and its results are dropped.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::{DynamicImage, ImageError, ImageFormat, RgbaImage};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::error::MosaicError;
use crate::reduce::{ColorReducer, ReducerPool, SampledAverage, DEFAULT_POOL_SIZE};
use crate::source::{SourceImage, DEFAULT_MAX_DIMENSION};
use crate::swatch::{SwatchCache, SwatchProvider, SwatchResolver, DEFAULT_SWATCH_CACHE_CAPACITY};
use crate::tile::{slice, Tile, TileGrid, DEFAULT_TILE_HEIGHT, DEFAULT_TILE_WIDTH};

use super::compositor::composite;

// =============================================================================
// Configuration
// =============================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicConfig {
    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Largest allowed width or height of the working image
    pub max_dimension: u32,

    /// Number of reducer workers per run
    pub pool_size: usize,

    /// Number of decoded swatches kept between runs
    pub swatch_cache_capacity: usize,
}

impl MosaicConfig {
    /// Create a configuration with the defaults:
    /// - 16x16 tiles
    /// - 680 pixel maximum dimension
    /// - 4 reducer workers
    /// - 1024 cached swatches
    pub fn new() -> Self {
        Self {
            tile_width: DEFAULT_TILE_WIDTH,
            tile_height: DEFAULT_TILE_HEIGHT,
            max_dimension: DEFAULT_MAX_DIMENSION,
            pool_size: DEFAULT_POOL_SIZE,
            swatch_cache_capacity: DEFAULT_SWATCH_CACHE_CAPACITY,
        }
    }

    /// Set the tile size.
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Set the maximum working image dimension.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Set the number of reducer workers.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the swatch cache capacity.
    pub fn with_swatch_cache_capacity(mut self, capacity: usize) -> Self {
        self.swatch_cache_capacity = capacity;
        self
    }
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Run State
// =============================================================================

/// Stage of the engine's current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Resizing,
    Slicing,
    Reducing,
    Resolving,
    Compositing,
    Done,
    Failed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Resizing => "resizing",
            EngineState::Slicing => "slicing",
            EngineState::Reducing => "reducing",
            EngineState::Resolving => "resolving",
            EngineState::Compositing => "compositing",
            EngineState::Done => "done",
            EngineState::Failed => "failed",
        }
    }

    /// True while a run is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            EngineState::Idle | EngineState::Done | EngineState::Failed
        )
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Cancels a run started with [`MosaicEngine::generate_with_cancel`].
///
/// Clones share the same flag. Cancelling is sticky.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Result
// =============================================================================

/// A finished mosaic.
#[derive(Debug, Clone)]
pub struct MosaicResult {
    /// Composite at the working image size
    pub image: RgbaImage,

    /// Tile grid the composite was built from
    pub grid: TileGrid,

    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl MosaicResult {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of tiles drawn.
    pub fn tile_count(&self) -> usize {
        self.grid.len()
    }

    /// Encode the composite as PNG.
    pub fn encode_png(&self) -> Result<Bytes, MosaicError> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| MosaicError::Encode {
                message: e.to_string(),
            })?;
        Ok(Bytes::from(buf.into_inner()))
    }

    /// Write the composite to a file, choosing the format from the extension.
    ///
    /// JPEG has no alpha channel, so transparent edge strips become black.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MosaicError> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path).map_err(|e| MosaicError::Encode {
            message: format!("{}: {}", path.display(), e),
        })?;

        let saved = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgba8(self.image.clone())
                .to_rgb8()
                .save_with_format(path, format),
            _ => self.image.save_with_format(path, format),
        };

        saved.map_err(|e| match e {
            ImageError::IoError(io) => MosaicError::Io {
                message: format!("{}: {}", path.display(), io),
            },
            other => MosaicError::Encode {
                message: other.to_string(),
            },
        })
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Progress reported by a tile's pipeline task.
enum TileEvent {
    Reduced {
        index: usize,
        color_hex: String,
    },
    Resolved {
        index: usize,
        swatch: Arc<image::RgbaImage>,
    },
    Failed(MosaicError),
}

/// Photomosaic generator.
///
/// One engine runs one generation at a time; a second concurrent call to
/// [`generate`](Self::generate) is rejected with [`MosaicError::Busy`]. The
/// swatch cache is kept across runs.
///
/// # Example
///
/// ```ignore
/// use photo_mosaic::{HttpSwatchProvider, MosaicConfig, MosaicEngine, SourceImage};
///
/// let provider = HttpSwatchProvider::new("http://localhost:8765")?;
/// let engine = MosaicEngine::new(provider, MosaicConfig::default());
///
/// let result = engine.generate(SourceImage::open("photo.jpg")?).await?;
/// result.save("mosaic.png")?;
/// ```
pub struct MosaicEngine<P: SwatchProvider + 'static> {
    config: MosaicConfig,
    reducer: Arc<dyn ColorReducer>,
    resolver: Arc<SwatchResolver<P>>,
    state: watch::Sender<EngineState>,
    run_lock: Mutex<()>,
}

impl<P: SwatchProvider + 'static> MosaicEngine<P> {
    /// Create an engine using the sampled-average reducer.
    pub fn new(provider: P, config: MosaicConfig) -> Self {
        let cache = SwatchCache::with_capacity(config.swatch_cache_capacity);
        let resolver =
            SwatchResolver::with_cache(provider, config.tile_width, config.tile_height, cache);
        let (state, _) = watch::channel(EngineState::Idle);

        Self {
            config,
            reducer: Arc::new(SampledAverage::default()),
            resolver: Arc::new(resolver),
            state,
            run_lock: Mutex::new(()),
        }
    }

    /// Replace the color reducer run by the workers.
    pub fn with_reducer(mut self, reducer: Arc<dyn ColorReducer>) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    /// The swatch resolver shared by all runs.
    pub fn resolver(&self) -> &SwatchResolver<P> {
        &self.resolver
    }

    /// Current run state.
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Watch run state changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Generate a mosaic from `image`.
    pub async fn generate(&self, image: SourceImage) -> Result<MosaicResult, MosaicError> {
        self.generate_with_cancel(image, &CancelToken::new()).await
    }

    /// Generate a mosaic, giving up with [`MosaicError::Cancelled`] once
    /// `cancel` fires.
    ///
    /// Cancellation is observed while tiles are in flight and right before
    /// compositing.
    pub async fn generate_with_cancel(
        &self,
        image: SourceImage,
        cancel: &CancelToken,
    ) -> Result<MosaicResult, MosaicError> {
        let _run = self.run_lock.try_lock().map_err(|_| MosaicError::Busy)?;

        let started = Instant::now();
        info!(
            width = image.width(),
            height = image.height(),
            tile_width = self.config.tile_width,
            tile_height = self.config.tile_height,
            "Starting mosaic generation"
        );

        match self.run(image, cancel, started).await {
            Ok(result) => {
                self.set_state(EngineState::Done);
                info!(
                    tiles = result.tile_count(),
                    columns = result.grid.columns,
                    rows = result.grid.rows,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "Mosaic generated"
                );
                Ok(result)
            }
            Err(e) => {
                self.set_state(EngineState::Failed);
                warn!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Mosaic generation failed"
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        image: SourceImage,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<MosaicResult, MosaicError> {
        let (tile_width, tile_height) = (self.config.tile_width, self.config.tile_height);

        self.set_state(EngineState::Resizing);
        let image = image.fit_within(self.config.max_dimension);
        let (width, height) = image.dimensions();

        self.set_state(EngineState::Slicing);
        let grid = TileGrid::for_image(&image, tile_width, tile_height);
        let mut tiles = slice(&image, tile_width, tile_height);
        drop(image);

        debug!(
            width,
            height,
            tiles = tiles.len(),
            columns = grid.columns,
            rows = grid.rows,
            "Sliced working image"
        );

        if !tiles.is_empty() {
            self.set_state(EngineState::Reducing);

            let pool = ReducerPool::spawn(self.config.pool_size, Arc::clone(&self.reducer))
                .map_err(|source| MosaicError::Pool { source })?;

            let outcome = self.process_tiles(&pool, &mut tiles, cancel).await;

            if outcome.is_ok() {
                pool.shutdown().await;
            } else {
                // Let the workers drain issued jobs without holding up the error
                tokio::spawn(pool.shutdown());
            }
            outcome?;
        }

        if cancel.is_cancelled() {
            return Err(MosaicError::Cancelled);
        }

        self.set_state(EngineState::Compositing);
        let image = composite(&tiles, width, height)?;

        Ok(MosaicResult {
            image,
            grid,
            elapsed: started.elapsed(),
        })
    }

    /// Push every tile through reduce → resolve and record the results.
    async fn process_tiles(
        &self,
        pool: &ReducerPool,
        tiles: &mut [Tile],
        cancel: &CancelToken,
    ) -> Result<(), MosaicError> {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        for tile in tiles.iter_mut() {
            let index = tile.index;
            let pixels = tile.take_pixels().unwrap_or_default();

            let job = pool
                .submit(index, pixels)
                .await
                .map_err(|source| MosaicError::Reduction { index, source })?;

            let resolver = Arc::clone(&self.resolver);
            let events_tx = events_tx.clone();

            tasks.spawn(async move {
                let reduced = match job.wait().await {
                    Ok(reduced) => reduced,
                    Err(source) => {
                        let _ = events_tx.send(TileEvent::Failed(MosaicError::Reduction {
                            index,
                            source,
                        }));
                        return;
                    }
                };

                let color_hex = reduced.hex;
                if events_tx
                    .send(TileEvent::Reduced {
                        index,
                        color_hex: color_hex.clone(),
                    })
                    .is_err()
                {
                    // Run already over
                    return;
                }

                let event = match resolver.resolve(&color_hex).await {
                    Ok(swatch) => TileEvent::Resolved { index, swatch },
                    Err(source) => TileEvent::Failed(MosaicError::SwatchLoad { index, source }),
                };
                let _ = events_tx.send(event);
            });
        }
        drop(events_tx);

        let outcome = collect_events(&mut events, tiles, cancel, || {
            self.set_state(EngineState::Resolving)
        })
        .await;

        if outcome.is_err() {
            // Issued work runs to completion; its results are discarded
            tasks.detach_all();
        }
        outcome
    }

    fn set_state(&self, state: EngineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            trace!(from = %previous, to = %state, "Engine state changed");
        }
    }
}

/// Apply tile events until every tile has its swatch.
async fn collect_events(
    events: &mut mpsc::UnboundedReceiver<TileEvent>,
    tiles: &mut [Tile],
    cancel: &CancelToken,
    on_all_reduced: impl FnOnce(),
) -> Result<(), MosaicError> {
    let total = tiles.len();
    let mut reduced = 0;
    let mut resolved = 0;
    let mut on_all_reduced = Some(on_all_reduced);

    while resolved < total {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MosaicError::Cancelled),
            event = events.recv() => event,
        };

        match event {
            Some(TileEvent::Reduced { index, color_hex }) => {
                trace!(index, color = %color_hex, "Tile reduced");
                tile_at(tiles, index)?.set_color(color_hex)?;
                reduced += 1;
                if reduced == total {
                    if let Some(notify) = on_all_reduced.take() {
                        notify();
                    }
                }
            }
            Some(TileEvent::Resolved { index, swatch }) => {
                tile_at(tiles, index)?.set_swatch(swatch)?;
                resolved += 1;
            }
            Some(TileEvent::Failed(e)) => return Err(e),
            None => {
                // Every task is gone but some tile never resolved
                let index = tiles
                    .iter()
                    .find(|tile| tile.swatch().is_none())
                    .map(|tile| tile.index)
                    .unwrap_or(resolved);
                return Err(MosaicError::UnresolvedTile { index });
            }
        }
    }

    Ok(())
}

/// Tiles are stored in index order.
fn tile_at(tiles: &mut [Tile], index: usize) -> Result<&mut Tile, MosaicError> {
    tiles
        .get_mut(index)
        .filter(|tile| tile.index == index)
        .ok_or(MosaicError::UnresolvedTile { index })
}

// =============================================================================
// Tests
// =============================================================================
