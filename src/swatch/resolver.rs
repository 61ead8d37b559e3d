//! Swatch resolver.
//!
//! Maps a tile's reduced color to a loaded swatch image. The resolver:
//! - Validates the color and builds the 6-digit lookup key
//! - Serves repeated colors from the [`SwatchCache`]
//! - Shares one in-flight load between concurrent requests for the same color
//!
//! A failed load is handed to every waiter for that color and is not cached,
//! so a later request retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, trace};

use crate::error::{MosaicError, SwatchError};
use crate::reduce::hex_digits;
use crate::tile::Tile;

use super::cache::{SwatchCache, SwatchKey};
use super::SwatchProvider;

type SwatchResult = Result<Arc<RgbaImage>, SwatchError>;

/// Resolves colors to swatches through a [`SwatchProvider`].
pub struct SwatchResolver<P: SwatchProvider> {
    /// Where swatches come from
    provider: P,

    /// Decoded swatches by color and size
    cache: SwatchCache,

    /// Loads currently in progress, one per key
    in_flight: Mutex<HashMap<SwatchKey, Arc<OnceCell<SwatchResult>>>>,

    /// Swatch size requested from the provider
    width: u32,
    height: u32,

    /// Number of provider loads issued
    loads: AtomicUsize,
}

impl<P: SwatchProvider> SwatchResolver<P> {
    /// Create a resolver requesting `width` x `height` swatches.
    pub fn new(provider: P, width: u32, height: u32) -> Self {
        Self::with_cache(provider, width, height, SwatchCache::new())
    }

    /// Create a resolver with a custom cache.
    pub fn with_cache(provider: P, width: u32, height: u32, cache: SwatchCache) -> Self {
        Self {
            provider,
            cache,
            in_flight: Mutex::new(HashMap::new()),
            width,
            height,
            loads: AtomicUsize::new(0),
        }
    }

    /// Resolve a `#rrggbb` (or bare `rrggbb`) color to its swatch.
    ///
    /// Resolves only once the swatch has fully loaded.
    pub async fn resolve(&self, color_hex: &str) -> Result<Arc<RgbaImage>, SwatchError> {
        let color = hex_digits(color_hex).ok_or_else(|| SwatchError::InvalidColor {
            color: color_hex.to_string(),
        })?;
        let key = SwatchKey::new(color, self.width, self.height);

        // Fast path: cached
        if let Some(swatch) = self.cache.get(&key).await {
            trace!(color = %key.color, "Swatch cache hit");
            return Ok(swatch);
        }

        // Slow path: join or start the load for this key
        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell.get_or_init(|| self.load(&key)).await.clone();

        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                in_flight.remove(&key);
            }
        }

        result
    }

    /// Resolve a tile's swatch from its reduced color and store it on the tile.
    ///
    /// Standalone entry point for callers that own their tiles. The engine
    /// does not use it: its per-tile tasks call [`resolve`](Self::resolve)
    /// by color and the coordinator stores the swatch, so only one task ever
    /// mutates the tile list.
    pub async fn resolve_tile(&self, tile: &mut Tile) -> Result<(), MosaicError> {
        let color_hex = tile
            .color_hex()
            .ok_or_else(|| MosaicError::SwatchLoad {
                index: tile.index,
                source: SwatchError::InvalidColor {
                    color: String::new(),
                },
            })?
            .to_string();

        let swatch = self
            .resolve(&color_hex)
            .await
            .map_err(|source| MosaicError::SwatchLoad {
                index: tile.index,
                source,
            })?;

        tile.set_swatch(swatch)
    }

    async fn load(&self, key: &SwatchKey) -> SwatchResult {
        // A load that finished just before this cell was created has already
        // filled the cache
        if let Some(swatch) = self.cache.get(key).await {
            return Ok(swatch);
        }

        self.loads.fetch_add(1, Ordering::Relaxed);
        debug!(
            color = %key.color,
            provider = self.provider.identifier(),
            "Loading swatch"
        );

        let swatch = Arc::new(
            self.provider
                .load(&key.color, key.width, key.height)
                .await?,
        );
        self.cache.put(key.clone(), Arc::clone(&swatch)).await;
        Ok(swatch)
    }

    /// Number of loads issued to the provider so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// `(cached_entries, capacity)` of the swatch cache.
    pub async fn cache_stats(&self) -> (usize, usize) {
        (self.cache.len().await, self.cache.capacity())
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

// =============================================================================
// Tests
// =============================================================================
