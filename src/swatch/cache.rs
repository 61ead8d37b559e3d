//! Swatch cache for decoded swatch images.
//!
//! Mosaics of real photos reuse a small palette heavily, so the same swatch
//! is requested many times per run. This LRU cache keeps decoded swatches
//! keyed by color and requested size.

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;
use tokio::sync::RwLock;

/// Default number of cached swatches.
pub const DEFAULT_SWATCH_CACHE_CAPACITY: usize = 1024;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for a swatch: color plus requested size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwatchKey {
    /// 6 lowercase hex digits
    pub color: Arc<str>,

    /// Requested width in pixels
    pub width: u32,

    /// Requested height in pixels
    pub height: u32,
}

impl SwatchKey {
    pub fn new(color: impl Into<Arc<str>>, width: u32, height: u32) -> Self {
        Self {
            color: color.into(),
            width,
            height,
        }
    }
}

// =============================================================================
// Swatch Cache
// =============================================================================

/// LRU cache of decoded swatches, bounded by entry count.
///
/// # Thread Safety
///
/// The cache is safe to share across async tasks.
pub struct SwatchCache {
    cache: RwLock<LruCache<SwatchKey, Arc<RgbaImage>>>,
    capacity: usize,
}

impl SwatchCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SWATCH_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` swatches (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            capacity: capacity.get(),
        }
    }

    /// Get a swatch, marking it recently used.
    pub async fn get(&self, key: &SwatchKey) -> Option<Arc<RgbaImage>> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check for a swatch without touching LRU order.
    pub async fn contains(&self, key: &SwatchKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a swatch, evicting the least recently used one if full.
    pub async fn put(&self, key: SwatchKey, swatch: Arc<RgbaImage>) {
        let mut cache = self.cache.write().await;
        cache.put(key, swatch);
    }

    /// Remove all entries.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Number of cached swatches.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Maximum number of cached swatches.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SwatchCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
