//! Tile cache for encoded vector tiles.
//!
//! Rendering a tile means a spatial query plus protobuf encoding, so finished
//! tiles are kept in an LRU cache bounded by total byte size.
//!
//! # Cache Key
//!
//! Tiles are cached by a composite key including:
//! - Project identifier
//! - Area filter (if any)
//! - Tile Z/X/Y address
//!
//! Empty tiles are cached too, as zero-length entries, so repeated requests
//! over uncovered map regions skip the datastore.
//!
//! Generation runs clear the whole cache; tiles of other projects are
//! rebuilt on demand.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::bounds::TileCoord;

/// Default cache capacity: 64MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for encoded tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    pub project_id: Uuid,
    pub area_id: Option<Uuid>,
    pub tile: TileCoord,
}

impl TileCacheKey {
    pub fn new(project_id: Uuid, area_id: Option<Uuid>, tile: TileCoord) -> Self {
        Self {
            project_id,
            area_id,
            tile,
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// LRU cache for encoded tiles with size-based capacity.
///
/// Shared across handlers and generation runs via `Arc`.
pub struct TileCache {
    cache: RwLock<LruCache<TileCacheKey, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl TileCache {
    /// Create a new tile cache with default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a new tile cache with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new tile cache with specified capacity and maximum entries.
    ///
    /// A zero entry limit is raised to one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a tile, marking it as recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check if a tile is cached without updating LRU order.
    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a tile, evicting least-recently-used entries past capacity.
    pub async fn put(&self, key: TileCacheKey, data: Bytes) {
        let data_size = data.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old_data) = cache.peek(&key) {
            *current_size = current_size.saturating_sub(old_data.len());
        }

        // The entry-count bound may push out an entry on its own
        if let Some((evicted_key, evicted_data)) = cache.push(key, data) {
            if evicted_key != key {
                *current_size = current_size.saturating_sub(evicted_data.len());
            }
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            if let Some((_, evicted_data)) = cache.pop_lru() {
                *current_size = current_size.saturating_sub(evicted_data.len());
            } else {
                break;
            }
        }
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    /// Number of cached tiles.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        let current_size = self.current_size.read().await;
        *current_size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
