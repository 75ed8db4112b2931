//! Tile Service for serving grid cells as vector tiles.
//!
//! The TileService is the entry point for tile requests. It orchestrates:
//! - Cache lookups
//! - Zoom-adaptive resolution selection
//! - Tile rendering via the datastore
//! - Result caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                             │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Check cache          3. Pick nearest resolution     │    │
//! │  │  2. List resolutions     4. Render, cache & return      │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                              │                      │
//! │           ▼                              ▼                      │
//! │    ┌───────────┐                 ┌──────────────┐               │
//! │    │ TileCache │                 │  GridStore   │               │
//! │    └───────────┘                 └──────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::error::GridError;
use crate::grid::{select, ServingProfile};
use crate::store::{CellFilter, GridStore};

use super::bounds::TileCoord;
use super::cache::{TileCache, TileCacheKey};

// =============================================================================
// Tile Request
// =============================================================================

/// A request for one vector tile of a project's grid.
#[derive(Debug, Clone, Copy)]
pub struct TileRequest {
    pub project_id: Uuid,

    /// Restrict the tile to one area's cells
    pub area_id: Option<Uuid>,

    pub tile: TileCoord,
}

impl TileRequest {
    pub fn new(project_id: Uuid, area_id: Option<Uuid>, tile: TileCoord) -> Self {
        Self {
            project_id,
            area_id,
            tile,
        }
    }

    fn filter(&self) -> CellFilter {
        CellFilter::project(self.project_id, self.area_id)
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// Encoded tile, `None` when the tile has no features
    pub data: Option<Bytes>,

    /// Whether this tile was served from cache
    pub cache_hit: bool,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Service for rendering and caching grid tiles.
///
/// # Type Parameters
///
/// * `S` - The datastore holding the cells
pub struct TileService<S: GridStore> {
    store: Arc<S>,

    /// Shared with generation runs, which clear it
    cache: Arc<TileCache>,
}

impl<S: GridStore> TileService<S> {
    /// Create a tile service with a default-sized cache.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_shared_cache(store, Arc::new(TileCache::new()))
    }

    /// Create a tile service over an existing cache.
    pub fn with_shared_cache(store: Arc<S>, cache: Arc<TileCache>) -> Self {
        Self { store, cache }
    }

    /// Get a tile, using the cache when available.
    ///
    /// The tile shows the stored resolution nearest to the zoom's target.
    /// A project (or area) without cells yields an empty response, as does a
    /// tile no cell overlaps.
    ///
    /// # Errors
    ///
    /// [`GridError::Datastore`] when listing resolutions or rendering fails.
    pub async fn get_tile(&self, request: TileRequest) -> Result<TileResponse, GridError> {
        let key = TileCacheKey::new(request.project_id, request.area_id, request.tile);

        if let Some(cached) = self.cache.get(&key).await {
            return Ok(TileResponse {
                data: (!cached.is_empty()).then_some(cached),
                cache_hit: true,
            });
        }

        let data = self.render_tile(&request).await?;
        self.cache.put(key, data.clone().unwrap_or_default()).await;

        Ok(TileResponse {
            data,
            cache_hit: false,
        })
    }

    /// Render a tile without touching the cache.
    pub async fn render_tile(&self, request: &TileRequest) -> Result<Option<Bytes>, GridError> {
        let filter = request.filter();
        let available: Vec<u8> = self
            .store
            .resolutions(&filter)
            .await?
            .iter()
            .map(|r| r.resolution)
            .collect();

        let resolution = match select(&available, request.tile.z, ServingProfile::VectorTile) {
            Ok(resolution) => resolution,
            Err(GridError::NoDataAvailable) => return Ok(None),
            Err(e) => return Err(e),
        };

        let TileCoord { z, x, y } = request.tile;
        debug!(z, x, y, resolution, "Rendering grid tile");

        let data = self
            .store
            .render_tile(&filter, resolution, &request.tile.bounds())
            .await?;
        Ok(data)
    }

    /// Get tile cache statistics.
    ///
    /// Returns `(current_size, capacity, entry_count)`.
    pub async fn cache_stats(&self) -> (usize, usize, usize) {
        let size = self.cache.size().await;
        let capacity = self.cache.capacity();
        let count = self.cache.len().await;
        (size, capacity, count)
    }

    /// Clear the tile cache.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// The cache this service fills.
    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }
}
