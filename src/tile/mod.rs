//! Vector tile layer.
//!
//! This module turns stored grid cells into Mapbox vector tiles for map
//! clients.
//!
//! # Architecture
//!
//! The tile service sits between the HTTP layer and the datastore:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  Zoom selector  │  │
//! │  │  (encoded    │  │  (nearest       │  │
//! │  │   MVT)       │  │   resolution)   │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │      GridStore::render_tile (bbox)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: Main entry point for tile requests
//! - [`TileCache`]: LRU cache for encoded tiles with size-based eviction
//! - [`TileCoord`] / [`tile_bounds`]: XYZ addressing and Web Mercator boxes
//! - [`MvtTileEncoder`]: cell polygons to MVT bytes, used by the in-memory store

mod bounds;
mod cache;
mod encoder;
mod service;

pub use bounds::{tile_bounds, TileBounds, TileCoord, MAX_TILE_ZOOM};
pub use cache::{TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use encoder::{MvtTileEncoder, LAYER_NAME, TILE_BUFFER, TILE_EXTENT};
pub use service::{TileRequest, TileResponse, TileService};
