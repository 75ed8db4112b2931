//! # hexgrid-server
//!
//! Tessellates geographic areas into hierarchical hexagonal (H3) grids at
//! several resolutions, persists the cells in a spatial datastore, and serves
//! them back as GeoJSON or Mapbox vector tiles chosen by map zoom.
//!
//! ## Features
//!
//! - **Resolution planning**: a cell-area range becomes an evenly spaced set of resolutions
//! - **Streaming generation**: cells are persisted in committed batches while
//!   progress is streamed as NDJSON
//! - **Zoom-adaptive serving**: the stored resolution nearest to what a zoom calls for
//! - **Vector tiles**: MVT rendering with an LRU tile cache
//!
//! ## Architecture
//!
//! - [`grid`] - resolution tables, planner, tessellator, zoom selector
//! - [`geometry`] - GeoJSON boundaries and Web Mercator math
//! - [`store`] - datastore trait with PostGIS and in-memory implementations
//! - [`generate`] - batched generation pipeline and progress events
//! - [`cells`] - GeoJSON cell queries
//! - [`tile`] - vector tile service, encoder and cache
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hexgrid_server::{create_router, AppState, InMemoryGridStore, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = AppState::new(Arc::new(InMemoryGridStore::new()));
//!     let router = create_router(state, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod cells;
pub mod config;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod grid;
pub mod server;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use cells::{CellCollection, CellService, IntersectingCells, ResolutionSummary, ZoomCollection};
pub use config::{Cli, Command, PlanConfig, ServeConfig};
pub use error::{GeometryError, GridError, StoreError};
pub use generate::{
    EventStatus, GenerationJob, GeneratorConfig, GridGenerator, ProgressEvent, ProgressStream,
};
pub use geometry::BoundaryGeometry;
pub use grid::{
    nearest_resolution_for_area, plan, resolution_area_km2, select, tessellate, ServingProfile,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use store::{
    AreaRecord, CellFilter, CellRecord, GridScope, GridStore, InMemoryGridStore, PostgisGridStore,
    PostgisOptions, ProjectRecord,
};
pub use tile::{tile_bounds, TileBounds, TileCache, TileCoord, TileRequest, TileResponse, TileService};
