//! Router configuration for the grid server.
//!
//! # Route Structure
//!
//! ```text
//! /health                                          - Health check
//! /grids/resolution-info                           - Resolution table
//! /grids/area/{area_id}/generate             POST  - Area generation stream
//! /grids/area/{area_id}[/by-zoom|/resolutions]     - Area cells
//! /grids/{project_id}/generate-all           POST  - Legacy generation stream
//! /grids/{project_id}[/by-zoom|/resolutions]       - Project cells
//! /grids/{project_id}/intersecting-cells     POST  - Finest intersecting cells
//! /grids/mvt/{project_id}/{z}/{x}/{y}.pbf          - Vector tiles
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hexgrid_server::{create_router, AppState, InMemoryGridStore, RouterConfig};
//!
//! let state = AppState::new(Arc::new(InMemoryGridStore::new()));
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    area_by_zoom_handler, area_cells_handler, area_resolutions_handler, generate_area_handler,
    generate_project_handler, health_handler, intersecting_cells_handler,
    project_by_zoom_handler, project_cells_handler, project_resolutions_handler,
    resolution_info_handler, tile_handler, AppState,
};
use crate::store::GridStore;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age for tiles, in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tile cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the tile Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// The tile max-age of `config` overrides the one in `state`.
pub fn create_router<S: GridStore>(state: AppState<S>, config: RouterConfig) -> Router {
    let state = state.with_cache_max_age(config.cache_max_age);
    let cors = build_cors_layer(&config);

    // Static segments (`area`, `mvt`, `resolution-info`) take precedence
    // over the `{project_id}` capture
    let grid_routes = Router::new()
        .route("/resolution-info", get(resolution_info_handler))
        .route("/area/{area_id}", get(area_cells_handler::<S>))
        .route("/area/{area_id}/generate", post(generate_area_handler::<S>))
        .route("/area/{area_id}/by-zoom", get(area_by_zoom_handler::<S>))
        .route(
            "/area/{area_id}/resolutions",
            get(area_resolutions_handler::<S>),
        )
        .route(
            "/mvt/{project_id}/{z}/{x}/{filename}",
            get(tile_handler::<S>),
        )
        .route("/{project_id}", get(project_cells_handler::<S>))
        .route(
            "/{project_id}/generate-all",
            post(generate_project_handler::<S>),
        )
        .route("/{project_id}/by-zoom", get(project_by_zoom_handler::<S>))
        .route(
            "/{project_id}/resolutions",
            get(project_resolutions_handler::<S>),
        )
        .route(
            "/{project_id}/intersecting-cells",
            post(intersecting_cells_handler::<S>),
        )
        .with_state(state);

    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/grids", grid_routes)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
