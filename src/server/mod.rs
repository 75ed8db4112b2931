//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   POST /grids/area/{id}/generate    GET /grids/mvt/{p}/{z}/..   │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error → JSON) │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                  │                    │
//!          ▼                  ▼                    ▼
//!   GridGenerator        CellService          TileService
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    area_by_zoom_handler, area_cells_handler, area_resolutions_handler, generate_area_handler,
    generate_project_handler, health_handler, intersecting_cells_handler,
    project_by_zoom_handler, project_cells_handler, project_resolutions_handler,
    resolution_info_handler, tile_handler, AppState, AreaFilterQuery, CellsQueryParams,
    ErrorResponse, GenerateQueryParams, HealthResponse, ResolutionInfoResponse, TilePathParams,
    ZoomQueryParams, DEFAULT_ZOOM,
};
pub use routes::{create_router, RouterConfig};
