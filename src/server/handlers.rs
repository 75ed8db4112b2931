//! HTTP request handlers for the grid API.
//!
//! # Endpoints
//!
//! - `POST /grids/area/{area_id}/generate` - Generate an area grid (NDJSON stream)
//! - `POST /grids/{project_id}/generate-all` - Generate the legacy project grid
//! - `GET /grids/...` - GeoJSON cell queries
//! - `GET /grids/mvt/{project_id}/{z}/{x}/{y}.pbf` - Vector tiles
//! - `GET /health` - Health check endpoint

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cells::{CellCollection, CellService, IntersectingCells, ResolutionSummary, ZoomCollection};
use crate::error::{GridError, StoreError};
use crate::generate::{
    GeneratorConfig, GridGenerator, ProgressStream, DEFAULT_MAX_CELL_AREA_KM2,
    DEFAULT_MIN_CELL_AREA_KM2, DEFAULT_NUM_RESOLUTIONS,
};
use crate::grid::{RESOLUTION_AREAS_KM2, ZOOM_RESOLUTIONS};
use crate::store::{CellFilter, GridStore};
use crate::tile::{TileCache, TileCoord, TileRequest, TileService};

/// Zoom used by the by-zoom endpoints when none is given.
pub const DEFAULT_ZOOM: u8 = 10;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// All services share one datastore handle and one tile cache, which
/// generation runs clear.
pub struct AppState<S: GridStore> {
    pub generator: Arc<GridGenerator<S>>,
    pub cells: Arc<CellService<S>>,
    pub tiles: Arc<TileService<S>>,

    /// Cache-Control max-age for vector tiles, in seconds
    pub cache_max_age: u32,
}

impl<S: GridStore> AppState<S> {
    /// Create state with a default tile cache and generator settings.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_parts(store, GeneratorConfig::default(), Arc::new(TileCache::new()))
    }

    /// Create state from explicit generator settings and tile cache.
    pub fn with_parts(store: Arc<S>, config: GeneratorConfig, tile_cache: Arc<TileCache>) -> Self {
        let generator =
            GridGenerator::new(Arc::clone(&store), config).with_tile_cache(Arc::clone(&tile_cache));
        Self {
            generator: Arc::new(generator),
            cells: Arc::new(CellService::new(Arc::clone(&store))),
            tiles: Arc::new(TileService::with_shared_cache(store, tile_cache)),
            cache_max_age: 3600,
        }
    }

    /// Set the tile Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }
}

impl<S: GridStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            cells: Arc::clone(&self.cells),
            tiles: Arc::clone(&self.tiles),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/grids/mvt/{project_id}/{z}/{x}/{filename}`
/// where filename is `{y}` or `{y}.pbf`
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    pub project_id: Uuid,
    pub z: u8,
    pub x: u32,

    /// Tile Y coordinate with optional .pbf extension (e.g., "0" or "0.pbf")
    pub filename: String,
}

impl TilePathParams {
    /// Parse the Y coordinate from the filename, stripping any .pbf extension.
    pub fn y(&self) -> Result<u32, std::num::ParseIntError> {
        let y_str = self.filename.strip_suffix(".pbf").unwrap_or(&self.filename);
        y_str.parse()
    }
}

/// Optional area narrowing on project routes.
#[derive(Debug, Default, Deserialize)]
pub struct AreaFilterQuery {
    #[serde(default)]
    pub area_id: Option<Uuid>,
}

/// Query parameters for cell collections.
#[derive(Debug, Default, Deserialize)]
pub struct CellsQueryParams {
    #[serde(default)]
    pub resolution: Option<u8>,

    #[serde(default)]
    pub area_id: Option<Uuid>,
}

/// Query parameters for the by-zoom endpoints.
#[derive(Debug, Deserialize)]
pub struct ZoomQueryParams {
    #[serde(default = "default_zoom")]
    pub zoom: u8,

    #[serde(default)]
    pub area_id: Option<Uuid>,
}

fn default_zoom() -> u8 {
    DEFAULT_ZOOM
}

/// Query parameters for legacy project generation.
#[derive(Debug, Deserialize)]
pub struct GenerateQueryParams {
    #[serde(default = "default_min_area")]
    pub min_cell_area_km2: f64,

    #[serde(default = "default_max_area")]
    pub max_cell_area_km2: f64,

    #[serde(default = "default_num_resolutions")]
    pub num_resolutions: i64,
}

fn default_min_area() -> f64 {
    DEFAULT_MIN_CELL_AREA_KM2
}

fn default_max_area() -> f64 {
    DEFAULT_MAX_CELL_AREA_KM2
}

fn default_num_resolutions() -> i64 {
    DEFAULT_NUM_RESOLUTIONS
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_configuration")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Static resolution reference table.
#[derive(Debug, Serialize)]
pub struct ResolutionInfoResponse {
    /// Approximate hexagon area per resolution
    pub resolution_areas_km2: BTreeMap<u8, f64>,

    /// Suggested resolution per map zoom
    pub zoom_resolutions: BTreeMap<u8, u8>,

    pub description: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build a JSON error response, logging by severity:
/// - 5xx at ERROR level
/// - 404 at DEBUG level (common and expected)
/// - other 4xx at WARN level
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let error_response = ErrorResponse::with_status(error_type, message, status);
    (status, Json(error_response)).into_response()
}

/// Convert GridError to HTTP response.
///
/// [`GridError::NoDataAvailable`] becomes an empty `204 No Content`.
impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            GridError::NoDataAvailable => return StatusCode::NO_CONTENT.into_response(),

            // 400 Bad Request
            GridError::InvalidConfiguration { reason } => (
                StatusCode::BAD_REQUEST,
                "invalid_configuration",
                format!("Invalid configuration: {}", reason),
            ),
            GridError::InvalidTile { z, x, y } => (
                StatusCode::BAD_REQUEST,
                "invalid_tile",
                format!(
                    "Tile {}/{}/{} is outside the tile pyramid (x and y must be below {})",
                    z,
                    x,
                    y,
                    1u64 << (*z).min(63)
                ),
            ),

            // 404 Not Found
            GridError::TargetNotFound { target } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", target),
            ),

            // 409 Conflict
            GridError::GenerationInProgress { target } => (
                StatusCode::CONFLICT,
                "generation_in_progress",
                format!("Grid generation already running for {}", target),
            ),

            // 422 Unprocessable Entity
            GridError::Geometry(geometry_err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_geometry",
                geometry_err.to_string(),
            ),

            // 5xx - datastore failures
            GridError::Datastore(store_err) => match store_err {
                StoreError::Connection(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "connection_error",
                    format!("Datastore connection error: {}", msg),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "datastore_error",
                    format!("Datastore error: {}", store_err),
                ),
            },
        };

        error_response(status, error_type, message)
    }
}

// =============================================================================
// Generation Handlers
// =============================================================================

/// Stream progress events as newline-delimited JSON.
fn ndjson_response(stream: ProgressStream) -> Response {
    let lines = futures::stream::unfold(stream, |mut stream| async move {
        let event = stream.recv().await?;
        Some((Ok::<_, Infallible>(event.to_ndjson()), stream))
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

/// Generate the grid of one area.
///
/// # Endpoint
///
/// `POST /grids/area/{area_id}/generate`
///
/// # Response
///
/// - `200 OK`: `application/x-ndjson` stream of progress events, ending with
///   one `success` or `error` event
/// - `404 Not Found`: Area missing or without boundary
/// - `400 Bad Request`: Stored grid configuration rejected by the planner
/// - `409 Conflict`: The area is already being generated
pub async fn generate_area_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(area_id): Path<Uuid>,
) -> Result<Response, GridError> {
    info!(area_id = %area_id, "Area grid generation requested");
    let stream = state.generator.generate_for_area(area_id).await?;
    Ok(ndjson_response(stream))
}

/// Generate the legacy project-level grid.
///
/// # Endpoint
///
/// `POST /grids/{project_id}/generate-all`
///
/// # Query Parameters
///
/// - `min_cell_area_km2`: Smallest cell area (default: 0.0003)
/// - `max_cell_area_km2`: Largest cell area (default: 5.0)
/// - `num_resolutions`: Number of resolutions (default: 8)
///
/// # Response
///
/// Same as [`generate_area_handler`], over the project boundary. Cells of the
/// project's areas are left untouched.
pub async fn generate_project_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<GenerateQueryParams>,
) -> Result<Response, GridError> {
    info!(project_id = %project_id, "Project grid generation requested");
    let stream = state
        .generator
        .generate_for_project(
            project_id,
            query.min_cell_area_km2,
            query.max_cell_area_km2,
            query.num_resolutions,
        )
        .await?;
    Ok(ndjson_response(stream))
}

// =============================================================================
// Cell Handlers
// =============================================================================

/// Cells of one area as a FeatureCollection.
///
/// `GET /grids/area/{area_id}?resolution=`
pub async fn area_cells_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(area_id): Path<Uuid>,
    Query(query): Query<CellsQueryParams>,
) -> Result<Json<CellCollection>, GridError> {
    let collection = state
        .cells
        .collection(&CellFilter::Area(area_id), query.resolution)
        .await?;
    Ok(Json(collection.with_area(area_id)))
}

/// Cells of one area at the resolution suited to a zoom.
///
/// `GET /grids/area/{area_id}/by-zoom?zoom=`
pub async fn area_by_zoom_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(area_id): Path<Uuid>,
    Query(query): Query<ZoomQueryParams>,
) -> Result<Json<ZoomCollection>, GridError> {
    let collection = state
        .cells
        .by_zoom(&CellFilter::Area(area_id), query.zoom)
        .await?;
    Ok(Json(collection))
}

/// Stored resolutions of one area.
///
/// `GET /grids/area/{area_id}/resolutions`
pub async fn area_resolutions_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(area_id): Path<Uuid>,
) -> Result<Json<Vec<ResolutionSummary>>, GridError> {
    let summaries = state
        .cells
        .resolution_summaries(&CellFilter::Area(area_id))
        .await?;
    Ok(Json(summaries))
}

/// Cells of a project as a FeatureCollection.
///
/// `GET /grids/{project_id}?resolution=&area_id=`
///
/// Without `area_id` every cell of the project is returned, area cells
/// included.
pub async fn project_cells_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<CellsQueryParams>,
) -> Result<Json<CellCollection>, GridError> {
    let filter = CellFilter::project(project_id, query.area_id);
    let collection = state.cells.collection(&filter, query.resolution).await?;
    Ok(Json(collection))
}

/// Cells of a project at the resolution suited to a zoom.
///
/// `GET /grids/{project_id}/by-zoom?zoom=&area_id=`
pub async fn project_by_zoom_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ZoomQueryParams>,
) -> Result<Json<ZoomCollection>, GridError> {
    let filter = CellFilter::project(project_id, query.area_id);
    Ok(Json(state.cells.by_zoom(&filter, query.zoom).await?))
}

/// Stored resolutions of a project.
///
/// `GET /grids/{project_id}/resolutions?area_id=`
pub async fn project_resolutions_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<AreaFilterQuery>,
) -> Result<Json<Vec<ResolutionSummary>>, GridError> {
    let filter = CellFilter::project(project_id, query.area_id);
    Ok(Json(state.cells.resolution_summaries(&filter).await?))
}

/// Finest stored cells intersecting a selection of cells.
///
/// # Endpoint
///
/// `POST /grids/{project_id}/intersecting-cells?area_id=`
///
/// # Request Body
///
/// JSON array of H3 indices: `["872a1072bffffff", ...]`
///
/// # Response
///
/// `200 OK` with `{cells, resolution, count, geometries}`; `count` and
/// `geometries` are omitted when nothing matched. `422` for an invalid index.
pub async fn intersecting_cells_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<AreaFilterQuery>,
    Json(selected): Json<Vec<String>>,
) -> Result<Json<IntersectingCells>, GridError> {
    let filter = CellFilter::project(project_id, query.area_id);
    Ok(Json(state.cells.intersecting(&filter, &selected).await?))
}

// =============================================================================
// Tile Handler
// =============================================================================

/// Handle vector tile requests.
///
/// # Endpoint
///
/// `GET /grids/mvt/{project_id}/{z}/{x}/{y}.pbf`
///
/// # Query Parameters
///
/// - `area_id`: Restrict the tile to one area's cells
///
/// # Response
///
/// - `200 OK`: Mapbox vector tile, layer `h3-layer`
/// - `204 No Content`: No cells in the tile, or no cells at all
/// - `400 Bad Request`: Tile address outside the pyramid
///
/// # Headers
///
/// - `Content-Type: application/x-protobuf`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: true|false`
pub async fn tile_handler<S: GridStore>(
    State(state): State<AppState<S>>,
    Path(params): Path<TilePathParams>,
    Query(query): Query<AreaFilterQuery>,
) -> Result<Response, GridError> {
    let Ok(y) = params.y() else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_tile",
            format!("Invalid tile row: {}", params.filename),
        ));
    };

    let tile = TileCoord::new(params.z, params.x, y)?;
    let request = TileRequest::new(params.project_id, query.area_id, tile);
    let response = state.tiles.get_tile(request).await?;

    let cache_hit = response.cache_hit.to_string();
    let Some(data) = response.data else {
        return Ok((
            StatusCode::NO_CONTENT,
            [("X-Tile-Cache-Hit", cache_hit)],
        )
            .into_response());
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE.as_str(), "application/x-protobuf".to_string()),
            (
                header::CACHE_CONTROL.as_str(),
                format!("public, max-age={}", state.cache_max_age),
            ),
            ("X-Tile-Cache-Hit", cache_hit),
        ],
        Body::from(data),
    )
        .into_response())
}

// =============================================================================
// Static Handlers
// =============================================================================

/// Handle health check requests.
///
/// `GET /health` → `{"status": "healthy", "version": "0.1.0"}`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Resolution reference table.
///
/// `GET /grids/resolution-info`
pub async fn resolution_info_handler() -> Json<ResolutionInfoResponse> {
    Json(ResolutionInfoResponse {
        resolution_areas_km2: RESOLUTION_AREAS_KM2
            .iter()
            .enumerate()
            .map(|(resolution, area)| (resolution as u8, *area))
            .collect(),
        zoom_resolutions: ZOOM_RESOLUTIONS.iter().copied().collect(),
        description: "Area in square kilometers for each H3 resolution level".to_string(),
    })
}
