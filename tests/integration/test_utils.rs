//! Test utilities for integration tests.
//!
//! Builds in-memory stores seeded with square boundaries, routers over them,
//! and helpers for reading JSON and NDJSON bodies.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use uuid::Uuid;

use hexgrid_server::generate::{GeneratorConfig, ProgressEvent, MIN_BATCH_SIZE};
use hexgrid_server::geometry::{lnglat_to_mercator, HALF_WORLD, WORLD_EXTENT};
use hexgrid_server::grid::{resolution_from_u8, tessellate};
use hexgrid_server::{
    create_router, AppState, AreaRecord, BoundaryGeometry, InMemoryGridStore, RouterConfig,
    TileCache,
};

// =============================================================================
// Geometry Fixtures
// =============================================================================

/// GeoJSON Polygon of an axis-aligned square, `size` degrees wide.
pub fn square_geojson(lng: f64, lat: f64, size: f64) -> String {
    format!(
        r#"{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}"#,
        x0 = lng,
        y0 = lat,
        x1 = lng + size,
        y1 = lat + size
    )
}

pub fn square_boundary(lng: f64, lat: f64, size: f64) -> BoundaryGeometry {
    BoundaryGeometry::from_geojson_str(&square_geojson(lng, lat, size)).unwrap()
}

/// Roughly 23 km² near Istanbul.
pub fn istanbul_square() -> BoundaryGeometry {
    square_boundary(29.0, 41.0, 0.05)
}

/// Cells the tessellator produces for `boundary` at each resolution.
pub fn cell_counts(boundary: &BoundaryGeometry, resolutions: &[u8]) -> Vec<usize> {
    resolutions
        .iter()
        .map(|&r| tessellate(boundary, resolution_from_u8(r).unwrap()).len())
        .collect()
}

/// XYZ tile containing a point.
pub fn tile_for(z: u8, lng: f64, lat: f64) -> (u32, u32) {
    let (mx, my) = lnglat_to_mercator(lng, lat);
    let tile = WORLD_EXTENT / f64::from(1u32 << z);
    let x = ((mx + HALF_WORLD) / tile).floor() as u32;
    let y = ((HALF_WORLD - my) / tile).floor() as u32;
    (x, y)
}

// =============================================================================
// Test Application
// =============================================================================

/// Router plus handles on the state behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState<InMemoryGridStore>,
    pub store: Arc<InMemoryGridStore>,
}

impl TestApp {
    /// Small batches so modest areas span several commits.
    pub fn new(store: InMemoryGridStore) -> Self {
        let store = Arc::new(store);
        let state = AppState::with_parts(
            Arc::clone(&store),
            GeneratorConfig::new(MIN_BATCH_SIZE, Duration::from_secs(5)),
            Arc::new(TileCache::new()),
        );
        let router = create_router(state.clone(), RouterConfig::new().with_tracing(false));
        Self {
            router,
            state,
            store,
        }
    }

    /// Send one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Run an area generation to completion without going through HTTP.
    pub async fn generate_area(&self, area_id: Uuid) -> Vec<ProgressEvent> {
        self.state
            .generator
            .generate_for_area(area_id)
            .await
            .unwrap()
            .collect_all()
            .await
    }
}

/// A project with one area over `boundary`, configured with the given range.
pub fn store_with_area(
    boundary: BoundaryGeometry,
    min_km2: f64,
    max_km2: f64,
    count: i32,
) -> (InMemoryGridStore, Uuid, Uuid) {
    let project_id = Uuid::new_v4();
    let area_id = Uuid::new_v4();
    let store = InMemoryGridStore::new()
        .with_project(project_id, Some(boundary.clone()))
        .with_area(
            AreaRecord::new(area_id, project_id, boundary).with_grid_config(min_km2, max_km2, count),
        );
    (store, project_id, area_id)
}

// =============================================================================
// Requests and Bodies
// =============================================================================

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// One JSON value per non-empty line.
pub fn parse_ndjson(body: &[u8]) -> Vec<Value> {
    body.split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect()
}
