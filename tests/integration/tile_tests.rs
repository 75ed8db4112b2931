//! Vector tile integration tests.
//!
//! Tests verify:
//! - Tile retrieval, headers and cache behavior
//! - Empty tiles (204)
//! - Tile address validation
//! - Cache invalidation by regeneration

use axum::http::StatusCode;
use uuid::Uuid;

use hexgrid_server::tile::LAYER_NAME;
use hexgrid_server::InMemoryGridStore;

use super::test_utils::{body_bytes, body_json, get, istanbul_square, store_with_area, tile_for, TestApp};

async fn generated_app() -> (TestApp, Uuid, Uuid) {
    let (store, project_id, area_id) = store_with_area(istanbul_square(), 0.105, 0.737, 2);
    let app = TestApp::new(store);
    app.generate_area(area_id).await;
    (app, project_id, area_id)
}

fn tile_uri(project_id: Uuid, z: u8, lng: f64, lat: f64) -> String {
    let (x, y) = tile_for(z, lng, lat);
    format!("/grids/mvt/{}/{}/{}/{}.pbf", project_id, z, x, y)
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let (app, project_id, _) = generated_app().await;

    let response = app.send(get(&tile_uri(project_id, 13, 29.025, 41.025))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-protobuf"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );

    let body = body_bytes(response).await;
    assert!(!body.is_empty());
    assert!(body
        .windows(LAYER_NAME.len())
        .any(|w| w == LAYER_NAME.as_bytes()));
}

#[tokio::test]
async fn test_tile_without_pbf_extension() {
    let (app, project_id, _) = generated_app().await;
    let (x, y) = tile_for(13, 29.025, 41.025);

    let response = app
        .send(get(&format!("/grids/mvt/{}/13/{}/{}", project_id, x, y)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cache_hit_header() {
    let (app, project_id, _) = generated_app().await;
    let uri = tile_uri(project_id, 12, 29.025, 41.025);

    let first = app.send(get(&uri)).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-tile-cache-hit").unwrap(), "false");

    let second = app.send(get(&uri)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-tile-cache-hit").unwrap(), "true");
}

#[tokio::test]
async fn test_area_filtered_tile() {
    let (app, project_id, area_id) = generated_app().await;
    let uri = tile_uri(project_id, 13, 29.025, 41.025);

    let own = app.send(get(&format!("{}?area_id={}", uri, area_id))).await;
    assert_eq!(own.status(), StatusCode::OK);

    let other = app
        .send(get(&format!("{}?area_id={}", uri, Uuid::new_v4())))
        .await;
    assert_eq!(other.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Empty Tiles
// =============================================================================

#[tokio::test]
async fn test_tile_outside_cells_is_empty() {
    let (app, project_id, _) = generated_app().await;

    let response = app.send(get(&tile_uri(project_id, 13, -73.99, 40.70))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_project_without_cells_is_empty() {
    let app = TestApp::new(InMemoryGridStore::new());

    let response = app
        .send(get(&format!("/grids/mvt/{}/0/0/0.pbf", Uuid::new_v4())))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Tile Address Validation
// =============================================================================

#[tokio::test]
async fn test_tile_out_of_range() {
    let app = TestApp::new(InMemoryGridStore::new());

    let response = app
        .send(get(&format!("/grids/mvt/{}/1/2/0.pbf", Uuid::new_v4())))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_tile");

    let response = app
        .send(get(&format!("/grids/mvt/{}/25/0/0.pbf", Uuid::new_v4())))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tile_bad_row() {
    let app = TestApp::new(InMemoryGridStore::new());

    let response = app
        .send(get(&format!("/grids/mvt/{}/1/0/abc.pbf", Uuid::new_v4())))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_tile");
}

// =============================================================================
// Cache Invalidation
// =============================================================================

#[tokio::test]
async fn test_regeneration_invalidates_tiles() {
    let (app, project_id, area_id) = generated_app().await;
    let uri = tile_uri(project_id, 12, 29.025, 41.025);

    app.send(get(&uri)).await;
    let cached = app.send(get(&uri)).await;
    assert_eq!(cached.headers().get("x-tile-cache-hit").unwrap(), "true");

    app.generate_area(area_id).await;

    let fresh = app.send(get(&uri)).await;
    assert_eq!(fresh.status(), StatusCode::OK);
    assert_eq!(fresh.headers().get("x-tile-cache-hit").unwrap(), "false");
}
