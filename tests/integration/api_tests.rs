//! API integration tests for the GeoJSON cell endpoints.
//!
//! Tests verify:
//! - Cell collections for areas and projects, with filters
//! - Zoom-adaptive collections
//! - Resolution counts
//! - Intersecting-cell lookups
//! - Static endpoints and request errors

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use hexgrid_server::InMemoryGridStore;

use super::test_utils::{
    body_json, cell_counts, get, istanbul_square, post_json, store_with_area, TestApp,
};

/// App with one area generated at resolutions 7 and 9.
async fn generated_app() -> (TestApp, Uuid, Uuid) {
    let (store, project_id, area_id) = store_with_area(istanbul_square(), 0.105, 5.161, 2);
    let app = TestApp::new(store);
    let events = app.generate_area(area_id).await;
    assert_eq!(events.last().unwrap().resolutions_created, Some(vec![7, 9]));
    (app, project_id, area_id)
}

fn features(json: &Value) -> &Vec<Value> {
    json["features"].as_array().unwrap()
}

// =============================================================================
// Static Endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(InMemoryGridStore::new());
    let response = app.send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_resolution_info() {
    let app = TestApp::new(InMemoryGridStore::new());
    let response = app.send(get("/grids/resolution-info")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["resolution_areas_km2"]["8"], 0.737);
    assert_eq!(json["resolution_areas_km2"].as_object().unwrap().len(), 16);
    assert_eq!(json["zoom_resolutions"]["5"], 3);
}

// =============================================================================
// Area Endpoints
// =============================================================================

#[tokio::test]
async fn test_area_cells_collection() {
    let (app, _, area_id) = generated_app().await;
    let counts = cell_counts(&istanbul_square(), &[7, 9]);

    let response = app.send(get(&format!("/grids/area/{}", area_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["type"], "FeatureCollection");
    assert_eq!(json["area_id"], area_id.to_string());
    assert_eq!(features(&json).len(), counts[0] + counts[1]);

    let response = app
        .send(get(&format!("/grids/area/{}?resolution=9", area_id)))
        .await;
    let json = body_json(response).await;
    assert_eq!(features(&json).len(), counts[1]);

    let feature = &features(&json)[0];
    assert_eq!(feature["properties"]["resolution"], 9);
    assert_eq!(feature["properties"]["area_id"], area_id.to_string());
    assert_eq!(feature["geometry"]["type"], "Polygon");

    // Closed ring
    let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
    assert_eq!(ring.first(), ring.last());
}

#[tokio::test]
async fn test_area_by_zoom() {
    let (app, _, area_id) = generated_app().await;

    let far = body_json(
        app.send(get(&format!("/grids/area/{}/by-zoom?zoom=4", area_id)))
            .await,
    )
    .await;
    assert_eq!(far["resolution"], 7);
    assert_eq!(far["zoom"], 4);
    assert_eq!(far["available_resolutions"], json!([7, 9]));

    let near = body_json(
        app.send(get(&format!("/grids/area/{}/by-zoom?zoom=14", area_id)))
            .await,
    )
    .await;
    assert_eq!(near["resolution"], 9);
    assert!(features(&near)
        .iter()
        .all(|f| f["properties"]["resolution"] == 9));

    // Zoom defaults to 10, whose target (8) is equally far from 7 and 9
    let default = body_json(app.send(get(&format!("/grids/area/{}/by-zoom", area_id))).await).await;
    assert_eq!(default["zoom"], 10);
    assert_eq!(default["resolution"], 7);
}

#[tokio::test]
async fn test_area_by_zoom_without_cells() {
    let app = TestApp::new(InMemoryGridStore::new());
    let json = body_json(
        app.send(get(&format!("/grids/area/{}/by-zoom?zoom=9", Uuid::new_v4())))
            .await,
    )
    .await;
    assert!(json["resolution"].is_null());
    assert_eq!(json["available_resolutions"], json!([]));
    assert_eq!(json["features"], json!([]));
}

#[tokio::test]
async fn test_area_resolutions() {
    let (app, _, area_id) = generated_app().await;
    let counts = cell_counts(&istanbul_square(), &[7, 9]);

    let json = body_json(
        app.send(get(&format!("/grids/area/{}/resolutions", area_id)))
            .await,
    )
    .await;
    assert_eq!(
        json,
        json!([
            {"resolution": 7, "count": counts[0], "approx_area_km2": 5.161},
            {"resolution": 9, "count": counts[1], "approx_area_km2": 0.105},
        ])
    );
}

// =============================================================================
// Project Endpoints
// =============================================================================

#[tokio::test]
async fn test_project_cells_include_area_cells() {
    let (app, project_id, area_id) = generated_app().await;
    let counts = cell_counts(&istanbul_square(), &[7, 9]);

    let all = body_json(app.send(get(&format!("/grids/{}", project_id))).await).await;
    assert!(all.get("area_id").is_none());
    assert_eq!(features(&all).len(), counts[0] + counts[1]);

    let filtered = body_json(
        app.send(get(&format!(
            "/grids/{}?resolution=7&area_id={}",
            project_id, area_id
        )))
        .await,
    )
    .await;
    assert_eq!(features(&filtered).len(), counts[0]);

    let other_area = body_json(
        app.send(get(&format!(
            "/grids/{}?area_id={}",
            project_id,
            Uuid::new_v4()
        )))
        .await,
    )
    .await;
    assert!(features(&other_area).is_empty());
}

#[tokio::test]
async fn test_project_by_zoom_and_resolutions() {
    let (app, project_id, _) = generated_app().await;

    let zoom = body_json(
        app.send(get(&format!("/grids/{}/by-zoom?zoom=3", project_id)))
            .await,
    )
    .await;
    assert_eq!(zoom["resolution"], 7);

    let resolutions = body_json(
        app.send(get(&format!("/grids/{}/resolutions", project_id)))
            .await,
    )
    .await;
    let listed: Vec<u64> = resolutions
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["resolution"].as_u64().unwrap())
        .collect();
    assert_eq!(listed, vec![7, 9]);
}

// =============================================================================
// Intersecting Cells
// =============================================================================

#[tokio::test]
async fn test_intersecting_cells() {
    let (app, project_id, area_id) = generated_app().await;

    let coarse = body_json(
        app.send(get(&format!("/grids/area/{}?resolution=7", area_id)))
            .await,
    )
    .await;
    let selected = features(&coarse)[0]["properties"]["h3_index"].clone();

    let response = app
        .send(post_json(
            &format!("/grids/{}/intersecting-cells", project_id),
            &json!([selected]),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["resolution"], 9);
    let cells = json["cells"].as_array().unwrap();
    assert!(!cells.is_empty());
    assert_eq!(json["count"], cells.len());
    assert_eq!(json["geometries"].as_array().unwrap().len(), cells.len());
    assert_eq!(json["geometries"][0]["type"], "Feature");
}

#[tokio::test]
async fn test_intersecting_cells_empty_selection() {
    let (app, project_id, _) = generated_app().await;

    let json = body_json(
        app.send(post_json(
            &format!("/grids/{}/intersecting-cells", project_id),
            &json!([]),
        ))
        .await,
    )
    .await;
    assert_eq!(json, json!({"cells": [], "resolution": null}));
}

#[tokio::test]
async fn test_intersecting_cells_unknown_selection() {
    let (app, project_id, _) = generated_app().await;

    // A valid cell far from the area
    let json = body_json(
        app.send(post_json(
            &format!("/grids/{}/intersecting-cells", project_id),
            &json!(["8a1fb46622dffff"]),
        ))
        .await,
    )
    .await;
    assert_eq!(json, json!({"cells": [], "resolution": 9}));
}

#[tokio::test]
async fn test_intersecting_cells_invalid_index() {
    let (app, project_id, _) = generated_app().await;

    let response = app
        .send(post_json(
            &format!("/grids/{}/intersecting-cells", project_id),
            &json!(["not-a-cell"]),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "invalid_geometry");
}

// =============================================================================
// Request Errors
// =============================================================================

#[tokio::test]
async fn test_invalid_uuid_path() {
    let app = TestApp::new(InMemoryGridStore::new());
    let response = app.send(get("/grids/area/not-a-uuid")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
