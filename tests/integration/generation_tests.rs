//! Generation stream integration tests.
//!
//! Tests verify:
//! - The NDJSON progress protocol end to end
//! - Persistence and area bookkeeping after a run
//! - Rejections before any persistence (404, 400, 409)

use axum::http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use hexgrid_server::grid::plan;
use hexgrid_server::{AreaRecord, GridScope, InMemoryGridStore};

use super::test_utils::{
    body_bytes, body_json, cell_counts, istanbul_square, parse_ndjson, post, square_boundary,
    store_with_area, TestApp,
};

fn terminal_events(events: &[Value]) -> Vec<&Value> {
    events
        .iter()
        .filter(|e| e["status"] != "processing")
        .collect()
}

// =============================================================================
// Area Generation
// =============================================================================

#[tokio::test]
async fn test_area_generation_end_to_end() {
    let boundary = istanbul_square();
    let (store, project_id, area_id) = store_with_area(boundary.clone(), 5.0, 25.0, 2);
    let app = TestApp::new(store);

    let planned = plan(5.0, 25.0, 2).unwrap();
    assert_eq!(planned.len(), 2);

    let response = app
        .send(post(&format!("/grids/area/{}/generate", area_id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-ndjson"
    );

    let events = parse_ndjson(&body_bytes(response).await);

    // Planned resolutions come first
    assert_eq!(events[0]["status"], "processing");
    assert_eq!(events[0]["progress"], 5);
    assert_eq!(events[0]["resolutions"], serde_json::json!(planned));
    assert_eq!(events[1]["progress"], 10);

    // Exactly one terminal event, and it is last
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    let last = events.last().unwrap();
    assert_eq!(last["status"], "success");
    assert_eq!(last["progress"], 100);

    let counts = cell_counts(&boundary, &planned);
    let expected_total: usize = counts.iter().sum();
    let created: Vec<u8> = planned
        .iter()
        .zip(&counts)
        .filter(|(_, n)| **n > 0)
        .map(|(r, _)| *r)
        .collect();
    assert!(expected_total > 0);
    assert_eq!(last["count"], expected_total);
    assert_eq!(last["resolutions_created"], serde_json::json!(created));

    // Each resolution that produced cells reports a batch event
    for resolution in &created {
        assert!(events.iter().any(|e| {
            e["resolution"] == *resolution && e["message"].as_str().unwrap().contains("cells saved")
        }));
    }

    let area = app.store.area_snapshot(area_id).await.unwrap();
    assert!(area.grids_generated);
    assert_eq!(
        app.store
            .scope_cell_count(&GridScope::area(project_id, area_id))
            .await,
        expected_total
    );
}

#[tokio::test]
async fn test_area_defaults_apply_when_unset() {
    let project_id = Uuid::new_v4();
    let area_id = Uuid::new_v4();
    // Tiny square keeps the finest default resolution cheap
    let boundary = square_boundary(29.0, 41.0, 0.002);
    let store = InMemoryGridStore::new().with_area(AreaRecord::new(area_id, project_id, boundary));
    let app = TestApp::new(store);

    let events = app.generate_area(area_id).await;
    let defaults = plan(0.0003, 5.0, 8).unwrap();
    assert_eq!(events[0].resolutions, Some(defaults));
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_regeneration_replaces_cells() {
    let (store, project_id, area_id) = store_with_area(istanbul_square(), 0.105, 0.737, 2);
    let app = TestApp::new(store);
    let scope = GridScope::area(project_id, area_id);

    let first = app.generate_area(area_id).await;
    let after_first = app.store.scope_cell_count(&scope).await;
    let second = app.generate_area(area_id).await;

    assert_eq!(first.last().unwrap().count, second.last().unwrap().count);
    assert_eq!(app.store.scope_cell_count(&scope).await, after_first);
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_generate_missing_area() {
    let app = TestApp::new(InMemoryGridStore::new());

    let response = app
        .send(post(&format!("/grids/area/{}/generate", Uuid::new_v4())))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_generate_area_without_boundary() {
    let project_id = Uuid::new_v4();
    let area_id = Uuid::new_v4();
    let mut area = AreaRecord::new(area_id, project_id, istanbul_square());
    area.boundary = None;
    let app = TestApp::new(InMemoryGridStore::new().with_area(area));

    let response = app
        .send(post(&format!("/grids/area/{}/generate", area_id)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_all_rejects_bad_count() {
    let project_id = Uuid::new_v4();
    let store = InMemoryGridStore::new().with_project(project_id, Some(istanbul_square()));
    let app = TestApp::new(store);

    let response = app
        .send(post(&format!(
            "/grids/{}/generate-all?num_resolutions=0",
            project_id
        )))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_configuration");
    assert_eq!(app.store.insert_count(), 0);
}

#[tokio::test]
async fn test_concurrent_generation_conflicts() {
    let project_id = Uuid::new_v4();
    let store = InMemoryGridStore::new().with_project(project_id, Some(istanbul_square()));
    let app = TestApp::new(store);

    // Fine cells produce more batch events than the stream buffers, so the
    // run waits on the undrained response and keeps the scope
    let uri = format!(
        "/grids/{}/generate-all?min_cell_area_km2=0.00215&max_cell_area_km2=0.00215&num_resolutions=1",
        project_id
    );
    let first = app.send(post(&uri)).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.send(post(&uri)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"], "generation_in_progress");

    // Draining the first stream finishes the run
    let events = parse_ndjson(&body_bytes(first).await);
    assert_eq!(events.last().unwrap()["status"], "success");
}

// =============================================================================
// Legacy Project Generation
// =============================================================================

#[tokio::test]
async fn test_generate_all_keeps_area_cells() {
    let boundary = istanbul_square();
    let (store, project_id, area_id) = store_with_area(boundary.clone(), 0.737, 0.737, 1);
    let app = TestApp::new(store);

    app.generate_area(area_id).await;
    let area_scope = GridScope::area(project_id, area_id);
    let area_cells = app.store.scope_cell_count(&area_scope).await;

    let response = app
        .send(post(&format!(
            "/grids/{}/generate-all?min_cell_area_km2=0.105&max_cell_area_km2=0.105&num_resolutions=1",
            project_id
        )))
        .await;
    let events = parse_ndjson(&body_bytes(response).await);
    let last = events.last().unwrap();
    assert_eq!(last["status"], "success");
    assert_eq!(last["count"], cell_counts(&boundary, &[9])[0]);

    assert_eq!(app.store.scope_cell_count(&area_scope).await, area_cells);
    assert_eq!(
        app.store
            .scope_cell_count(&GridScope::project(project_id))
            .await,
        cell_counts(&boundary, &[9])[0]
    );
}

#[tokio::test]
async fn test_datastore_failure_ends_stream_with_error() {
    let project_id = Uuid::new_v4();
    let store = InMemoryGridStore::new()
        .with_project(project_id, Some(istanbul_square()))
        .failing_inserts_after(0);
    let app = TestApp::new(store);

    let response = app
        .send(post(&format!(
            "/grids/{}/generate-all?min_cell_area_km2=0.737&max_cell_area_km2=0.737&num_resolutions=1",
            project_id
        )))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = parse_ndjson(&body_bytes(response).await);
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0]["status"], "error");
    assert!(events.iter().all(|e| e["status"] != "success"));
}
