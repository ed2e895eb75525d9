//! API regression tests.
//!
//! Imports the demo snapshot into an on-disk store, then drives the REST
//! API end to end: run, re-run, preview and the read endpoints.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use seatplan_api::build_router;
use seatplan_engine::AssignmentEngine;
use seatplan_state::{Snapshot, StateStore};

const DEMO_SNAPSHOT: &str = include_str!("../../../demos/snapshot.json");

fn demo_store(dir: &tempfile::TempDir) -> StateStore {
    let store = StateStore::open(&dir.path().join("seatplan.redb")).unwrap();
    let snapshot: Snapshot = serde_json::from_str(DEMO_SNAPSHOT).unwrap();
    let summary = store.import_snapshot(&snapshot).unwrap();
    assert_eq!(summary.centers, 4);
    assert_eq!(summary.roster, 6);
    store
}

fn router(store: StateStore) -> Router {
    build_router(
        AssignmentEngine::with_stored_roster(store),
        Duration::from_secs(30),
    )
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections are plain text.
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn demo_run_assigns_and_skips() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(demo_store(&dir));

    let (status, json) = send(&router, "POST", "/api/v1/exam-years/2025/assignments/run").await;

    assert_eq!(status, StatusCode::OK);
    let report = &json["data"];
    assert_eq!(report["assignedCount"], 3);
    assert_eq!(report["skippedCount"], 3);

    let placed: Vec<(u64, u64)> = report["assignments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| (a["schoolId"].as_u64().unwrap(), a["centerId"].as_u64().unwrap()))
        .collect();
    assert_eq!(placed, vec![(1, 1), (3, 2), (4, 3)]);

    let skips: Vec<(u64, &str)> = report["skips"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| (s["schoolId"].as_u64().unwrap(), s["reason"].as_str().unwrap()))
        .collect();
    assert_eq!(
        skips,
        vec![(2, "no_capacity"), (5, "no_capacity"), (6, "no_region_assigned")]
    );
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(demo_store(&dir));
    send(&router, "POST", "/api/v1/exam-years/2025/assignments/run").await;

    let (status, json) = send(&router, "POST", "/api/v1/exam-years/2025/assignments/run").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["assignedCount"], 0);
    assert_eq!(json["data"]["skippedCount"], 0);
    assert_eq!(json["data"]["knownSkipCount"], 3);

    let (_, assignments) = send(&router, "GET", "/api/v1/exam-years/2025/assignments").await;
    assert_eq!(assignments["data"].as_array().unwrap().len(), 3);
    let (_, skips) = send(&router, "GET", "/api/v1/exam-years/2025/skips").await;
    assert_eq!(skips["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let router = router(demo_store(&dir));
        send(&router, "POST", "/api/v1/exam-years/2025/assignments/run").await;
    }

    let store = StateStore::open(&dir.path().join("seatplan.redb")).unwrap();
    let router = router(store);
    let (_, json) = send(&router, "GET", "/api/v1/exam-years/2025/utilization").await;

    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["used"], 90);
    assert_eq!(rows[0]["remaining"], 30);
    assert_eq!(rows[3]["isActive"], false);
    assert_eq!(rows[3]["used"], 0);
}

#[tokio::test]
async fn preview_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(demo_store(&dir));

    let (status, json) = send(&router, "POST", "/api/v1/exam-years/2025/assignments/preview").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["dryRun"], true);
    assert_eq!(json["data"]["assignedCount"], 3);
    let (_, assignments) = send(&router, "GET", "/api/v1/exam-years/2025/assignments").await;
    assert!(assignments["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn other_year_has_nothing_to_place() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(demo_store(&dir));
    send(&router, "POST", "/api/v1/exam-years/2025/assignments/run").await;

    // No roster for 2026: every located school goes in with demand 0.
    let (_, json) = send(&router, "POST", "/api/v1/exam-years/2026/assignments/run").await;

    assert_eq!(json["data"]["assignedCount"], 5);
    assert_eq!(json["data"]["skips"][0]["reason"], "no_region_assigned");
}

#[tokio::test]
async fn non_numeric_year_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(demo_store(&dir));

    let (status, _) = send(&router, "GET", "/api/v1/exam-years/latest/assignments").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
