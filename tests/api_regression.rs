//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! every endpoint using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use sinkwatch::{create_app, AppConfig, AppState, ThresholdStore};

fn create_test_state() -> AppState {
    AppState::new(&AppConfig::default(), Arc::new(ThresholdStore::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec(), headers)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, bytes, _) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes, _) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn payload(moisture: f64, ax: f64, ay: f64, vibration: f64, timestamp: &str) -> Value {
    json!({
        "moisture": moisture,
        "accel": {"x": ax, "y": ay, "z": 9.8},
        "gyro": {"x": 0.01, "y": 0.02, "z": 0.03},
        "vibration_raw": vibration,
        "timestamp": timestamp,
    })
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_ingest_scores_stores_and_returns_level() {
    let app = create_app(create_test_state());

    let (status, body) = post_json(
        &app,
        "/sensor",
        payload(700.0, 5.0, 3.0, 1.2, "2025-11-03T10:00:00"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["id"], 1);
    assert_eq!(body["risk_level"], 1);
    assert!((body["risk_score"].as_f64().unwrap() - 0.5).abs() < 1e-12);

    let (status, latest) = get_json(&app, "/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], 1);
    assert_eq!(latest["moisture"], 700.0);
    assert_eq!(latest["accel_x"], 5.0);
    assert_eq!(latest["created_at"], "2025-11-03T10:00:00+09:00");
}

#[tokio::test]
async fn test_ingest_missing_field_is_rejected_and_not_stored() {
    let state = create_test_state();
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        "/sensor",
        json!({"moisture": 800.0, "accel": {"x": 0, "y": 0, "z": 9.8}, "vibration_raw": 0.1}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert_eq!(state.history.len(), 0);
}

#[tokio::test]
async fn test_ingest_broadcasts_to_live_subscribers() {
    let state = create_test_state();
    let mut rx = state.live.subscribe();
    let app = create_app(state);

    post_json(&app, "/sensor", payload(900.0, 0.0, 0.0, 0.1, "2025-11-03T10:00:00")).await;

    let pushed: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(pushed["id"], 1);
    assert_eq!(pushed["risk_level"], 0);
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_history_range_newest_first() {
    let app = create_app(create_test_state());
    for (i, ts) in ["2025-11-03T10:01:00", "2025-11-03T10:05:00", "2025-11-03T09:00:00"]
        .iter()
        .enumerate()
    {
        let (status, _) = post_json(&app, "/sensor", payload(850.0 + i as f64, 0.0, 0.0, 0.1, ts)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = get_json(
        &app,
        "/api/history?start=2025-11-03T10:00:00&end=2025-11-03T10:10:00",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["created_at"], "2025-11-03T10:05:00+09:00");
    assert_eq!(records[1]["created_at"], "2025-11-03T10:01:00+09:00");

    // Only one bound given: everything
    let (_, body) = get_json(&app, "/api/history?start=2025-11-03T10:00:00").await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_history_bad_timestamp_is_400() {
    let app = create_app(create_test_state());
    let (status, body) = get_json(&app, "/api/history?start=yesterday&end=today").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_history_rescore_uses_current_thresholds() {
    let app = create_app(create_test_state());
    post_json(&app, "/sensor", payload(700.0, 5.0, 3.0, 1.2, "2025-11-03T10:00:00")).await;

    let (status, _) = post_json(
        &app,
        "/config/api/thresholds",
        json!({"name": "risk_warning_max", "value": 0.45}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stored) = get_json(&app, "/api/history").await;
    assert_eq!(stored[0]["risk_level"], 1);

    let (_, rescored) = get_json(&app, "/api/history?rescore=true").await;
    assert_eq!(rescored[0]["risk_level"], 2);
}

#[tokio::test]
async fn test_history_csv_export() {
    let app = create_app(create_test_state());
    post_json(&app, "/sensor", payload(700.0, 5.0, 3.0, 1.2, "2025-11-03T10:05:00")).await;
    post_json(&app, "/sensor", payload(900.0, 0.0, 0.0, 0.1, "2025-11-03T10:01:00")).await;

    let request = Request::builder()
        .uri("/api/history/csv")
        .body(Body::empty())
        .unwrap();
    let (status, bytes, headers) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=sensor_history.csv"
    );

    let csv = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "created_at,moisture,accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z,vibration_raw,risk_level"
    );
    assert_eq!(lines.len(), 3);
    // Oldest first
    assert!(lines[1].starts_with("2025-11-03 10:01:00,900.0,"));
    assert!(lines[2].starts_with("2025-11-03 10:05:00,700.0,"));
    assert!(lines[2].ends_with(",1"));
}

// ============================================================================
// Thresholds
// ============================================================================

#[tokio::test]
async fn test_threshold_list_and_update() {
    let app = create_app(create_test_state());

    let (status, body) = get_json(&app, "/config/api/thresholds").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 9);
    assert_eq!(entries[1], json!({"id": 2, "name": "tilt_danger", "value": 8.0}));

    let (status, body) = post_json(
        &app,
        "/config/api/thresholds",
        json!({"name": "tiltDanger", "value": 9.5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": 2, "name": "tilt_danger", "value": 9.5}));

    let (_, body) = get_json(&app, "/config/api/thresholds").await;
    assert_eq!(body[1]["value"], 9.5);
}

#[tokio::test]
async fn test_unknown_threshold_is_404_with_suggestion() {
    let app = create_app(create_test_state());
    let (status, body) = post_json(
        &app,
        "/config/api/thresholds",
        json!({"name": "moisture_warnin", "value": 740.0}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "UNKNOWN_THRESHOLD");
    assert!(body["message"].as_str().unwrap().contains("moisture_warning"));
}

#[tokio::test]
async fn test_degenerate_threshold_is_rejected_and_not_applied() {
    let app = create_app(create_test_state());
    let (status, body) = post_json(
        &app,
        "/config/api/thresholds",
        json!({"name": "moisture_warning", "value": 850.0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CONFIGURATION");

    let (_, body) = get_json(&app, "/config/api/thresholds").await;
    assert_eq!(body[3]["name"], "moisture_warning");
    assert_eq!(body[3]["value"], 750.0);
}

#[tokio::test]
async fn test_preview_with_reading() {
    let app = create_app(create_test_state());
    let (status, body) = post_json(
        &app,
        "/config/api/thresholds/preview",
        json!({
            "thresholds": {"riskWarningMax": 0.45},
            "reading": payload(700.0, 5.0, 3.0, 1.2, "2025-11-03T10:00:00"),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"]["level"], 1);
    assert_eq!(body["candidate"]["level"], 2);
    assert_eq!(body["level_changed"], true);

    // Preview never saves
    let (_, body) = get_json(&app, "/config/api/thresholds").await;
    assert_eq!(body[8]["value"], 0.6);
}

#[tokio::test]
async fn test_preview_uses_latest_reading_or_404() {
    let app = create_app(create_test_state());
    let (status, _) = post_json(&app, "/config/api/thresholds/preview", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post_json(&app, "/sensor", payload(900.0, 0.0, 0.0, 0.1, "2025-11-03T10:00:00")).await;
    let (status, body) = post_json(
        &app,
        "/config/api/thresholds/preview",
        json!({"thresholds": {"tilt_normal": 1.0}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level_changed"], false);
}

#[tokio::test]
async fn test_preview_invalid_candidate_is_400() {
    let app = create_app(create_test_state());
    let (status, body) = post_json(
        &app,
        "/config/api/thresholds/preview",
        json!({
            "thresholds": {"tilt_normal": 9.0},
            "reading": payload(900.0, 0.0, 0.0, 0.1, "2025-11-03T10:00:00"),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CONFIGURATION");
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_counts_readings() {
    let app = create_app(create_test_state());
    post_json(&app, "/sensor", payload(900.0, 0.0, 0.0, 0.1, "2025-11-03T10:00:00")).await;
    post_json(&app, "/sensor", payload(900.0, 0.0, 0.0, 0.1, "2025-11-03T10:00:03")).await;

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "sinkhole-warning-system");
    assert_eq!(body["readings_stored"], 2);
}
