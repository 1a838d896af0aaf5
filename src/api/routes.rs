//! API route definitions
//!
//! Paths are the ones the field nodes and the dashboard already use:
//! - /sensor, /latest - ingestion and most recent reading
//! - /api/history, /api/history/csv - history query and export
//! - /config/api/thresholds[/preview] - threshold editor
//! - /ws - live feed
//! - /health - liveness

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create all routes with state attached
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Ingestion
        .route("/sensor", post(handlers::ingest_reading))
        .route("/latest", get(handlers::get_latest))
        // History
        .route("/api/history", get(handlers::get_history))
        .route("/api/history/csv", get(handlers::export_history_csv))
        // Threshold editor
        .route(
            "/config/api/thresholds",
            get(handlers::list_thresholds).post(handlers::upsert_threshold),
        )
        .route(
            "/config/api/thresholds/preview",
            post(handlers::preview_thresholds),
        )
        // Live feed
        .route("/ws", get(handlers::live_socket))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
