//! Health endpoint

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "sinkhole-warning-system";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub readings_stored: usize,
    pub live_subscribers: usize,
}

/// GET /health - Liveness plus a few counters
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        readings_stored: state.history.len(),
        live_subscribers: state.live.subscriber_count(),
    })
}
