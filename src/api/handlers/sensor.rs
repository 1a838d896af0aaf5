//! Sensor ingestion and latest-reading endpoints

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use super::AppState;
use crate::api::envelope::{ApiError, ApiJson};
use crate::storage::Inserted;
use crate::types::{RiskLevel, SensorPayload, SensorRecord};

/// Reply to a successful `POST /sensor`.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub id: u64,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
}

/// POST /sensor - Score, store and broadcast one reading
///
/// The reading is scored against a single threshold snapshot. A reading
/// with a non-finite field is rejected with 422 and neither stored nor
/// broadcast.
pub async fn ingest_reading(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SensorPayload>,
) -> Result<Json<IngestResponse>, ApiError> {
    let reading = payload.into_reading(state.settings.offset, Utc::now());
    let scorer = state.thresholds.snapshot();

    let evaluation = scorer.evaluate(&reading).map_err(|e| {
        warn!(error = %e, "Rejected sensor reading");
        ApiError::from(e)
    })?;

    let Inserted {
        record,
        previous_level: previous,
    } = state.history.insert(&reading, &evaluation);

    debug!(
        id = record.id,
        score = record.risk_score,
        level = %record.risk_level,
        tilt = record.tilt_magnitude,
        moisture = record.moisture,
        "Reading ingested"
    );
    if record.risk_level >= RiskLevel::Warning && previous != Some(record.risk_level) {
        warn!(
            id = record.id,
            score = record.risk_score,
            level = %record.risk_level,
            previous = %previous.unwrap_or_default(),
            "Risk level escalated"
        );
    }

    let receivers = state.live.publish(&record);
    debug!(id = record.id, receivers, "Record broadcast");

    Ok(Json(IngestResponse {
        status: "ok",
        id: record.id,
        risk_level: record.risk_level,
        risk_score: record.risk_score,
    }))
}

/// GET /latest - Most recently ingested record, or `null`
pub async fn get_latest(State(state): State<AppState>) -> Json<Option<SensorRecord>> {
    Json(state.history.latest())
}
