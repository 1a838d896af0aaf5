//! Threshold editor endpoints: list, single-field upsert, what-if preview

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::api::envelope::{ApiError, ApiJson};
use crate::config::validation::suggest_threshold_name;
use crate::config::ThresholdEntry;
use crate::risk::RiskScorer;
use crate::types::{RiskEvaluation, SensorPayload, ThresholdField, ThresholdOverrides};

// ============================================================================
// List / Upsert
// ============================================================================

/// GET /config/api/thresholds - All nine thresholds as `{id, name, value}`
pub async fn list_thresholds(State(state): State<AppState>) -> Json<Vec<ThresholdEntry>> {
    Json(state.thresholds.entries())
}

/// Body of `POST /config/api/thresholds`.
#[derive(Debug, Deserialize)]
pub struct ThresholdUpdate {
    pub name: String,
    pub value: f64,
}

/// POST /config/api/thresholds - Set one threshold by name
///
/// Takes effect for the next ingested reading. Unknown names are rejected
/// (with a suggestion when one is close), as is any value that would leave
/// the thresholds degenerate.
pub async fn upsert_threshold(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<ThresholdUpdate>,
) -> Result<Json<ThresholdEntry>, ApiError> {
    let field: ThresholdField = update.name.parse().map_err(|_| ApiError::UnknownThreshold {
        suggestion: suggest_threshold_name(&update.name),
        name: update.name.clone(),
    })?;

    let old = state.thresholds.thresholds().get(field);
    let entry = state.thresholds.set_field(field, update.value)?;
    info!(field = %field, old, new = entry.value, "Threshold updated via API");
    Ok(Json(entry))
}

// ============================================================================
// Preview
// ============================================================================

/// Body of `POST /config/api/thresholds/preview`.
#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    /// Candidate values; omitted fields keep their current value
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
    /// Reading to score; the latest stored reading when absent
    #[serde(default)]
    pub reading: Option<SensorPayload>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub current: RiskEvaluation,
    pub candidate: RiskEvaluation,
    pub level_changed: bool,
}

/// POST /config/api/thresholds/preview - Score one reading under current and candidate thresholds
///
/// Nothing is stored.
pub async fn preview_thresholds(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let current_scorer = state.thresholds.snapshot();
    let candidate_scorer =
        RiskScorer::new(request.thresholds.apply_to(*current_scorer.thresholds()))?;

    let reading = match request.reading {
        Some(payload) => payload.into_reading(state.settings.offset, Utc::now()),
        None => state
            .history
            .latest()
            .map(|r| r.reading())
            .ok_or_else(|| {
                ApiError::NotFound("no reading given and no reading has been stored yet".to_string())
            })?,
    };

    let current = current_scorer.evaluate(&reading)?;
    let candidate = candidate_scorer.evaluate(&reading)?;
    Ok(Json(PreviewResponse {
        level_changed: current.level != candidate.level,
        current,
        candidate,
    }))
}
