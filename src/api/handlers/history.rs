//! History query and CSV export endpoints

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use super::AppState;
use crate::api::envelope::{ApiError, ApiQuery};
use crate::storage::HistoryQuery;
use crate::types::{parse_timestamp, SensorRecord};

/// Column header of the CSV export.
pub const CSV_HEADER: &str =
    "created_at,moisture,accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z,vibration_raw,risk_level";

/// Attachment name of the CSV export.
pub const CSV_FILENAME: &str = "sensor_history.csv";

/// Query parameters shared by `/api/history` and `/api/history/csv`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// Last N minutes (wins over `start`/`end`)
    pub minutes: Option<u32>,
    /// Range start, ISO 8601
    pub start: Option<String>,
    /// Range end, ISO 8601
    pub end: Option<String>,
    /// Re-score with the current thresholds instead of the stored result
    #[serde(default)]
    pub rescore: bool,
}

impl HistoryParams {
    pub fn to_query(&self, offset: FixedOffset) -> Result<HistoryQuery, ApiError> {
        let start = parse_param("start", self.start.as_deref(), offset)?;
        let end = parse_param("end", self.end.as_deref(), offset)?;
        Ok(HistoryQuery::from_params(self.minutes, start, end))
    }
}

fn parse_param(
    name: &str,
    raw: Option<&str>,
    offset: FixedOffset,
) -> Result<Option<DateTime<FixedOffset>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(s, offset)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("'{name}' is not an ISO 8601 timestamp: {s}"))),
    }
}

/// GET /api/history - Records newest first, capped at the configured query limit
pub async fn get_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Json<Vec<SensorRecord>>, ApiError> {
    let query = params.to_query(state.settings.offset)?;
    let mut records = state
        .history
        .query(&query, state.now(), state.settings.query_limit);

    if params.rescore {
        let scorer = state.thresholds.snapshot();
        let readings: Vec<_> = records.iter().map(SensorRecord::reading).collect();
        for (record, evaluation) in records.iter_mut().zip(scorer.evaluate_all(&readings)) {
            record.apply_evaluation(&evaluation?);
        }
    }

    Ok(Json(records))
}

/// GET /api/history/csv - CSV attachment, oldest first, capped at the export limit
pub async fn export_history_csv(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Response, ApiError> {
    let query = params.to_query(state.settings.offset)?;
    let records = state
        .history
        .query(&query, state.now(), state.settings.export_limit);

    let body = render_csv(records.iter().rev(), state.settings.offset).map_err(|e| {
        tracing::error!(error = %e, "CSV export failed");
        ApiError::Internal(format!("CSV export failed: {e}"))
    })?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={CSV_FILENAME}"),
            ),
        ],
        body,
    )
        .into_response())
}

/// Render records in the given order. Timestamps are written on the site clock.
pub fn render_csv<'a, I>(records: I, offset: FixedOffset) -> csv::Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a SensorRecord>,
{
    let mut writer = csv::Writer::from_writer(Vec::with_capacity(4096));
    writer.write_record(CSV_HEADER.split(','))?;

    for r in records {
        writer.write_record([
            r.created_at
                .with_timezone(&offset)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            format!("{:?}", r.moisture),
            format!("{:?}", r.accel_x),
            format!("{:?}", r.accel_y),
            format!("{:?}", r.accel_z),
            format!("{:?}", r.gyro_x),
            format!("{:?}", r.gyro_y),
            format!("{:?}", r.gyro_z),
            format!("{:?}", r.vibration_raw),
            r.risk_level.code().to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskScorer;
    use crate::types::SensorReading;
    use chrono::TimeZone;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn test_render_csv_layout() {
        let reading = SensorReading {
            moisture: 450.0,
            accel_x: 0.05,
            accel_y: -0.03,
            accel_z: 9.8,
            gyro_x: 0.0,
            gyro_y: 0.01,
            gyro_z: -0.02,
            vibration_raw: 1.5,
            created_at: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2025, 11, 3, 1, 2, 3)
                .unwrap(),
        };
        let eval = RiskScorer::default().evaluate(&reading).unwrap();
        let record = SensorRecord::new(1, &reading, &eval);

        let csv = String::from_utf8(render_csv([&record], kst()).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("2025-11-03 10:02:03,450.0,0.05,-0.03,9.8,0.0,0.01,-0.02,1.5,1")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_render_csv_empty_is_header_only() {
        let csv = render_csv(std::iter::empty(), kst()).unwrap();
        assert_eq!(csv, format!("{CSV_HEADER}\n").into_bytes());
    }

    #[test]
    fn test_params_precedence_and_parsing() {
        let params = HistoryParams {
            minutes: Some(15),
            start: Some("2025-11-03T10:00:00".to_string()),
            end: Some("2025-11-03T11:00:00".to_string()),
            rescore: false,
        };
        assert_eq!(
            params.to_query(kst()).unwrap(),
            HistoryQuery::Window { minutes: 15 }
        );

        let range = HistoryParams {
            minutes: None,
            ..params
        };
        assert!(matches!(
            range.to_query(kst()).unwrap(),
            HistoryQuery::Range { .. }
        ));
    }

    #[test]
    fn test_bad_timestamp_is_bad_request() {
        let params = HistoryParams {
            start: Some("last tuesday".to_string()),
            end: Some("2025-11-03T11:00:00".to_string()),
            ..Default::default()
        };
        assert!(matches!(params.to_query(kst()), Err(ApiError::BadRequest(_))));
    }
}
