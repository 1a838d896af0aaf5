//! Sensor readings: ingestion payload, scored reading, stored record

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{RiskEvaluation, RiskLevel};

/// 3-axis vector as sent by the field node (`{"x": .., "y": .., "z": ..}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Body of `POST /sensor` as produced by the node client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    /// Soil moisture raw value (higher = wetter)
    pub moisture: f64,
    /// 3-axis acceleration
    pub accel: Axis3,
    /// 3-axis angular rate
    pub gyro: Axis3,
    /// Vibration sensor raw value
    pub vibration_raw: f64,
    /// Node-side timestamp (ISO 8601); server time is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl SensorPayload {
    /// Flatten into a reading, resolving the timestamp in the site offset.
    ///
    /// `now` is used when the payload carries no timestamp or one that
    /// cannot be parsed.
    pub fn into_reading(self, offset: FixedOffset, now: DateTime<Utc>) -> SensorReading {
        let created_at = self
            .timestamp
            .as_deref()
            .and_then(|ts| {
                let parsed = parse_timestamp(ts, offset);
                if parsed.is_none() {
                    tracing::debug!(timestamp = ts, "Unparsable node timestamp, using server time");
                }
                parsed
            })
            .unwrap_or_else(|| now.with_timezone(&offset));

        SensorReading {
            moisture: self.moisture,
            accel_x: self.accel.x,
            accel_y: self.accel.y,
            accel_z: self.accel.z,
            gyro_x: self.gyro.x,
            gyro_y: self.gyro.y,
            gyro_z: self.gyro.z,
            vibration_raw: self.vibration_raw,
            created_at,
        }
    }
}

/// Parse an ISO 8601 timestamp into the site offset.
///
/// Accepts RFC 3339 (`Z` or explicit offset) and naive date-times, which
/// are taken to already be in `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&offset));
    }
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
}

/// One flattened sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub moisture: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    pub vibration_raw: f64,
    pub created_at: DateTime<FixedOffset>,
}

impl SensorReading {
    /// Numeric fields by name, in column order.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 8] {
        [
            ("moisture", self.moisture),
            ("accel_x", self.accel_x),
            ("accel_y", self.accel_y),
            ("accel_z", self.accel_z),
            ("gyro_x", self.gyro_x),
            ("gyro_y", self.gyro_y),
            ("gyro_z", self.gyro_z),
            ("vibration_raw", self.vibration_raw),
        ]
    }

    /// First non-finite field, if any.
    pub fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        self.numeric_fields()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
    }
}

/// A scored reading as stored in history and pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: u64,
    pub moisture: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    pub vibration_raw: f64,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub tilt_magnitude: f64,
    pub created_at: DateTime<FixedOffset>,
}

impl SensorRecord {
    pub fn new(id: u64, reading: &SensorReading, evaluation: &RiskEvaluation) -> Self {
        Self {
            id,
            moisture: reading.moisture,
            accel_x: reading.accel_x,
            accel_y: reading.accel_y,
            accel_z: reading.accel_z,
            gyro_x: reading.gyro_x,
            gyro_y: reading.gyro_y,
            gyro_z: reading.gyro_z,
            vibration_raw: reading.vibration_raw,
            risk_level: evaluation.level,
            risk_score: evaluation.score,
            tilt_magnitude: evaluation.tilt_magnitude,
            created_at: reading.created_at,
        }
    }

    /// The raw reading this record was scored from.
    pub fn reading(&self) -> SensorReading {
        SensorReading {
            moisture: self.moisture,
            accel_x: self.accel_x,
            accel_y: self.accel_y,
            accel_z: self.accel_z,
            gyro_x: self.gyro_x,
            gyro_y: self.gyro_y,
            gyro_z: self.gyro_z,
            vibration_raw: self.vibration_raw,
            created_at: self.created_at,
        }
    }

    /// Replace the risk fields with a fresh evaluation.
    pub fn apply_evaluation(&mut self, evaluation: &RiskEvaluation) {
        self.risk_level = evaluation.level;
        self.risk_score = evaluation.score;
        self.tilt_magnitude = evaluation.tilt_magnitude;
    }
}
