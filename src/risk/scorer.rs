//! Sub-scores, composite score, classification and the validated scorer

use crate::types::{risk_defaults, RiskEvaluation, RiskLevel, RiskThresholds, SensorReading};

use super::RiskError;

/// Planar tilt magnitude `sqrt(x² + y²)`. The z axis (gravity) is excluded.
pub fn tilt_magnitude(accel_x: f64, accel_y: f64) -> f64 {
    accel_x.hypot(accel_y)
}

/// Linear ramp: 0 at `zero_at`, 1 at `one_at`, clamped to `[0, 1]`.
///
/// Works in both directions, so the inverted moisture scale is just
/// `zero_at > one_at`. Requires `zero_at != one_at`.
fn ramp(value: f64, zero_at: f64, one_at: f64) -> f64 {
    // `+ 0.0` turns the -0.0 of a falling ramp at `zero_at` into 0.0
    ((value - zero_at) / (one_at - zero_at)).clamp(0.0, 1.0) + 0.0
}

/// Tilt sub-score in `[0, 1]`.
///
/// - magnitude < `tilt_normal` → 0
/// - magnitude ≥ `tilt_danger` → 1
/// - linear in between
pub fn tilt_score(accel_x: f64, accel_y: f64, thresholds: &RiskThresholds) -> f64 {
    ramp(
        tilt_magnitude(accel_x, accel_y),
        thresholds.tilt_normal,
        thresholds.tilt_danger,
    )
}

/// Moisture sub-score in `[0, 1]`. Lower moisture means higher risk.
///
/// - moisture > `moisture_normal` → 0
/// - moisture ≤ `moisture_warning` → 1
/// - linear in between; values far below `moisture_warning` stay at 1
pub fn moisture_score(moisture: f64, thresholds: &RiskThresholds) -> f64 {
    ramp(
        moisture,
        thresholds.moisture_normal,
        thresholds.moisture_warning,
    )
}

/// Vibration sub-score: 1.0 at or above the event threshold, else 0.0.
///
/// Deliberately a step, not a ramp: 0.999 scores 0 and 1.0 scores 1.
pub fn vibration_score(vibration_raw: f64) -> f64 {
    if vibration_raw >= risk_defaults::VIBRATION_EVENT {
        1.0
    } else {
        0.0
    }
}

/// Weighted composite of the three sub-scores.
///
/// Bounded by `thresholds.weight_sum()`, not clamped. Unchecked: callers
/// that cannot vouch for their inputs should go through [`evaluate`].
pub fn composite_score(reading: &SensorReading, thresholds: &RiskThresholds) -> f64 {
    thresholds.weight_tilt * tilt_score(reading.accel_x, reading.accel_y, thresholds)
        + thresholds.weight_moisture * moisture_score(reading.moisture, thresholds)
        + thresholds.weight_vibration * vibration_score(reading.vibration_raw)
}

/// Map a composite score to a risk level. Boundary scores go to the higher level.
///
/// A NaN score compares false everywhere and therefore classifies as Danger.
pub fn classify(score: f64, thresholds: &RiskThresholds) -> RiskLevel {
    if score < thresholds.risk_normal_max {
        RiskLevel::Normal
    } else if score < thresholds.risk_warning_max {
        RiskLevel::Warning
    } else {
        RiskLevel::Danger
    }
}

/// Validate thresholds, reporting every problem at once.
pub fn validate_thresholds(thresholds: &RiskThresholds) -> Result<(), RiskError> {
    let problems = thresholds.problems();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(RiskError::InvalidConfiguration(problems))
    }
}

/// Reject readings carrying NaN or infinite values in any numeric field.
pub fn validate_reading(reading: &SensorReading) -> Result<(), RiskError> {
    match reading.first_non_finite() {
        Some((field, value)) => Err(RiskError::InvalidReading { field, value }),
        None => Ok(()),
    }
}

/// Score and classify one reading against `thresholds`.
///
/// Validates both inputs. For repeated scoring with one threshold set,
/// build a [`RiskScorer`] once instead.
pub fn evaluate(
    reading: &SensorReading,
    thresholds: &RiskThresholds,
) -> Result<RiskEvaluation, RiskError> {
    RiskScorer::new(*thresholds)?.evaluate(reading)
}

// ============================================================================
// RiskScorer
// ============================================================================

/// A threshold set that has already passed validation.
///
/// Construction is the configuration-load check; `evaluate` only has to
/// check the reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScorer {
    thresholds: RiskThresholds,
}

impl RiskScorer {
    pub fn new(thresholds: RiskThresholds) -> Result<Self, RiskError> {
        validate_thresholds(&thresholds)?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn evaluate(&self, reading: &SensorReading) -> Result<RiskEvaluation, RiskError> {
        validate_reading(reading)?;

        let t = &self.thresholds;
        let tilt = tilt_score(reading.accel_x, reading.accel_y, t);
        let moisture = moisture_score(reading.moisture, t);
        let vibration = vibration_score(reading.vibration_raw);
        let score = t.weight_tilt * tilt + t.weight_moisture * moisture + t.weight_vibration * vibration;

        Ok(RiskEvaluation {
            score,
            level: classify(score, t),
            tilt_magnitude: tilt_magnitude(reading.accel_x, reading.accel_y),
            tilt_score: tilt,
            moisture_score: moisture,
            vibration_score: vibration,
        })
    }

    /// Score an ordered sequence of readings, preserving order.
    pub fn evaluate_all<'a, I>(
        &'a self,
        readings: I,
    ) -> impl Iterator<Item = Result<RiskEvaluation, RiskError>> + 'a
    where
        I: IntoIterator<Item = &'a SensorReading>,
        I::IntoIter: 'a,
    {
        readings.into_iter().map(move |r| self.evaluate(r))
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
