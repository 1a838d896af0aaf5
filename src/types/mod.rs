//! Shared data structures for sinkhole risk monitoring
//!
//! - `SensorPayload` / `SensorReading`: what the field node sends, flattened
//! - `RiskThresholds` / `ThresholdOverrides` / `ThresholdField`: scoring configuration
//! - `RiskLevel` / `RiskEvaluation`: scoring output
//! - `SensorRecord`: scored reading as stored and broadcast

mod reading;
pub mod thresholds;

pub use reading::*;
pub use thresholds::*;

use serde::{Deserialize, Serialize};

/// Result of scoring one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskEvaluation {
    /// Weighted composite score (bounded by the weight sum)
    pub score: f64,
    /// Discrete classification of `score`
    pub level: RiskLevel,
    /// Planar (x, y) acceleration magnitude
    pub tilt_magnitude: f64,
    pub tilt_score: f64,
    pub moisture_score: f64,
    pub vibration_score: f64,
}
