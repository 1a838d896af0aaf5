//! Sinkhole Risk Scoring
//!
//! Deterministic, weighted risk classification of a single sensor reading.
//! This is the only place the scoring rules live: ingestion, history
//! re-scoring and threshold previews all call into it.
//!
//! # Scoring Algorithm
//!
//! Three sub-scores, each in `[0, 1]`:
//! - **Tilt** (weight 0.5): planar accel magnitude `sqrt(x² + y²)`, linear
//!   ramp from `tilt_normal` (0) to `tilt_danger` (1)
//! - **Moisture** (weight 0.3): inverted ramp, `moisture_normal` (0) down
//!   to `moisture_warning` (1)
//! - **Vibration** (weight 0.2): step at 1.0, treated as an event rather
//!   than a continuous signal
//!
//! The composite is the weighted sum, classified half-open:
//! `[0, risk_normal_max)` Normal, `[risk_normal_max, risk_warning_max)`
//! Warning, `[risk_warning_max, ∞)` Danger. A score exactly on a boundary
//! lands in the higher bucket.
//!
//! Thresholds are always an explicit argument; nothing here reads global state.

mod scorer;

pub use scorer::*;

use thiserror::Error;

/// Scoring failures. Both are caller or configuration errors, never transient.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// A reading field is NaN or infinite
    #[error("invalid reading: {field} is not a finite number (got {value})")]
    InvalidReading { field: &'static str, value: f64 },

    /// Thresholds are degenerate (empty ramp, negative weight, non-finite value)
    #[error("invalid risk configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),
}
