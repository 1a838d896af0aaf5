//! sinkwatch: Sinkhole Early-Warning Service
//!
//! Scores soil-moisture / tilt / vibration readings from field nodes into a
//! sinkhole risk level and serves them to a monitoring dashboard.
//!
//! ## Architecture
//!
//! - **Risk**: pure weighted scoring of one reading against explicit thresholds
//! - **Config**: TOML site configuration, live threshold store, file hot reload
//! - **Storage**: bounded in-memory history of scored readings
//! - **API**: ingestion, history, CSV export, threshold editor, live WebSocket feed

pub mod api;
pub mod config;
pub mod risk;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{AppConfig, ConfigError, ThresholdStore};

// Re-export commonly used types
pub use types::{
    RiskEvaluation, RiskLevel, RiskThresholds, SensorPayload, SensorReading, SensorRecord,
    ThresholdField, ThresholdOverrides,
};

// Re-export scoring
pub use risk::{evaluate, RiskError, RiskScorer};

// Re-export API entry points
pub use api::{create_app, AppState};
