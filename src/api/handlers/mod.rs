//! API route handlers
//!
//! Request handling logic for all endpoints:
//! - Sensor ingestion and latest reading
//! - History queries and CSV export
//! - Threshold listing, editing and preview
//! - Live WebSocket feed and health check

mod history;
mod live;
mod sensor;
mod status;
mod thresholds;

pub use history::*;
pub use live::*;
pub use sensor::*;
pub use status::*;
pub use thresholds::*;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::config::{AppConfig, ThresholdStore};
use crate::storage::ReadingHistory;

// ============================================================================
// API State
// ============================================================================

/// Per-request settings fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct ApiSettings {
    /// Site clock for naive timestamps, history windows and CSV export
    pub offset: FixedOffset,
    /// Maximum records returned by `/api/history`
    pub query_limit: usize,
    /// Maximum rows written by `/api/history/csv`
    pub export_limit: usize,
}

impl ApiSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            offset: config.server.offset().unwrap_or_else(|| Utc.fix()),
            query_limit: config.history.query_limit,
            export_limit: config.history.export_limit,
        }
    }
}

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Authoritative risk thresholds
    pub thresholds: Arc<ThresholdStore>,
    /// Scored reading history
    pub history: Arc<ReadingHistory>,
    /// Fan-out to WebSocket subscribers
    pub live: LiveFeed,
    pub settings: ApiSettings,
    pub started_at: Instant,
}

impl AppState {
    /// Build fresh state for a validated config around an existing threshold store.
    pub fn new(config: &AppConfig, thresholds: Arc<ThresholdStore>) -> Self {
        Self {
            thresholds,
            history: Arc::new(ReadingHistory::new(config.history.capacity)),
            live: LiveFeed::new(config.live.channel_capacity),
            settings: ApiSettings::from_config(config),
            started_at: Instant::now(),
        }
    }

    /// Current time on the site clock.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.settings.offset)
    }
}
