//! Application configuration - server, history, live feed and risk thresholds
//!
//! Every section and field has a default, so an empty file (or no file)
//! is a working configuration and any subset of keys may be given.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::RiskThresholds;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SINKWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sinkwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one monitoring site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server and site clock
    #[serde(default)]
    pub server: ServerConfig,

    /// In-memory reading history
    #[serde(default)]
    pub history: HistoryConfig,

    /// Live push to WebSocket subscribers
    #[serde(default)]
    pub live: LiveConfig,

    /// Risk scoring thresholds (hot-reloadable)
    #[serde(default)]
    pub risk: RiskThresholds,
}

/// A loaded config together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// `None` when running on built-in defaults
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration using the standard search order:
    /// 1. `explicit` path (the `--config` flag)
    /// 2. `$SINKWATCH_CONFIG`
    /// 3. `./sinkwatch.toml`
    /// 4. Built-in defaults
    ///
    /// A file that exists but is invalid is an error, never a silent fallback:
    /// starting with defaults would score readings against the wrong thresholds.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded config from --config");
            return Ok(LoadedConfig {
                config,
                source: Some(path.to_path_buf()),
            });
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&env_path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                return Ok(LoadedConfig {
                    config,
                    source: Some(p),
                });
            }
            warn!(path = %env_path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded config from ./{}", DEFAULT_CONFIG_FILE);
            return Ok(LoadedConfig {
                config,
                source: Some(local),
            });
        }

        info!("No {}, using built-in defaults", DEFAULT_CONFIG_FILE);
        Ok(LoadedConfig {
            config: Self::default(),
            source: None,
        })
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration, collecting every error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = self
            .risk
            .problems()
            .into_iter()
            .map(|p| format!("risk.{p}"))
            .collect();

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error ({}): {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server and site clock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Overridden by `SINKWATCH_SERVER_ADDR` or `--addr`.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Site UTC offset in whole hours. Naive node timestamps, history
    /// range queries and CSV export use this clock.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

fn default_server_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_utc_offset_hours() -> i32 {
    9
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl ServerConfig {
    /// The site offset; `None` when `utc_offset_hours` is out of range.
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours.checked_mul(3600)?)
    }
}

// ============================================================================
// History Config
// ============================================================================

/// In-memory history sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum readings retained; the oldest are evicted first.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,

    /// Maximum records returned by `/api/history`.
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,

    /// Maximum rows written by the CSV export.
    #[serde(default = "default_export_limit")]
    pub export_limit: usize,
}

fn default_history_capacity() -> usize {
    50_000
}
fn default_query_limit() -> usize {
    200
}
fn default_export_limit() -> usize {
    10_000
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            query_limit: default_query_limit(),
            export_limit: default_export_limit(),
        }
    }
}

// ============================================================================
// Live Feed Config
// ============================================================================

/// Live push configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Per-subscriber backlog before a slow client starts missing updates.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
