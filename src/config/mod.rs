//! Site Configuration Module
//!
//! Provides the service configuration loaded from TOML, and the live risk
//! thresholds that the API and the file watcher can change at runtime.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `SINKWATCH_CONFIG` environment variable (path to TOML file)
//! 3. `sinkwatch.toml` in the current working directory
//! 4. Built-in defaults
//!
//! ## Runtime thresholds
//!
//! `AppConfig::risk` only seeds the thresholds. After startup the
//! `ThresholdStore` is authoritative: handlers take a snapshot per request,
//! and edits or reloads swap in a new validated set.
//!
//! ```ignore
//! let loaded = AppConfig::load(cli.config.as_deref())?;
//! let store = Arc::new(ThresholdStore::from_thresholds(loaded.config.risk)?);
//! let level = store.snapshot().evaluate(&reading)?.level;
//! ```

mod app_config;
mod store;
pub mod validation;
pub mod watcher;

pub use app_config::*;
pub use store::*;
pub use validation::ValidationWarning;
