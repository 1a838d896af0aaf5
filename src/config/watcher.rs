//! Polling-based config file watcher.
//!
//! Checks the config file's mtime every 2 seconds. When a change is detected,
//! debounces for 500ms (to handle partial writes from editors), then reloads
//! the `[risk]` section into the `ThresholdStore` and reports the result on
//! an mpsc channel.
//!
//! Only thresholds are hot-reloaded. Bind address, history sizing and the
//! site offset take effect on restart. A reload replaces the whole threshold
//! set, including any values edited through the API since the last load.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{AppConfig, ThresholdChange, ThresholdStore};

/// Events emitted by the config watcher.
#[derive(Debug)]
pub enum ConfigEvent {
    /// Thresholds were reloaded with these changes (may be empty).
    Reloaded(Vec<ThresholdChange>),
    /// Reload was attempted but failed (previous thresholds remain active).
    Error(String),
}

/// Watcher timing.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Interval between mtime checks
    pub poll_interval: Duration,
    /// Delay after a detected change before re-checking (editors write in stages)
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            debounce: Duration::from_millis(500),
        }
    }
}

/// Re-read `path` and swap its `[risk]` section into `store`.
///
/// The whole file must parse and validate; otherwise nothing changes.
pub fn reload_thresholds(
    path: &Path,
    store: &ThresholdStore,
) -> Result<Vec<ThresholdChange>, String> {
    let config = AppConfig::load_from_file(path).map_err(|e| e.to_string())?;
    store.replace(config.risk).map_err(|e| e.to_string())
}

/// Run the config file watcher loop.
///
/// Polls `path` for mtime changes and reloads thresholds when detected.
/// Sends events on `tx`. Returns when the channel is closed or `cancel` fires.
pub async fn run_config_watcher(
    path: PathBuf,
    store: Arc<ThresholdStore>,
    tx: mpsc::Sender<ConfigEvent>,
    options: WatchOptions,
    cancel: CancellationToken,
) {
    tracing::info!(path = %path.display(), "Config watcher started");

    let mut last_mtime = get_mtime(&path);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Config watcher cancelled");
                return;
            }
            _ = tokio::time::sleep(options.poll_interval) => {}
        }

        // If we can't read mtime (file deleted, permissions), warn and keep polling
        let Some(current) = get_mtime(&path) else {
            if last_mtime.is_some() {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not accessible, keeping current thresholds and retrying"
                );
                last_mtime = None;
            }
            continue;
        };

        // A reappearing file counts as a change
        let changed = last_mtime.map_or(true, |prev| current != prev);
        if !changed {
            continue;
        }

        tokio::time::sleep(options.debounce).await;
        if get_mtime(&path) != Some(current) {
            // Still being written; pick it up on the next poll
            continue;
        }
        last_mtime = Some(current);

        let event = match reload_thresholds(&path, &store) {
            Ok(changes) => ConfigEvent::Reloaded(changes),
            Err(e) => {
                tracing::error!(error = %e, "Config hot-reload failed, keeping previous thresholds");
                ConfigEvent::Error(e)
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Config watcher channel closed, stopping");
            return;
        }
    }
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThresholdField;

    fn write(path: &Path, contents: &str) {
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_reload_applies_risk_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sinkwatch.toml");
        write(&path, "[risk]\ntilt_danger = 9.0\n");

        let store = ThresholdStore::default();
        let changes = reload_thresholds(&path, &store).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, ThresholdField::TiltDanger);
        assert_eq!(store.thresholds().tilt_danger, 9.0);
    }

    #[test]
    fn test_invalid_reload_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sinkwatch.toml");
        write(&path, "[risk]\nrisk_normal_max = 0.7\nrisk_warning_max = 0.6\n");

        let store = ThresholdStore::default();
        assert!(reload_thresholds(&path, &store).is_err());
        assert_eq!(store.thresholds().risk_normal_max, 0.3);
    }

    #[tokio::test]
    async fn test_watcher_picks_up_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sinkwatch.toml");
        write(&path, "[risk]\ntilt_normal = 6.0\n");

        let store = Arc::new(ThresholdStore::default());
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let options = WatchOptions {
            poll_interval: Duration::from_millis(50),
            debounce: Duration::from_millis(20),
        };
        let handle = tokio::spawn(run_config_watcher(
            path.clone(),
            Arc::clone(&store),
            tx,
            options,
            cancel.clone(),
        ));

        // Make sure the new mtime differs on coarse-grained filesystems
        tokio::time::sleep(Duration::from_millis(1100)).await;
        write(&path, "[risk]\ntilt_normal = 5.5\n");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher should report within timeout")
            .expect("channel open");
        match event {
            ConfigEvent::Reloaded(changes) => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].new, 5.5);
            }
            ConfigEvent::Error(e) => panic!("unexpected reload error: {e}"),
        }
        assert_eq!(store.thresholds().tilt_normal, 5.5);

        cancel.cancel();
        handle.await.unwrap();
    }
}
