//! sinkwatch - Sinkhole Early-Warning Service
//!
//! Receives soil-moisture / tilt / vibration readings from field nodes,
//! classifies each into NORMAL / WARNING / DANGER and serves the results to
//! the monitoring dashboard.
//!
//! # Usage
//!
//! ```bash
//! # Run with ./sinkwatch.toml (or built-in defaults)
//! cargo run --release
//!
//! # Validate a config file and print the effective thresholds
//! sinkwatch --config site.toml check-config
//!
//! # Score one reading without starting the server
//! sinkwatch score --moisture 700 --accel-x 5 --accel-y 3 --vibration 1.2
//! ```
//!
//! # Environment Variables
//!
//! - `SINKWATCH_CONFIG`: Path to the TOML config file
//! - `SINKWATCH_SERVER_ADDR`: Bind address override
//! - `SINKWATCH_CORS_ORIGINS`: Comma-separated allowed dashboard origins
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sinkwatch::config::watcher::{run_config_watcher, ConfigEvent, WatchOptions};
use sinkwatch::config::LoadedConfig;
use sinkwatch::{create_app, AppConfig, AppState, RiskScorer, SensorReading, ThresholdStore};

/// How long tasks get to finish after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sinkwatch")]
#[command(about = "Sinkhole early-warning service: sensor ingestion and risk classification")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides SINKWATCH_CONFIG and ./sinkwatch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the server address (default from config: "0.0.0.0:8000")
    #[arg(short, long, env = "SINKWATCH_SERVER_ADDR")]
    addr: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Load and validate the configuration, then print the effective thresholds
    CheckConfig,

    /// Score one reading with the configured thresholds and print the result as JSON
    Score(ScoreArgs),
}

#[derive(clap::Args, Debug)]
struct ScoreArgs {
    /// Soil moisture raw value
    #[arg(long)]
    moisture: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    accel_x: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    accel_y: f64,
    #[arg(long, default_value_t = 9.8, allow_negative_numbers = true)]
    accel_z: f64,
    /// Vibration sensor raw value
    #[arg(long, default_value_t = 0.0)]
    vibration: f64,
}

// ============================================================================
// Logging
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn check_config(loaded: &LoadedConfig) -> Result<()> {
    let store = ThresholdStore::from_thresholds(loaded.config.risk)
        .context("Risk thresholds are invalid")?;

    println!();
    match &loaded.source {
        Some(path) => println!("  Config: {}", path.display()),
        None => println!("  Config: built-in defaults"),
    }
    println!("  Server: {} (UTC{:+})", loaded.config.server.addr, loaded.config.server.utc_offset_hours);
    println!(
        "  History: {} readings retained, query limit {}, export limit {}",
        loaded.config.history.capacity,
        loaded.config.history.query_limit,
        loaded.config.history.export_limit
    );
    println!();
    println!("  {:>2}  {:<18} {:>10}", "id", "threshold", "value");
    for entry in store.entries() {
        println!("  {:>2}  {:<18} {:>10}", entry.id, entry.name, entry.value);
    }
    println!();
    println!("  Configuration OK");
    println!();
    Ok(())
}

fn score_reading(config: &AppConfig, args: &ScoreArgs) -> Result<()> {
    let scorer = RiskScorer::new(config.risk).context("Risk thresholds are invalid")?;
    let offset = config.server.offset().context("Invalid server.utc_offset_hours")?;
    let reading = SensorReading {
        moisture: args.moisture,
        accel_x: args.accel_x,
        accel_y: args.accel_y,
        accel_z: args.accel_z,
        gyro_x: 0.0,
        gyro_y: 0.0,
        gyro_z: 0.0,
        vibration_raw: args.vibration,
        created_at: Utc::now().with_timezone(&offset),
    };
    let evaluation = scorer.evaluate(&reading).context("Reading cannot be scored")?;

    let mut out = serde_json::to_value(evaluation)?;
    out["level_name"] = serde_json::Value::String(evaluation.level.to_string());
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ConfigWatcher,
    ConfigEvents,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpServer => write!(f, "HttpServer"),
            Self::ConfigWatcher => write!(f, "ConfigWatcher"),
            Self::ConfigEvents => write!(f, "ConfigEvents"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the config file watcher and the task that logs its events.
fn spawn_config_watcher(
    task_set: &mut JoinSet<Result<TaskName>>,
    path: PathBuf,
    store: Arc<ThresholdStore>,
    cancel_token: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel::<ConfigEvent>(8);

    task_set.spawn(async move {
        run_config_watcher(path, store, tx, WatchOptions::default(), cancel_token).await;
        Ok(TaskName::ConfigWatcher)
    });

    // Ends when the watcher drops its sender
    task_set.spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ConfigEvent::Reloaded(changes) if changes.is_empty() => {
                    info!("[ConfigWatcher] Config file changed, thresholds unchanged");
                }
                ConfigEvent::Reloaded(changes) => {
                    for change in &changes {
                        info!("[ConfigWatcher] Threshold {}", change);
                    }
                    info!(count = changes.len(), "[ConfigWatcher] Thresholds reloaded");
                }
                ConfigEvent::Error(e) => {
                    warn!("[ConfigWatcher] Reload rejected: {}", e);
                }
            }
        }
        Ok(TaskName::ConfigEvents)
    });
}

/// Monitor tasks until shutdown or the first failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: Task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Open WebSocket connections can hold the server past the grace period
    let drain = async { while task_set.join_next().await.is_some() {} };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("Supervisor: Tasks still running after {:?}, aborting", SHUTDOWN_GRACE);
        task_set.abort_all();
    }

    Ok(())
}

// ============================================================================
// Server
// ============================================================================

async fn run_server(loaded: LoadedConfig, addr_override: Option<String>) -> Result<()> {
    let config = loaded.config;

    let store = Arc::new(
        ThresholdStore::from_thresholds(config.risk).context("Risk thresholds are invalid")?,
    );
    let state = AppState::new(&config, Arc::clone(&store));
    let app = create_app(state);

    let server_addr = addr_override.unwrap_or_else(|| config.server.addr.clone());
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server_addr))?;

    let t = store.thresholds();
    info!(
        tilt = %format!("{}..{}", t.tilt_normal, t.tilt_danger),
        moisture = %format!("{}..{}", t.moisture_warning, t.moisture_normal),
        bands = %format!("{}/{}", t.risk_normal_max, t.risk_warning_max),
        "Risk thresholds active"
    );
    info!(
        capacity = config.history.capacity,
        utc_offset_hours = config.server.utc_offset_hours,
        "History buffer ready"
    );
    info!("HTTP server listening on {}", server_addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    match loaded.source {
        Some(path) => {
            spawn_config_watcher(&mut task_set, path, Arc::clone(&store), cancel_token.clone());
        }
        None => info!("No config file, threshold hot reload disabled"),
    }

    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let loaded = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match &args.command {
        Some(SubCommand::CheckConfig) => return check_config(&loaded),
        Some(SubCommand::Score(score_args)) => return score_reading(&loaded.config, score_args),
        None => {}
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  sinkwatch - Sinkhole Early-Warning Service v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    run_server(loaded, args.addr).await?;

    info!("sinkwatch shutdown complete");
    Ok(())
}
