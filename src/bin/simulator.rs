//! Field Node Simulator
//!
//! Generates synthetic sensor payloads and posts them to a running
//! sinkwatch server, the way a field node would. Scenarios:
//! - `legacy`: the bench-test baseline (wet soil, random vibration)
//! - `stable`: quiet ground, stays NORMAL
//! - `drying`: moisture falls through the warning band
//! - `tilting`: the node leans progressively toward the danger threshold
//! - `collapse`: drying, tilting and frequent vibration together
//!
//! # Usage
//! ```bash
//! ./sinkwatch-simulator --scenario collapse --interval-ms 500 --count 120
//! ./sinkwatch-simulator --scenario drying --dry-run --count 50 --seed 7 > readings.jsonl
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use tracing::{info, warn};

use sinkwatch::types::{Axis3, SensorPayload};
use sinkwatch::RiskLevel;

// ============================================================================
// Site Constants
// ============================================================================

/// Resting gravity on the z axis (m/s²)
const GRAVITY: f64 = 9.8;
/// Moisture of well-drained, stable ground
const STABLE_MOISTURE: f64 = 880.0;
/// Moisture reached at the end of the drying ramp
const DRY_MOISTURE: f64 = 700.0;
/// Planar tilt reached at the end of the tilting ramp
const MAX_TILT: f64 = 9.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Legacy,
    Stable,
    Drying,
    Tilting,
    Collapse,
}

#[derive(Parser, Debug)]
#[command(name = "sinkwatch-simulator")]
#[command(about = "Synthetic field node for sinkwatch testing")]
#[command(version)]
struct Args {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,

    /// Scenario to simulate
    #[arg(long, value_enum, default_value_t = Scenario::Legacy)]
    scenario: Scenario,

    /// Delay between readings in milliseconds
    #[arg(long, default_value_t = 3000)]
    interval_ms: u64,

    /// Stop after this many readings (0 = run until Ctrl+C)
    #[arg(long, default_value_t = 0)]
    count: u64,

    /// Readings over which a scenario ramps from start to end state
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    ramp: u64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Print JSON lines to stdout instead of posting (no delay between readings)
    #[arg(long)]
    dry_run: bool,
}

// ============================================================================
// Payload Generation
// ============================================================================

struct SensorSimulator {
    scenario: Scenario,
    ramp: u64,
    step: u64,
    rng: StdRng,
    /// Random lean direction for tilting scenarios (radians)
    azimuth: f64,
    small_noise: Normal<f64>,
    moisture_noise: Normal<f64>,
}

impl SensorSimulator {
    fn new(scenario: Scenario, ramp: u64, seed: Option<u64>) -> Result<Self> {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let azimuth = rng.gen_range(0.0..std::f64::consts::TAU);
        Ok(Self {
            scenario,
            ramp: ramp.max(1),
            step: 0,
            rng,
            azimuth,
            small_noise: Normal::new(0.0, 0.02).context("invalid noise distribution")?,
            moisture_noise: Normal::new(0.0, 4.0).context("invalid noise distribution")?,
        })
    }

    /// Ramp position in [0, 1].
    fn progress(&self) -> f64 {
        (self.step as f64 / self.ramp as f64).min(1.0)
    }

    fn next_payload(&mut self) -> SensorPayload {
        let payload = match self.scenario {
            Scenario::Legacy => self.legacy_payload(),
            scenario => self.scripted_payload(scenario),
        };
        self.step += 1;
        payload
    }

    /// Uniform bench-test baseline.
    fn legacy_payload(&mut self) -> SensorPayload {
        let rng = &mut self.rng;
        SensorPayload {
            moisture: 450.0 + rng.gen_range(-50.0..150.0),
            accel: Axis3 {
                x: rng.gen_range(-0.1..0.1),
                y: rng.gen_range(-0.1..0.1),
                z: GRAVITY + rng.gen_range(-0.2..0.2),
            },
            gyro: Axis3 {
                x: rng.gen_range(-0.05..0.05),
                y: rng.gen_range(-0.05..0.05),
                z: rng.gen_range(-0.05..0.05),
            },
            vibration_raw: rng.gen_range(0.5..3.5),
            timestamp: Some(Local::now().to_rfc3339()),
        }
    }

    fn scripted_payload(&mut self, scenario: Scenario) -> SensorPayload {
        let p = self.progress();
        let (drying, tilting, vibration_chance) = match scenario {
            Scenario::Drying => (p, 0.0, 0.02),
            Scenario::Tilting => (0.0, p, 0.05),
            Scenario::Collapse => (p, p, 0.05 + 0.75 * p),
            Scenario::Stable | Scenario::Legacy => (0.0, 0.0, 0.02),
        };

        let moisture = STABLE_MOISTURE - drying * (STABLE_MOISTURE - DRY_MOISTURE)
            + self.moisture_noise.sample(&mut self.rng);
        let tilt = tilting * MAX_TILT;
        let (sin, cos) = self.azimuth.sin_cos();
        let vibration_raw = if self.rng.gen_bool(vibration_chance) {
            self.rng.gen_range(1.0..3.5)
        } else {
            self.rng.gen_range(0.1..0.6)
        };

        SensorPayload {
            moisture,
            accel: Axis3 {
                x: tilt * cos + self.small_noise.sample(&mut self.rng),
                y: tilt * sin + self.small_noise.sample(&mut self.rng),
                z: (GRAVITY * GRAVITY - tilt * tilt).max(0.0).sqrt()
                    + self.small_noise.sample(&mut self.rng),
            },
            gyro: Axis3 {
                x: self.small_noise.sample(&mut self.rng),
                y: self.small_noise.sample(&mut self.rng),
                z: self.small_noise.sample(&mut self.rng),
            },
            vibration_raw,
            timestamp: Some(Local::now().to_rfc3339()),
        }
    }
}

// ============================================================================
// Posting
// ============================================================================

/// Reply of `POST /sensor`.
#[derive(Debug, Deserialize)]
struct IngestReply {
    id: u64,
    risk_level: RiskLevel,
    risk_score: f64,
}

async fn post_reading(
    client: &reqwest::Client,
    endpoint: &str,
    payload: &SensorPayload,
) -> Result<IngestReply> {
    let response = client
        .post(endpoint)
        .json(payload)
        .send()
        .await
        .context("request failed")?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("server returned {status}: {body}");
    }
    response.json().await.context("invalid reply body")
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --dry-run output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut simulator = SensorSimulator::new(args.scenario, args.ramp, args.seed)?;

    if args.dry_run {
        let count = if args.count == 0 { args.ramp } else { args.count };
        for _ in 0..count {
            println!("{}", serde_json::to_string(&simulator.next_payload())?);
        }
        return Ok(());
    }

    let endpoint = format!("{}/sensor", args.url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build HTTP client")?;

    info!(
        scenario = ?args.scenario,
        endpoint = %endpoint,
        interval_ms = args.interval_ms,
        seed = ?args.seed,
        "Simulator starting (Ctrl+C to stop)"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut sent = 0u64;
    let mut failed = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
            _ = ticker.tick() => {}
        }

        let payload = simulator.next_payload();
        match post_reading(&client, &endpoint, &payload).await {
            Ok(reply) => {
                sent += 1;
                info!(
                    n = sent,
                    id = reply.id,
                    level = %reply.risk_level,
                    score = %format!("{:.3}", reply.risk_score),
                    moisture = %format!("{:.1}", payload.moisture),
                    vibration = %format!("{:.2}", payload.vibration_raw),
                    "Reading sent"
                );
            }
            Err(e) => {
                failed += 1;
                warn!(error = %format!("{e:#}"), "Failed to send reading");
            }
        }

        if args.count > 0 && sent + failed >= args.count {
            break;
        }
    }

    info!(sent, failed, "Simulator finished");
    Ok(())
}
