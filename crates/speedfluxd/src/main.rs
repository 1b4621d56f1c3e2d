//! speedfluxd — the Speedflux collector daemon.
//!
//! Assembles the collector from its parts and runs it until a shutdown
//! signal arrives:
//! - Settings (file, environment, flags)
//! - InfluxDB client and startup health check
//! - System probe runner (`speedtest`, `ping`)
//! - Writer with bounded retry
//! - Dual-interval scheduler
//!
//! # Usage
//!
//! ```text
//! INFLUX_DB_TOKEN=... speedfluxd --speedtest-interval 600 --ping-targets 1.1.1.1,9.9.9.9
//! ```

mod cli;

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use speedflux_core::{LogLevel, Settings};
use speedflux_probe::SystemProbeRunner;
use speedflux_scheduler::{Pipeline, Scheduler};
use speedflux_writer::{InfluxClient, RetryPolicy, WriteError, Writer};

use crate::cli::{Cli, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli::resolve_settings(&cli).context("invalid configuration")?;

    init_tracing(settings.log_level, cli.log_format);

    run(settings).await
}

/// `RUST_LOG` wins; otherwise the configured level applies to everything.
fn init_tracing(level: LogLevel, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        namespace = ?settings.namespace(),
        speedtest_interval = settings.bandwidth.interval_secs,
        ping_interval = settings.latency.interval_secs,
        "speedflux collector starting"
    );

    // ── Initialize collaborators ───────────────────────────────

    let client = Arc::new(InfluxClient::new(&settings.store).context("store client")?);
    check_store(&client, &settings.store.url).await?;

    let probe = Arc::new(SystemProbeRunner::from_settings(&settings.latency));
    let writer = Writer::new(client, RetryPolicy::from_settings(&settings.write));
    let pipeline = Pipeline::from_settings(&settings, probe, writer);
    let scheduler = Scheduler::from_settings(&settings, pipeline)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await?;

    info!("speedflux collector stopped");
    Ok(())
}

/// An unreachable store is fatal; an unhealthy one is only reported.
async fn check_store(client: &InfluxClient, url: &str) -> anyhow::Result<()> {
    match client.health().await {
        Ok(health) if health.is_pass() => {
            info!(%url, version = ?health.version, bucket = client.bucket(), "store is healthy");
        }
        Ok(health) => {
            error!(%url, status = %health.status, message = ?health.message, "store reports unhealthy status");
        }
        Err(WriteError::Connection(e)) => bail!("cannot reach store at {url}: {e}"),
        Err(e) => warn!(%url, error = %e, "could not read store health"),
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
}
