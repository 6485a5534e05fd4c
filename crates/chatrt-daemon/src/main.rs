//! Runtime binary: constructs a configured subset of chat-integration
//! adapters, wires a shared health monitor and alert manager across them,
//! and runs until a shutdown signal.
//!
//! Grounded on the teacher's `conductor-daemon` binary: logging init via
//! `tracing_subscriber`'s `EnvFilter`, `anyhow::Context`-wrapped startup
//! errors, and a `tokio::select!` over `ctrl_c`/SIGTERM that tears the
//! running state down before returning. This binary listens on no socket
//! of its own (no UI-surface concept survives the transformation), so it
//! omits the teacher's PID-file and Unix-socket bookkeeping and keeps only
//! the construct-then-run shape and signal handling.

mod cli;
mod config;
mod wiring;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use chatrt_health::{AlertManager, HealthMonitor};

use crate::cli::Cli;
use crate::config::{self, DaemonConfig};
use crate::wiring::now_ms;

const ALERT_EVALUATION_INTERVAL: Duration = Duration::from_secs(5);

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("invalid --log-level/RUST_LOG directive")?;
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    info!(pid = std::process::id(), "starting chatrt-daemon");

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };

    let platforms = match &cli.platforms {
        Some(names) => names.iter().map(|name| config::parse_platform(name)).collect::<Result<Vec<_>>>()?,
        None => config.configured_platforms(),
    };
    if platforms.is_empty() {
        anyhow::bail!("no platforms to start: pass --platforms or add a section to --config");
    }

    let health_monitor = Arc::new(HealthMonitor::new(config.health.collector_config()));
    let mut alert_manager = AlertManager::new();
    for rule in config.health.alert_rules().context("parsing [[health.rules]]")? {
        alert_manager.add_rule(rule);
    }

    let (adapters, personas) = wiring::build_adapters(&mut config, &platforms, cli.data_dir.as_deref())
        .context("constructing configured adapters")?;

    for entry in &adapters {
        wiring::wire_health(&health_monitor, entry.platform, &entry.adapter);
    }

    wiring::connect_all(&adapters).await;

    let alert_task = {
        let health_monitor = Arc::clone(&health_monitor);
        tokio::spawn(async move { run_alert_loop(health_monitor, alert_manager).await })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, disconnecting adapters");

    alert_task.abort();
    wiring::shutdown_all(&adapters, &personas).await;

    info!("chatrt-daemon stopped");
    Ok(())
}

/// Periodically snapshots every registered platform's health metrics and
/// evaluates alert rules against them, logging every fire/resolve
/// transition. Runs until aborted on shutdown.
async fn run_alert_loop(health_monitor: Arc<HealthMonitor>, mut alert_manager: AlertManager) {
    let mut ticker = tokio::time::interval(ALERT_EVALUATION_INTERVAL);
    loop {
        ticker.tick().await;
        let now = now_ms();
        for (platform, snapshot) in health_monitor.snapshot_all(now) {
            for event in alert_manager.evaluate(platform, &snapshot, now) {
                match event.state {
                    chatrt_health::AlertState::Firing => {
                        warn!(rule = %event.rule_id, %platform, severity = ?event.severity, "alert firing");
                    }
                    chatrt_health::AlertState::Resolved => {
                        info!(rule = %event.rule_id, %platform, "alert resolved");
                    }
                }
            }
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}
