use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

mod config;
mod console;
mod error;
mod models;
mod monitor;
mod notify;
mod probe;
mod registry;
mod status_log;
mod throttle;

use crate::config::{MonitorConfig, DEFAULT_CONFIG_PATH};
use crate::monitor::Monitor;
use crate::probe::HttpProbe;
use crate::registry::EndpointRegistry;

#[derive(Parser, Debug)]
#[command(name = "site-monitor", version, about = "Watch HTTP endpoints and alert when they go down")]
struct Args {
    /// Endpoints to monitor. `http://` is assumed when no scheme is given.
    endpoints: Vec<String>,

    /// JSON config file. Defaults to monitor.json when present.
    #[arg(short, long, env = "MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// File with one endpoint per line.
    #[arg(long)]
    sites_file: Option<PathBuf>,

    /// File receiving unhealthy status lines.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seconds between check cycles.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Minimum seconds between alerts for the same endpoint.
    #[arg(long)]
    alert_interval: Option<u64>,

    /// Per-check timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

impl Args {
    fn load_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                MonitorConfig::load(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => MonitorConfig::default(),
        };

        if let Some(path) = &self.sites_file {
            config.sites_file = path.clone();
        }
        if let Some(path) = &self.log_file {
            config.log_file = path.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.alert_interval {
            config.alert_interval_secs = secs;
        }
        if let Some(secs) = self.timeout {
            config.probe_timeout_secs = secs;
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    console::setup();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config().context("Invalid monitor configuration")?;

    let file_lines = registry::read_sites_file(&config.sites_file).unwrap_or_default();
    let registry = EndpointRegistry::build(args.endpoints, file_lines);
    info!(endpoints = registry.len(), log_file = %config.log_file.display(), "endpoint registry built");

    let probe = HttpProbe::new().context("Failed to create HTTP client")?;
    let notifiers = notify::from_config(&config.channels)
        .context("Failed to set up notification channels")?;
    if notifiers.is_empty() {
        warn!("no notification channels configured, unhealthy endpoints will only be logged");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut monitor = Monitor::new(&config, registry, Arc::new(probe), notifiers);
    let outcome = monitor.run(shutdown_rx).await;
    info!(?outcome, "monitor stopped");

    Ok(())
}
