//! Dnsflow - DNS telemetry collector
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config path
//! dnsflow
//!
//! # Explicit config and verbose logging
//! dnsflow --config configs/dnsflow.toml --log-level debug
//! ```
//!
//! SIGINT/SIGTERM stop the pipeline gracefully; SIGHUP re-reads the
//! config file and hot-reloads every worker. A reload that fails to
//! parse or validate is rejected and the running config stays in
//! place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dnsflow_collectors::build_collector;
use dnsflow_config::Config;
use dnsflow_metrics::MetricsReporter;
use dnsflow_pipeline::{RunningTopology, Topology};
use dnsflow_sinks::build_logger;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Cadence of the per-worker metrics log lines
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// DNS telemetry collector pipeline
#[derive(Parser, Debug)]
#[command(name = "dnsflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/dnsflow.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = Arc::new(
        Config::from_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?,
    );
    tracing::info!(
        config = %cli.config.display(),
        collectors = config.collectors.len(),
        loggers = config.loggers.len(),
        "configuration loaded"
    );

    let running = start_pipeline(&config).context("starting pipeline")?;

    let mut reporter = MetricsReporter::new(METRICS_INTERVAL);
    for handle in running.worker_handles() {
        reporter.register(Arc::new(handle));
    }
    let reporter_handle = reporter.handle();
    let reporter_task = tokio::spawn(reporter.run());

    wait_for_signals(&cli.config, &running).await?;

    tracing::info!("shutting down");
    reporter_handle.stop();
    running.shutdown().await;
    let _ = reporter_task.await;
    tracing::info!("bye");
    Ok(())
}

/// Build every declared worker, wire the graph, start it
fn start_pipeline(config: &Arc<Config>) -> Result<RunningTopology> {
    let mut topology = Topology::new(Arc::clone(config));

    for (name, entry) in &config.collectors {
        let worker = build_collector(name, entry, config)
            .with_context(|| format!("building collector `{name}`"))?;
        topology.register(worker)?;
    }
    for (name, entry) in &config.loggers {
        let worker = build_logger(name, entry, config)
            .with_context(|| format!("building logger `{name}`"))?;
        topology.register(worker)?;
    }

    topology.wire().context("wiring topology")?;
    Ok(topology.start())
}

/// Block until a stop signal; handle reload signals in the meantime
#[cfg(unix)]
async fn wait_for_signals(config_path: &std::path::Path, running: &RunningTopology) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = sigterm.recv() => return Ok(()),
            _ = sighup.recv() => {
                tracing::info!(config = %config_path.display(), "reload requested");
                match Config::from_file(config_path) {
                    Ok(new_config) => running.reload(Arc::new(new_config)),
                    Err(e) => {
                        tracing::error!(error = %e, "reload rejected, keeping running config");
                    }
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(_config_path: &std::path::Path, _running: &RunningTopology) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Initialize the tracing subscriber
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {e}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    Ok(())
}
