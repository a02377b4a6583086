//! CLI entry point for the filterbank directory monitor.
//!
//! Two modes:
//! - `run`: the long-lived daemon. Scans, extracts, and publishes on the
//!   configured interval until terminated.
//! - `once`: a single cycle, printing the resulting snapshot. Useful as an
//!   operator smoke test of configuration, filesystem layout, and store
//!   connectivity; exits non-zero if the cycle fails.
//!
//! Startup failures (bad configuration, store unreachable) are fatal here;
//! once the daemon loop is running, all cycle errors are logged and retried.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::error;
use tracing_subscriber::EnvFilter;

use filterbank_monitor::config::MonitorConfig;
use filterbank_monitor::monitor::BandpassMonitor;
use filterbank_monitor::store::RedisStore;

#[derive(Parser)]
#[command(name = "filterbank-monitor")]
#[command(about = "Bandpass monitor for beamformed filterbank recordings", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config/monitor.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor daemon.
    Run,
    /// Run a single cycle and print the published snapshot.
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = MonitorConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    config.validate().map_err(|reason| anyhow::anyhow!(reason))?;

    init_tracing(&config);

    let store = RedisStore::connect(&config.store.url, &config.store.key_namespace)
        .await
        .with_context(|| format!("connecting to store at {}", config.store.url))?;
    let monitor = BandpassMonitor::new(config, Arc::new(store));

    match cli.command {
        Commands::Run => run_daemon(monitor).await,
        Commands::Once => run_once(monitor).await,
    }
}

async fn run_daemon(monitor: BandpassMonitor) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to listen for shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    monitor.run(shutdown_rx).await;
    Ok(())
}

async fn run_once(monitor: BandpassMonitor) -> anyhow::Result<()> {
    let snapshot = monitor.run_cycle().await?;
    println!("directory:  {}", snapshot.directory);
    for (label, beam) in [
        ("coherent", &snapshot.coherent),
        ("incoherent", &snapshot.incoherent),
    ] {
        let stats = beam.bandpass.channels();
        let mean_range = stats
            .iter()
            .map(|c| c.mean)
            .fold((f32::MAX, f32::MIN), |(lo, hi), m| (lo.min(m), hi.max(m)));
        println!(
            "{label}:  {} ({} channels, mean {:.2}..{:.2})",
            beam.file_name,
            stats.len(),
            mean_range.0,
            mean_range.1,
        );
    }
    Ok(())
}

fn init_tracing(config: &MonitorConfig) {
    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
