use anyhow::{Context, Result};
use clap::Parser;
use esptail_cli::agent::{self, Agent};
use esptail_core::{Clock, Config, ConfigHandle, ConfigStore, SystemClock};
use esptail_ingestion::ReaderSource;
use esptail_output::HttpTransport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// esptail - ship an embedded device's serial console to Loki
#[derive(Parser, Debug)]
#[command(name = "esptail")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Console device to read, "-" for stdin (overrides config)
    #[arg(short, long)]
    device: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[cfg(unix)]
fn watch_reloads(store: ConfigStore, handle: ConfigHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!(path = %store.path().display(), "SIGHUP received, reloading configuration");
            if let Err(e) = agent::reload_loki(&store, &handle) {
                warn!(error = %e, "Reload failed, keeping current configuration");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn watch_reloads(_store: ConfigStore, _handle: ConfigHandle) -> Result<()> {
    Ok(())
}

async fn start(
    device: &str,
    config: &Config,
    transport: HttpTransport,
    clock: Arc<dyn Clock>,
    handle: &ConfigHandle,
) -> Result<Agent> {
    if device == "-" {
        info!("Reading console from stdin");
        return Ok(agent::spawn(
            config,
            ReaderSource::stdin(),
            transport,
            clock,
            handle,
        ));
    }

    let source = ReaderSource::open(Path::new(device)).await?;
    Ok(agent::spawn(config, source, transport, clock, handle))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        let config = Config::default();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // A configured store that cannot be loaded aborts startup
    let store = args.config.clone().map(ConfigStore::new);
    let config = match &store {
        Some(store) => store
            .load()
            .with_context(|| format!("Failed to load {}", store.path().display()))?,
        None => Config::default(),
    };

    let level = if args.verbose {
        Level::DEBUG
    } else {
        parse_level(&config.general.log_level)
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    info!(instance = %config.general.instance_name, "Starting esptail");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let synced = agent::wait_for_clock(
        clock.as_ref(),
        config.general.time_sync_retries,
        Duration::from_millis(config.general.time_sync_interval_ms),
    )
    .await;
    if !synced {
        warn!("Clock is not synchronized, timestamps will be wrong");
    }

    let transport = HttpTransport::new()?;
    let handle = ConfigHandle::new(config.loki.clone(), store.clone());
    if let Some(store) = store {
        watch_reloads(store, handle.clone())?;
    }

    let device = args.device.as_deref().unwrap_or(&config.serial.device);
    let running = start(device, &config, transport, clock, &handle).await?;

    let report = running.wait().await?;
    info!(
        lines = report.ingestion.lines,
        enqueued = report.queue.enqueued(),
        dropped = report.queue.dropped(),
        delivered = report.shipper.delivered(),
        rejected = report.shipper.rejected(),
        failed = report.shipper.failed(),
        truncated = report.shipper.truncated(),
        "Processing complete"
    );

    Ok(())
}
