//! bacscan
//!
//! Runs the discovery engine against a simulated BACnet network and prints
//! what it found on exit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bacscan::config::DiscoveryConfig;
use bacscan::discovery::{Device, DiscoveryService, TracingSink};
use bacscan::transport::{SimulatedDevice, SimulatedNetwork, delivery_channel};

/// BACnet device discovery
#[derive(Parser, Debug)]
#[command(name = "bacscan")]
#[command(about = "Discover BACnet devices and read their point catalogs", long_about = None)]
struct Args {
    /// Path to a TOML config file (default: ./bacscan.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between Who-Is broadcasts
    #[arg(long)]
    discovery_interval: Option<u64>,

    /// Seconds between status reports
    #[arg(long)]
    report_interval: Option<u64>,

    /// Number of demo devices when the config defines none
    #[arg(long, default_value = "3")]
    simulate: usize,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    run_for: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Print the final device snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bacscan=info")))
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let mut config = DiscoveryConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(interval) = args.discovery_interval {
        config.discovery_interval = interval;
    }
    if let Some(interval) = args.report_interval {
        config.report_interval = interval;
    }
    config.validate().context("Invalid configuration")?;

    if args.print_config {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    info!("Starting bacscan v{}", env!("CARGO_PKG_VERSION"));
    info!(
        name = %config.local_device.object_name,
        instance = config.local_device.object_identifier,
        address = %config.local_device.address,
        "Local device"
    );

    let devices = if config.simulation.devices.is_empty() {
        SimulatedDevice::demo_fleet(args.simulate)
    } else {
        config.simulation.devices.clone()
    };
    info!("Simulated network with {} devices", devices.len());

    let (deliveries_tx, deliveries_rx) = delivery_channel();
    let network = Arc::new(SimulatedNetwork::new(devices, deliveries_tx));
    let service = DiscoveryService::new(&config, network, deliveries_rx, Arc::new(TracingSink));

    service.start().await.context("Failed to start discovery")?;

    match args.run_for {
        Some(seconds) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {
                    info!("Run time elapsed, shutting down...");
                }
                _ = shutdown_signal() => {}
            }
        }
        None => shutdown_signal().await,
    }

    service.stop().await;

    let snapshot = service.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        log_snapshot(&snapshot);
    }

    info!("Shutdown complete");
    Ok(())
}

fn log_snapshot(devices: &[Device]) {
    if devices.is_empty() {
        info!("No devices discovered");
        return;
    }

    info!("Discovered {} devices:", devices.len());
    for device in devices {
        info!(
            "  - Device {} at {} (vendor {}, last seen {}, {} points)",
            device.device_id,
            device.address,
            device.vendor_id,
            device.last_seen.format("%Y-%m-%d %H:%M:%S"),
            device.points.len()
        );
        for point in &device.points {
            info!("      {}", point.identifier());
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
