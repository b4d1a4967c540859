//! `marcs-monitor`: connect to the rover and log what it reports.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use marcs_link::{
    Connector, Link, LinkConfig, NoDetections, ProcNetWireless, ReplayConnector, UpdateRate,
};

#[derive(Debug, Parser)]
#[command(name = "marcs-monitor", version, about = "Monitor the MARCS rover stream")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "MARCS_CONFIG")]
    config: Option<PathBuf>,

    /// Rover address, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Rover port, overrides the configuration
    #[arg(long)]
    port: Option<u16>,

    /// Replay a recorded stream capture instead of connecting
    #[arg(long, value_name = "FILE", conflicts_with_all = ["host", "port"])]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!(error = %e, "marcs-monitor failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> marcs_link::Result<()> {
    let mut config = match &args.config {
        Some(path) => LinkConfig::load(path)?,
        None => LinkConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;

    let connector: Arc<dyn Connector> = match &args.replay {
        Some(path) => Arc::new(ReplayConnector::new(path)),
        None => Arc::new(config.tcp_connector()),
    };
    let rssi = Arc::new(ProcNetWireless::new(config.wireless_interface.clone()));
    let link = Link::new(config, connector, Arc::new(NoDetections), rssi);
    let state = link.state();

    let mut statuses = state.status_changes();
    let mut frames = state.video_frames(UpdateRate::Max(1));
    let mut batteries = state.battery_updates();
    let mut signal = state.signal_updates();

    link.start();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            Some(status) = statuses.next() => {
                info!(%status, "connection status");
                if status.is_terminal() {
                    break;
                }
            }
            Some(frame) = frames.next() => {
                info!(width = frame.width(), height = frame.height(), "video frame");
            }
            Some(battery) = batteries.next() => {
                info!(voltage = battery.voltage, percentage = battery.percentage, "battery");
            }
            Some(level) = signal.next() => info!(?level, "signal"),
        }
    }

    if let Some(summary) = link.shutdown().await {
        info!(?summary, "monitor finished");
    }
    Ok(())
}
