//! presence-collector: Joins the heartbeat multicast group, tracks which
//! participants are alive and answers snapshot queries over TCP.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use presence_collector::{Collector, Config};
use presence_core::Registry;

#[derive(Parser, Debug)]
#[command(name = "presence-collector")]
#[command(about = "Heartbeat presence collector")]
struct Args {
    /// Path to a JSON config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Multicast group to join
    #[arg(long)]
    group: Option<Ipv4Addr>,

    /// Multicast port
    #[arg(long)]
    port: Option<u16>,

    /// Address for the query listener
    #[arg(short, long)]
    listen: Option<String>,

    /// Staleness threshold in milliseconds
    #[arg(long)]
    staleness_ms: Option<u64>,

    /// Also sweep every N milliseconds, independent of queries
    #[arg(long)]
    sweep_interval_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut Config) {
        if let Some(group) = self.group {
            config.multicast.group = group;
        }
        if let Some(port) = self.port {
            config.multicast.port = port;
        }
        if let Some(listen) = &self.listen {
            config.query.listen = listen.clone();
        }
        if let Some(staleness) = self.staleness_ms {
            config.staleness_threshold_ms = staleness;
        }
        if let Some(interval) = self.sweep_interval_ms {
            config.sweep.periodic_interval_ms = Some(interval);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,presence_collector=debug"
    } else {
        "info,presence_collector=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting presence-collector");

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        "Multicast group: {}:{}",
        config.multicast.group, config.multicast.port
    );

    let registry = Arc::new(Registry::with_system_clock());
    let collector = Collector::bind(config, registry)
        .await
        .context("Failed to set up collector sockets")?;

    info!("Collector running. Press Ctrl+C to stop.");

    collector
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await;

    Ok(())
}
