//! presence-emitter: Announces one participant on the heartbeat multicast
//! group until stopped.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use presence_core::{Kind, protocol};
use presence_emitter::Emitter;

#[derive(Parser, Debug)]
#[command(name = "presence-emitter")]
#[command(about = "Broadcast presence heartbeats")]
struct Args {
    /// Instrument to announce (piano, trumpet, flute, violin, drum)
    instrument: Kind,

    /// Participant id (a random UUID when omitted)
    #[arg(long)]
    id: Option<String>,

    /// Multicast group to send to
    #[arg(long, default_value_t = protocol::MULTICAST_GROUP)]
    group: Ipv4Addr,

    /// Destination port
    #[arg(long, default_value_t = protocol::PORT)]
    port: u16,

    /// Heartbeat interval in milliseconds
    #[arg(long, default_value_t = protocol::HEARTBEAT_INTERVAL.as_millis() as u64)]
    interval_ms: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "debug,presence_emitter=debug"
    } else {
        "info,presence_emitter=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    anyhow::ensure!(args.interval_ms > 0, "--interval-ms must be greater than zero");

    let target = SocketAddr::V4(SocketAddrV4::new(args.group, args.port));
    let emitter = match args.id {
        Some(id) => Emitter::new(id, args.instrument, target),
        None => Emitter::with_random_id(args.instrument, target),
    };

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .context("Failed to bind emitter socket")?;
    info!("Participant id: {}", emitter.id());

    emitter
        .run(&socket, Duration::from_millis(args.interval_ms), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await;

    Ok(())
}
