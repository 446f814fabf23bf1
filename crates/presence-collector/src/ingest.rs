//! Multicast ingest loop.
//!
//! Receives heartbeats, decodes them and applies them to the registry. A bad
//! datagram is logged and dropped; it never stops the loop or touches other
//! participants' records.

use crate::shutdown::Shutdown;
use presence_core::codec::{self, DecodeError};
use presence_core::protocol::MAX_DATAGRAM_SIZE;
use presence_core::{Registry, UpsertOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Pause after a socket receive error before reading again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Datagrams read from the socket
    pub received: u64,
    /// Datagrams applied to the registry
    pub applied: u64,
    /// Datagrams dropped because they failed to decode
    pub rejected: u64,
    /// Socket receive errors
    pub receive_errors: u64,
}

/// Decode one datagram and apply it to the registry.
pub fn ingest_datagram(registry: &Registry, bytes: &[u8]) -> Result<UpsertOutcome, DecodeError> {
    let event = codec::decode(bytes)?;
    if event.kind.is_unknown() {
        debug!("Participant {} sent unknown kind code {:?}", event.id, event.kind.code());
    }
    Ok(registry.upsert(&event.id, event.kind))
}

/// Reads heartbeats from a socket until shutdown.
pub struct IngestLoop {
    socket: Arc<UdpSocket>,
    registry: Arc<Registry>,
}

impl IngestLoop {
    /// Create a loop over an already-bound socket (normally a joined
    /// multicast socket, but any UDP socket works).
    pub fn new(socket: Arc<UdpSocket>, registry: Arc<Registry>) -> Self {
        Self { socket, registry }
    }

    /// Receive until `shutdown` fires. No timeout: waiting for the next
    /// heartbeat is the normal state.
    pub async fn run(self, mut shutdown: Shutdown) -> IngestStats {
        let mut stats = IngestStats::default();
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    debug!("Ingest loop received shutdown");
                    break;
                }
                result = self.socket.recv_from(&mut buf) => {
                    let (len, source) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            // Per-datagram errors (e.g. ICMP resets) are not fatal
                            stats.receive_errors += 1;
                            warn!("Failed to receive datagram: {}", e);
                            tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                            continue;
                        }
                    };
                    stats.received += 1;

                    match ingest_datagram(&self.registry, &buf[..len]) {
                        Ok(outcome) => {
                            stats.applied += 1;
                            debug!("Heartbeat from {} ({:?}, {} bytes)", source, outcome, len);
                        }
                        Err(e) => {
                            stats.rejected += 1;
                            warn!("Dropping datagram from {}: {}", source, e);
                        }
                    }
                }
            }
        }

        info!(
            "Ingest loop stopped: {} received, {} applied, {} rejected, {} receive error(s)",
            stats.received, stats.applied, stats.rejected, stats.receive_errors
        );
        stats
    }
}
