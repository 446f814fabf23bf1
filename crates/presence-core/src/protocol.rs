//! Protocol constants shared by every emitter and the collector.

use std::net::Ipv4Addr;
use std::time::Duration;

/// Well-known multicast group heartbeats are sent to.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 22, 5);

/// Port used both for the multicast group and the query listener.
pub const PORT: u16 = 2205;

/// How often an emitter sends a heartbeat.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);

/// Silence allowed before a participant is considered gone.
pub const STALENESS_THRESHOLD: Duration = Duration::from_millis(5000);

/// Largest datagram the collector will read. Anything longer is truncated
/// by the OS and fails to decode.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;
