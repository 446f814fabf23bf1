//! presence-collector library: Exposes the collector components for the
//! binary and for integration tests.

pub mod collector;
pub mod config;
pub mod ingest;
pub mod server;
pub mod shutdown;
pub mod sweeper;
pub mod transport;

// Re-export key types for convenience
pub use collector::Collector;
pub use config::{Config, SweepPolicy};
pub use ingest::{IngestLoop, IngestStats, ingest_datagram};
pub use server::{QueryOptions, QueryOutcome, SnapshotServer, serve_query};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use transport::{MulticastMembership, TransportError};
