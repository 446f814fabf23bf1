//! Snapshot query server.
//!
//! One request/response cycle per connection: the client sends any bytes,
//! the server sweeps (if configured), snapshots the registry, writes one JSON
//! array and closes. Each connection runs in its own task and only touches
//! the registry through its public operations.

use crate::config::Config;
use crate::shutdown::Shutdown;
use presence_core::codec::{self, EncodeError};
use presence_core::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Bytes read from the client per request. The content is ignored.
const REQUEST_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// How a single connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Snapshot written; carries the number of records sent
    Answered(usize),
    /// Client closed before sending anything
    ClosedEarly,
    /// Client sent nothing within the request timeout
    TimedOut,
    /// Client stopped reading before the response was fully written
    Stalled,
}

/// Per-query behaviour.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Staleness threshold applied by on-query sweeps
    pub staleness_threshold: Duration,
    /// Sweep before each snapshot
    pub sweep_on_query: bool,
    /// Maximum wait for the client's request, and separately for the
    /// response write
    pub request_timeout: Duration,
}

impl QueryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            staleness_threshold: config.staleness_threshold(),
            sweep_on_query: config.sweep.trigger_on_query,
            request_timeout: config.request_timeout(),
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Answer one query on an accepted connection.
pub async fn serve_query<S>(
    stream: &mut S,
    registry: &Registry,
    options: &QueryOptions,
) -> Result<QueryOutcome, QueryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = [0u8; REQUEST_BUFFER_SIZE];
    match timeout(options.request_timeout, stream.read(&mut request)).await {
        Err(_) => return Ok(QueryOutcome::TimedOut),
        Ok(Ok(0)) => return Ok(QueryOutcome::ClosedEarly),
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e.into()),
    }

    if options.sweep_on_query {
        registry.sweep(options.staleness_threshold);
    }
    let snapshot = registry.snapshot();
    let response = codec::encode_snapshot(&snapshot)?;

    let write = async {
        stream.write_all(&response).await?;
        stream.shutdown().await
    };
    match timeout(options.request_timeout, write).await {
        Err(_) => Ok(QueryOutcome::Stalled),
        Ok(Ok(())) => Ok(QueryOutcome::Answered(snapshot.len())),
        Ok(Err(e)) => Err(e.into()),
    }
}

/// Accepts query connections until shutdown.
pub struct SnapshotServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    options: Arc<QueryOptions>,
}

impl SnapshotServer {
    pub fn new(listener: TcpListener, registry: Arc<Registry>, options: QueryOptions) -> Self {
        Self {
            listener,
            registry,
            options: Arc::new(options),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until `shutdown` fires, then wait for
    /// in-flight queries and drop the listener. Each query is bounded by two
    /// request timeouts, one for the read and one for the write.
    pub async fn run(self, mut shutdown: Shutdown) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    debug!("Query server received shutdown");
                    break;
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let registry = self.registry.clone();
                            let options = self.options.clone();
                            connections.spawn(async move {
                                handle_connection(stream, addr, &registry, &options).await;
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                // Reap finished connection tasks
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Query task failed: {}", e);
                    }
                }
            }
        }

        if !connections.is_empty() {
            debug!("Waiting for {} in-flight query(ies)", connections.len());
        }
        while connections.join_next().await.is_some() {}
        info!("Query server stopped");
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    addr: SocketAddr,
    registry: &Registry,
    options: &QueryOptions,
) {
    debug!("Query connection from {}", addr);

    match serve_query(&mut stream, registry, options).await {
        Ok(QueryOutcome::Answered(count)) => {
            debug!("Sent {} participant(s) to {}", count, addr);
        }
        Ok(QueryOutcome::ClosedEarly) => {
            debug!("Connection from {} closed before sending a request", addr);
        }
        Ok(QueryOutcome::TimedOut) => {
            debug!("Connection from {} timed out waiting for a request", addr);
        }
        Ok(QueryOutcome::Stalled) => {
            warn!("Connection from {} stopped reading, response dropped", addr);
        }
        Err(e) => {
            warn!("Query from {} failed: {}", addr, e);
        }
    }
}
