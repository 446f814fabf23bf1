//! Collector supervisor.
//!
//! Owns the transport resources and runs the ingest loop, the query server
//! and the optional periodic sweeper against one shared registry.

use crate::config::Config;
use crate::ingest::{IngestLoop, IngestStats};
use crate::server::{QueryOptions, SnapshotServer};
use crate::shutdown;
use crate::sweeper;
use crate::transport::{self, MulticastMembership, TransportError};
use presence_core::Registry;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// A collector whose sockets are bound and ready to run.
pub struct Collector {
    config: Config,
    registry: Arc<Registry>,
    membership: MulticastMembership,
    server: SnapshotServer,
}

impl Collector {
    /// Join the multicast group and open the query listener.
    ///
    /// Any failure here is fatal: the collector does not run without both.
    pub async fn bind(config: Config, registry: Arc<Registry>) -> Result<Self, TransportError> {
        let membership = MulticastMembership::join(
            config.multicast.group,
            config.multicast.port,
            config.multicast.interface,
        )
        .await?;
        let listener = transport::bind_listener(&config.query.listen).await?;
        let server = SnapshotServer::new(listener, registry.clone(), QueryOptions::from_config(&config));

        Ok(Self {
            config,
            registry,
            membership,
            server,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn query_addr(&self) -> std::io::Result<SocketAddr> {
        self.server.local_addr()
    }

    pub fn multicast_addr(&self) -> Result<SocketAddr, TransportError> {
        self.membership.local_addr()
    }

    /// Run until `signal` completes, then stop every task, leave the
    /// multicast group and close the listener.
    pub async fn run_until<F>(self, signal: F) -> IngestStats
    where
        F: Future<Output = ()>,
    {
        let (trigger, shutdown) = shutdown::channel();

        let ingest = IngestLoop::new(self.membership.socket(), self.registry.clone());
        let ingest_task = tokio::spawn(ingest.run(shutdown.clone()));
        let server_task = tokio::spawn(self.server.run(shutdown.clone()));

        let sweeper_task = self.config.sweep.periodic_interval().map(|interval| {
            info!("Periodic sweep every {:?}", interval);
            tokio::spawn(sweeper::run_periodic(
                self.registry.clone(),
                self.config.staleness_threshold(),
                interval,
                shutdown.clone(),
            ))
        });

        info!(
            "Collector running (staleness threshold {:?}, sweep on query: {})",
            self.config.staleness_threshold(),
            self.config.sweep.trigger_on_query
        );

        signal.await;
        info!("Shutting down collector");
        trigger.trigger();

        let stats = match ingest_task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Ingest task failed: {}", e);
                IngestStats::default()
            }
        };
        if let Err(e) = server_task.await {
            warn!("Query server task failed: {}", e);
        }
        if let Some(task) = sweeper_task
            && let Err(e) = task.await
        {
            warn!("Sweeper task failed: {}", e);
        }

        if let Err(e) = self.membership.leave() {
            warn!("{}", e);
        }
        info!("Collector stopped");
        stats
    }
}
