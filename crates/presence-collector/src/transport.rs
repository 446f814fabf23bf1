//! Socket setup for the collector.
//!
//! Failures here are fatal at startup: the collector never runs without its
//! multicast membership or its query listener.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv4Addr),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to join multicast group {group} on {interface}: {source}")]
    Join {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to leave multicast group {group}: {source}")]
    Leave {
        group: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    #[error("Connection error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A UDP socket joined to a multicast group.
///
/// Membership is released by [`MulticastMembership::leave`], or on drop if
/// `leave` was never called.
#[derive(Debug)]
pub struct MulticastMembership {
    socket: Arc<UdpSocket>,
    group: Ipv4Addr,
    interface: Ipv4Addr,
    joined: bool,
}

impl MulticastMembership {
    /// Bind `0.0.0.0:port` and join `group` on `interface`.
    pub async fn join(group: Ipv4Addr, port: u16, interface: Ipv4Addr) -> Result<Self> {
        if !group.is_multicast() {
            return Err(TransportError::NotMulticast(group));
        }

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;

        socket
            .join_multicast_v4(group, interface)
            .map_err(|source| TransportError::Join {
                group,
                interface,
                source,
            })?;

        info!("Joined multicast group {} on port {}", group, port);

        Ok(Self {
            socket: Arc::new(socket),
            group,
            interface,
            joined: true,
        })
    }

    /// Shared handle to the joined socket.
    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Leave the group.
    pub fn leave(mut self) -> Result<()> {
        self.joined = false;
        self.socket
            .leave_multicast_v4(self.group, self.interface)
            .map_err(|source| TransportError::Leave {
                group: self.group,
                source,
            })?;
        info!("Left multicast group {}", self.group);
        Ok(())
    }
}

impl Drop for MulticastMembership {
    fn drop(&mut self) {
        if self.joined {
            if let Err(e) = self.socket.leave_multicast_v4(self.group, self.interface) {
                warn!("Failed to leave multicast group {}: {}", self.group, e);
            } else {
                debug!("Left multicast group {} on drop", self.group);
            }
        }
    }
}

/// Bind the point-to-point query listener.
pub async fn bind_listener(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!("Query server listening on {}", addr);
    Ok(listener)
}
