//! presence-emitter: Periodically announces a participant on the heartbeat
//! multicast group.

use presence_core::Kind;
use presence_core::codec;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A participant announcing itself.
#[derive(Debug, Clone)]
pub struct Emitter {
    id: String,
    kind: Kind,
    target: SocketAddr,
}

impl Emitter {
    pub fn new(id: impl Into<String>, kind: Kind, target: SocketAddr) -> Self {
        Self {
            id: id.into(),
            kind,
            target,
        }
    }

    /// Create an emitter with a fresh random id.
    pub fn with_random_id(kind: Kind, target: SocketAddr) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), kind, target)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Encoded heartbeat datagram.
    pub fn heartbeat(&self) -> Vec<u8> {
        codec::encode_heartbeat(&self.id, &self.kind)
    }

    /// Send one heartbeat.
    pub async fn send_once(&self, socket: &UdpSocket) -> std::io::Result<()> {
        let payload = self.heartbeat();
        socket.send_to(&payload, self.target).await?;
        debug!("Sent heartbeat {} bytes to {}", payload.len(), self.target);
        Ok(())
    }

    /// Send a heartbeat immediately and then every `interval` until `stop`
    /// completes. Send failures are logged and retried on the next tick.
    /// Returns the number of heartbeats sent.
    pub async fn run<F>(&self, socket: &UdpSocket, interval: Duration, stop: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(stop);

        info!(
            "Emitting {} ({}) to {} every {:?}",
            self.id, self.kind, self.target, interval
        );

        let mut sent = 0;
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    match self.send_once(socket).await {
                        Ok(()) => sent += 1,
                        Err(e) => warn!("Failed to send heartbeat to {}: {}", self.target, e),
                    }
                }
            }
        }

        info!("Emitter {} stopped after {} heartbeat(s)", self.id, sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::codec::decode;

    #[test]
    fn test_heartbeat_payload() {
        let target: SocketAddr = "239.255.22.5:2205".parse().unwrap();
        let emitter = Emitter::new("m-1", Kind::Violin, target);

        let event = decode(&emitter.heartbeat()).unwrap();
        assert_eq!(event.id, "m-1");
        assert_eq!(event.kind, Kind::Violin);
    }

    #[test]
    fn test_random_ids_differ() {
        let target: SocketAddr = "239.255.22.5:2205".parse().unwrap();
        let a = Emitter::with_random_id(Kind::Piano, target);
        let b = Emitter::with_random_id(Kind::Piano, target);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 36);
    }

    #[tokio::test]
    async fn test_run_sends_on_interval() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let emitter = Emitter::new("m-1", Kind::Drum, receiver.local_addr().unwrap());

        let sent = emitter
            .run(
                &sender,
                Duration::from_millis(20),
                tokio::time::sleep(Duration::from_millis(70)),
            )
            .await;
        assert!(sent >= 2, "expected at least two heartbeats, got {sent}");

        let mut buf = [0u8; 256];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(decode(&buf[..len]).unwrap().id, "m-1");
    }
}
