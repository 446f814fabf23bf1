//! Graceful shutdown handling.
//!
//! A single trigger fans out to every collector task. The signal is
//! level-triggered: tasks that start waiting after the trigger still see it.

use tokio::sync::watch;

/// Owner side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

/// Receiver side, cloned into each task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

/// Create a connected trigger/receiver pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger { sender }, Shutdown { receiver })
}

impl ShutdownTrigger {
    /// Signal every receiver to stop.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

impl Shutdown {
    /// Wait until shutdown is triggered.
    ///
    /// Also returns if the trigger is dropped, since nothing can stop the
    /// task cleanly after that.
    pub async fn wait(&mut self) {
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let (trigger, shutdown) = channel();

        let handle = tokio::spawn({
            let mut shutdown = shutdown.clone();
            async move {
                shutdown.wait().await;
                42
            }
        });

        trigger.trigger();
        let result = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_trigger() {
        let (trigger, shutdown) = channel();
        trigger.trigger();

        let mut late = shutdown.clone();
        timeout(Duration::from_secs(1), late.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_trigger_releases_waiters() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);

        timeout(Duration::from_secs(1), shutdown.wait()).await.unwrap();
    }
}
