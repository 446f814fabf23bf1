//! Collector configuration.
//!
//! Loaded from an optional JSON file; every field has a default matching the
//! shared protocol constants, so an empty `{}` is a valid config.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use presence_core::protocol;
use serde::{Deserialize, Serialize};

/// Main configuration for the collector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Multicast group membership
    #[serde(default)]
    pub multicast: MulticastConfig,

    /// Point-to-point query listener
    #[serde(default)]
    pub query: QueryConfig,

    /// Maximum silence before a participant expires (milliseconds)
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold_ms: u64,

    /// When sweeps run
    #[serde(default)]
    pub sweep: SweepPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MulticastConfig {
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Local interface to join on (0.0.0.0 lets the OS choose)
    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_port(),
            interface: default_interface(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Address the query server listens on
    #[serde(default = "default_listen")]
    pub listen: String,

    /// How long to wait for a client's request before closing (milliseconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Sweep triggering policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SweepPolicy {
    /// Sweep before answering each query
    #[serde(default = "default_true")]
    pub trigger_on_query: bool,

    /// Also sweep on a fixed interval (milliseconds), if set
    #[serde(default)]
    pub periodic_interval_ms: Option<u64>,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            trigger_on_query: true,
            periodic_interval_ms: None,
        }
    }
}

impl SweepPolicy {
    pub fn periodic_interval(&self) -> Option<Duration> {
        self.periodic_interval_ms.map(Duration::from_millis)
    }
}

fn default_group() -> Ipv4Addr {
    protocol::MULTICAST_GROUP
}

fn default_port() -> u16 {
    protocol::PORT
}

fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_listen() -> String {
    format!("127.0.0.1:{}", protocol::PORT)
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_staleness_threshold() -> u64 {
    protocol::STALENESS_THRESHOLD.as_millis() as u64
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            multicast: MulticastConfig::default(),
            query: QueryConfig::default(),
            staleness_threshold_ms: default_staleness_threshold(),
            sweep: SweepPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            tracing::info!("No config file given, using defaults");
            return Ok(Config::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject values the collector cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.multicast.group.is_multicast(),
            "multicast.group {} is not a multicast address",
            self.multicast.group
        );
        ensure!(
            self.staleness_threshold_ms > 0,
            "staleness_threshold_ms must be greater than zero"
        );
        ensure!(
            self.query.request_timeout_ms > 0,
            "query.request_timeout_ms must be greater than zero"
        );
        if let Some(interval) = self.sweep.periodic_interval_ms {
            ensure!(
                interval > 0,
                "sweep.periodic_interval_ms must be greater than zero"
            );
        }
        Ok(())
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.staleness_threshold_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.query.request_timeout_ms)
    }
}
