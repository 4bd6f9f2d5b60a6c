//! Runtime configuration.
//!
//! Every section has defaults, so an empty file (or no file at all) is a valid
//! configuration. The region name and port are slipstream's own: the simulator's
//! native region and relay port carry a different snapshot format.
//!
//! ```yaml
//! local:
//!   region_name: "$Slipstream"
//!   poll_interval_ms: 16
//! network:
//!   bind_address: "0.0.0.0"
//!   port: 10110
//! history:
//!   teleport_threshold: 50.0
//! relative:
//!   max_entries: 7
//! ```

use crate::history::HistoryConfig;
use crate::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_REGION_NAME: &str = "$Slipstream";
pub const DEFAULT_PORT: u16 = 10110;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub local: LocalConfig,
    pub network: NetworkConfig,
    pub feed: FeedConfig,
    pub history: HistoryConfig,
    pub relative: RelativeConfig,
    pub relay: RelayConfig,
}

impl Config {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::config_error("YAML configuration", e.to_string()))
    }

    /// Load a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| TelemetryError::io_error(path, e))?;
        debug!(path = %path.display(), bytes = yaml.len(), "Loaded configuration file");
        Self::from_yaml_str(&yaml).map_err(|e| match e {
            TelemetryError::Config { details, .. } => {
                TelemetryError::config_error(path.display().to_string(), details)
            }
            other => other,
        })
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| TelemetryError::config_error("YAML configuration", e.to_string()))
    }
}

/// Shared memory feed settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalConfig {
    /// Region name. On non-Windows hosts a name containing `/` is a file path.
    pub region_name: String,
    pub poll_interval_ms: u64,
}

impl LocalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self { region_name: DEFAULT_REGION_NAME.to_string(), poll_interval_ms: 16 }
    }
}

/// UDP feed settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub bind_address: IpAddr,
    /// 0 picks an ephemeral port
    pub port: u16,
    /// Pause after a receive error
    pub error_backoff_ms: u64,
}

impl NetworkConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            error_backoff_ms: 100,
        }
    }
}

/// Feed task settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// How long `stop()` waits for the feed task before aborting it
    pub stop_timeout_ms: u64,
}

impl FeedConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { stop_timeout_ms: 5_000 }
    }
}

/// Relative board settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelativeConfig {
    /// Rows on the board, player included
    pub max_entries: usize,
    /// Cars ahead further than this get their rows handed to cars behind
    pub gap_threshold_secs: f64,
}

impl Default for RelativeConfig {
    fn default() -> Self {
        Self { max_entries: 7, gap_threshold_secs: 10.0 }
    }
}

/// UDP relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub target: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { target: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT) }
    }
}
