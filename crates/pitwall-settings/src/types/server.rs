//! Network, logging and telemetry-location settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP / WebSocket listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Interval between server pings on each viewer socket.
    pub heartbeat_interval_ms: u64,
    /// A viewer silent for this long is disconnected.
    pub heartbeat_timeout_ms: u64,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Budget for stopping the listener and every session on shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            heartbeat_interval_ms: 15_000,
            heartbeat_timeout_ms: 45_000,
            max_message_size: 64 * 1024,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl ServerSettings {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Heartbeat timeout as a [`Duration`].
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Shutdown budget as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Where recorded sessions are read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetrySettings {
    /// Directory holding one `<session_id>.json` per recording.
    pub data_dir: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}
