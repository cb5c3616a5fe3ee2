//! Replay engine and viewer-client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session engine tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplaySettings {
    /// Ticks per second of every session's clock.
    pub tick_rate_hz: u32,
    /// Slowest accepted speed multiplier.
    pub min_speed: f64,
    /// Fastest accepted speed multiplier.
    pub max_speed: f64,
    /// How long a session with no viewers survives.
    pub idle_grace_ms: u64,
    /// Interval of the idle-session sweep.
    pub gc_interval_ms: u64,
    /// Outbound messages buffered per viewer before the oldest is dropped.
    pub outbound_queue_capacity: usize,
    /// Consecutive overflowing sends before a viewer is pruned.
    pub max_consecutive_overflows: u32,
    /// Commands buffered per session.
    pub command_queue_capacity: usize,
    /// Sessions that may run at once.
    pub max_concurrent_sessions: usize,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            min_speed: 0.1,
            max_speed: 20.0,
            idle_grace_ms: 30_000,
            gc_interval_ms: 5_000,
            outbound_queue_capacity: 64,
            max_consecutive_overflows: 32,
            command_queue_capacity: 64,
            max_concurrent_sessions: 100,
        }
    }
}

impl ReplaySettings {
    /// Wall-clock time between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    /// Idle grace period as a [`Duration`].
    pub fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }

    /// Sweep interval as a [`Duration`].
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
}

/// Reconnect and heartbeat behaviour of the viewer client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// First reconnect delay.
    pub base_delay_ms: u64,
    /// Upper bound on any reconnect delay.
    pub max_delay_ms: u64,
    /// Reconnect attempts before giving up.
    pub max_attempts: u32,
    /// Interval between client pings.
    pub heartbeat_interval_ms: u64,
    /// Unanswered pings that force a reconnect.
    pub max_missed_heartbeats: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
            heartbeat_interval_ms: 10_000,
            max_missed_heartbeats: 3,
        }
    }
}
