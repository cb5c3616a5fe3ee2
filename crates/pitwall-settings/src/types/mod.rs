//! Settings type definitions.
//!
//! JSON keys are camelCase. Every struct is `#[serde(default)]`, so partial
//! documents fill the gaps from [`Default`].

mod replay;
mod server;

pub use replay::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PitwallSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Session engine settings.
    pub replay: ReplaySettings,
    /// Viewer client settings.
    pub client: ClientSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Recording location.
    pub telemetry: TelemetrySettings,
}

impl PitwallSettings {
    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.replay;
        if !(1..=240).contains(&r.tick_rate_hz) {
            return Err(SettingsError::InvalidValue(format!(
                "replay.tickRateHz must be within 1..=240, got {}",
                r.tick_rate_hz
            )));
        }
        if !(r.min_speed.is_finite() && r.max_speed.is_finite()) || r.min_speed <= 0.0 {
            return Err(SettingsError::InvalidValue(
                "replay speed bounds must be finite and positive".into(),
            ));
        }
        if r.min_speed > r.max_speed {
            return Err(SettingsError::InvalidValue(format!(
                "replay.minSpeed ({}) exceeds replay.maxSpeed ({})",
                r.min_speed, r.max_speed
            )));
        }
        for (name, value) in [
            ("replay.outboundQueueCapacity", r.outbound_queue_capacity),
            ("replay.commandQueueCapacity", r.command_queue_capacity),
            ("replay.maxConcurrentSessions", r.max_concurrent_sessions),
        ] {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{name} must be at least 1")));
            }
        }
        if r.max_consecutive_overflows == 0 {
            return Err(SettingsError::InvalidValue(
                "replay.maxConsecutiveOverflows must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_ms == 0
            || self.server.heartbeat_timeout_ms < self.server.heartbeat_interval_ms
        {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutMs must be at least heartbeatIntervalMs".into(),
            ));
        }
        if self.client.base_delay_ms > self.client.max_delay_ms {
            return Err(SettingsError::InvalidValue(
                "client.baseDelayMs exceeds client.maxDelayMs".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PitwallSettings::default().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_speed_bounds() {
        let mut s = PitwallSettings::default();
        s.replay.min_speed = 5.0;
        s.replay.max_speed = 2.0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("minSpeed"));
    }

    #[test]
    fn rejects_tick_rate_out_of_range() {
        let mut s = PitwallSettings::default();
        s.replay.tick_rate_hz = 0;
        assert!(s.validate().is_err());
        s.replay.tick_rate_hz = 241;
        assert!(s.validate().is_err());
        s.replay.tick_rate_hz = 240;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut s = PitwallSettings::default();
        s.replay.outbound_queue_capacity = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("outboundQueueCapacity"));
    }

    #[test]
    fn rejects_timeout_below_interval() {
        let mut s = PitwallSettings::default();
        s.server.heartbeat_timeout_ms = 1_000;
        assert!(s.validate().is_err());
    }

    #[test]
    fn sections_serialize_camel_case() {
        let json = serde_json::to_value(PitwallSettings::default()).unwrap();
        assert_eq!(json["replay"]["tickRateHz"], 30);
        assert_eq!(json["telemetry"]["dataDir"], "data");
    }
}
