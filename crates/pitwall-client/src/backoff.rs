//! Reconnect backoff.

use std::time::Duration;

use pitwall_settings::ClientSettings;

/// Exponential backoff without jitter: attempt `n` (1-based) waits
/// `min(base * 2^(n-1), max)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Attempts made before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Policy from the `client` settings section.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_attempts: settings.max_attempts,
        }
    }

    /// Delay before attempt `attempt`. Attempt 0 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Whether attempt `attempt` may be made.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_settings(&ClientSettings::default())
    }
}
