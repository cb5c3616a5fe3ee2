//! # pitwall-settings
//!
//! Layered configuration for the replay server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PitwallSettings::default()`]
//! 2. **Settings file**: `~/.pitwall/settings.json` or an explicit path
//! 3. **Environment variables**: `PITWALL_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".pitwall/settings.json"));
    }

    #[test]
    fn re_exports_work() {
        let settings = PitwallSettings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.client.max_attempts, 5);
    }
}
