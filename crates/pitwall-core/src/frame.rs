//! Per-tick snapshot of every active car.

use serde::{Deserialize, Serialize};

/// Interpolated state of one car at a frame timestamp. Channels the source
/// did not record are `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CarSnapshot {
    /// Numeric driver id.
    pub driver_id: u32,
    /// Three-letter code.
    pub driver_code: String,
    /// Team colour as `#rrggbb`.
    pub team_color: String,
    /// Track x.
    pub x: Option<f64>,
    /// Track y.
    pub y: Option<f64>,
    /// Car speed in km/h.
    pub speed: Option<f64>,
    /// Throttle, percent.
    pub throttle: Option<f64>,
    /// Brake, percent.
    pub brake: Option<f64>,
    /// Distance covered, metres.
    pub distance: Option<f64>,
    /// Gear.
    pub gear: Option<u8>,
    /// Tyre compound.
    pub compound: Option<String>,
    /// DRS flap open.
    pub drs_active: bool,
    /// Race position.
    pub position: Option<u32>,
    /// Lap the car is on.
    pub lap_number: Option<u32>,
    /// Gap to the leader in milliseconds.
    pub gap_to_leader_ms: Option<f64>,
    /// Gap to the car ahead in milliseconds.
    pub interval_ms: Option<f64>,
    /// Direction of travel in degrees, counter-clockwise from the +x axis,
    /// in `[0, 360)`. `None` while the car is not moving.
    pub heading: Option<f64>,
}

/// One snapshot of the session at `timestamp_ms`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Playback position of this frame.
    pub timestamp_ms: f64,
    /// `timestamp_ms` rendered as `HH:MM:SS`.
    pub elapsed_time_str: String,
    /// Lap of the car in first place, when positions are known.
    pub current_lap: Option<u32>,
    /// Scheduled race distance in laps.
    #[serde(default)]
    pub total_laps: Option<u32>,
    /// Replay speed multiplier at the time the frame was built.
    pub speed: f64,
    /// Active cars, ordered by driver id.
    pub cars: Vec<CarSnapshot>,
    /// Track flag state (e.g. `GREEN`, `SC`) at `timestamp_ms`.
    #[serde(default)]
    pub track_status: Option<String>,
}

/// Format milliseconds as `HH:MM:SS`. Negative input reads as zero.
pub fn format_elapsed(ms: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = (ms.max(0.0) / 1000.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
