//! Recorded telemetry: channels, samples and time-ordered series.

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// How values of a channel behave between two samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// Continuous signal, linearly interpolated.
    Numeric,
    /// Discrete signal, holds the last value at or before the query time.
    Categorical,
}

/// One telemetry signal recorded per driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Track position, x axis.
    X,
    /// Track position, y axis.
    Y,
    /// Car speed in km/h.
    Speed,
    /// Throttle application, percent.
    Throttle,
    /// Brake application, percent.
    Brake,
    /// Distance covered in the session, metres.
    Distance,
    /// Gap to the race leader in milliseconds.
    GapToLeader,
    /// Gap to the car ahead in milliseconds.
    Interval,
    /// Tyre compound name.
    Compound,
    /// DRS flap open.
    Drs,
    /// Selected gear.
    Gear,
    /// Race position.
    Position,
    /// Current lap number.
    Lap,
}

impl Channel {
    /// Every channel, in frame-field order.
    pub const ALL: [Channel; 13] = [
        Channel::X,
        Channel::Y,
        Channel::Speed,
        Channel::Throttle,
        Channel::Brake,
        Channel::Distance,
        Channel::GapToLeader,
        Channel::Interval,
        Channel::Compound,
        Channel::Drs,
        Channel::Gear,
        Channel::Position,
        Channel::Lap,
    ];

    /// Interpolation behaviour for this channel.
    pub fn kind(self) -> ChannelKind {
        match self {
            Self::X
            | Self::Y
            | Self::Speed
            | Self::Throttle
            | Self::Brake
            | Self::Distance
            | Self::GapToLeader
            | Self::Interval => ChannelKind::Numeric,
            Self::Compound | Self::Drs | Self::Gear | Self::Position | Self::Lap => {
                ChannelKind::Categorical
            }
        }
    }

    /// Wire name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Speed => "speed",
            Self::Throttle => "throttle",
            Self::Brake => "brake",
            Self::Distance => "distance",
            Self::GapToLeader => "gap_to_leader",
            Self::Interval => "interval",
            Self::Compound => "compound",
            Self::Drs => "drs",
            Self::Gear => "gear",
            Self::Position => "position",
            Self::Lap => "lap",
        }
    }
}

/// A recorded value. Numeric channels carry numbers; categorical channels
/// may carry any variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Boolean flag (DRS).
    Flag(bool),
    /// Number.
    Number(f64),
    /// Free text (tyre compound).
    Text(String),
}

impl SampleValue {
    /// Numeric view. Flags read as `0.0` / `1.0`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(_) => None,
        }
    }

    /// Boolean view. Numbers are truthy when positive (DRS is recorded as
    /// an integer state in some feeds).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Number(n) => Some(*n > 0.0),
            Self::Text(_) => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for SampleValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for SampleValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// One recorded point of a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since session start.
    pub timestamp_ms: f64,
    /// Recorded value.
    pub value: SampleValue,
}

impl Sample {
    /// Build a sample.
    pub fn new(timestamp_ms: f64, value: impl Into<SampleValue>) -> Self {
        Self {
            timestamp_ms,
            value: value.into(),
        }
    }
}

/// Strictly time-ordered samples of one driver's channel. Immutable once
/// built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetrySeries {
    samples: Vec<Sample>,
}

impl TelemetrySeries {
    /// Validate ordering and wrap the samples.
    pub fn new(samples: Vec<Sample>) -> Result<Self, CoreError> {
        for (index, sample) in samples.iter().enumerate() {
            if !sample.timestamp_ms.is_finite() {
                return Err(CoreError::NonFiniteTimestamp { index });
            }
            if index > 0 {
                let previous = samples[index - 1].timestamp_ms;
                if sample.timestamp_ms <= previous {
                    return Err(CoreError::UnorderedSamples {
                        index,
                        previous,
                        current: sample.timestamp_ms,
                    });
                }
            }
        }
        Ok(Self { samples })
    }

    /// The samples, oldest first.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the series has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of the first sample.
    pub fn first_timestamp(&self) -> Option<f64> {
        self.samples.first().map(|s| s.timestamp_ms)
    }

    /// Timestamp of the last sample.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.samples.last().map(|s| s.timestamp_ms)
    }
}

/// Static roster entry for one driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    /// Numeric driver id.
    pub driver_id: u32,
    /// Three-letter code, e.g. `VER`.
    pub driver_code: String,
    /// Team colour as `#rrggbb`.
    pub team_color: String,
}

impl DriverInfo {
    /// Roster entry with placeholder code and colour.
    pub fn anonymous(driver_id: u32) -> Self {
        Self {
            driver_id,
            driver_code: format!("D{driver_id}"),
            team_color: "#808080".to_owned(),
        }
    }
}
