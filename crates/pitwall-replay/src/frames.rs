//! Frame assembly from a session's loaded telemetry.

use std::collections::HashMap;

use pitwall_core::{
    CarSnapshot, Channel, ChannelKind, DriverInfo, Frame, InitData, SampleValue, SessionId,
    SourceError, TelemetrySeries, TelemetrySource, format_elapsed, numeric_at, value_at,
};
use tracing::debug;

/// Half-width of the window the direction of travel is measured over.
const HEADING_WINDOW_MS: f64 = 100.0;

struct DriverTelemetry {
    info: DriverInfo,
    channels: HashMap<Channel, TelemetrySeries>,
    /// Earliest and latest sample over all channels.
    span: Option<(f64, f64)>,
}

impl DriverTelemetry {
    fn new(info: DriverInfo, channels: HashMap<Channel, TelemetrySeries>) -> Self {
        let span = channels.values().fold(None, |acc: Option<(f64, f64)>, s| {
            match (acc, s.first_timestamp(), s.last_timestamp()) {
                (None, Some(a), Some(b)) => Some((a, b)),
                (Some((lo, hi)), Some(a), Some(b)) => Some((lo.min(a), hi.max(b))),
                (acc, _, _) => acc,
            }
        });
        Self { info, channels, span }
    }

    fn is_active_at(&self, t_ms: f64) -> bool {
        self.span.is_some_and(|(lo, hi)| t_ms >= lo && t_ms <= hi)
    }

    fn value(&self, channel: Channel, t_ms: f64) -> Option<SampleValue> {
        let series = self.channels.get(&channel)?;
        value_at(series, channel.kind(), t_ms)
    }

    fn number(&self, channel: Channel, t_ms: f64) -> Option<f64> {
        self.value(channel, t_ms).and_then(|v| v.as_f64())
    }

    fn count(&self, channel: Channel, t_ms: f64) -> Option<u32> {
        self.number(channel, t_ms).and_then(to_u32)
    }

    /// Direction of the x/y displacement around `t_ms`, in degrees.
    fn heading(&self, t_ms: f64) -> Option<f64> {
        let x = self.channels.get(&Channel::X)?;
        let y = self.channels.get(&Channel::Y)?;
        let (before, after) = (t_ms - HEADING_WINDOW_MS, t_ms + HEADING_WINDOW_MS);
        let dx = numeric_at(x, after)? - numeric_at(x, before)?;
        let dy = numeric_at(y, after)? - numeric_at(y, before)?;
        if dx.hypot(dy) < f64::EPSILON {
            return None;
        }
        Some(dy.atan2(dx).to_degrees().rem_euclid(360.0))
    }

    fn snapshot(&self, t_ms: f64) -> CarSnapshot {
        CarSnapshot {
            driver_id: self.info.driver_id,
            driver_code: self.info.driver_code.clone(),
            team_color: self.info.team_color.clone(),
            x: self.number(Channel::X, t_ms),
            y: self.number(Channel::Y, t_ms),
            speed: self.number(Channel::Speed, t_ms),
            throttle: self.number(Channel::Throttle, t_ms),
            brake: self.number(Channel::Brake, t_ms),
            distance: self.number(Channel::Distance, t_ms),
            gear: self
                .count(Channel::Gear, t_ms)
                .and_then(|g| u8::try_from(g).ok()),
            compound: self.value(Channel::Compound, t_ms).map(label),
            drs_active: self
                .value(Channel::Drs, t_ms)
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            position: self.count(Channel::Position, t_ms),
            lap_number: self.count(Channel::Lap, t_ms),
            gap_to_leader_ms: self.number(Channel::GapToLeader, t_ms),
            interval_ms: self.number(Channel::Interval, t_ms),
            heading: self.heading(t_ms),
        }
    }
}

fn label(value: SampleValue) -> String {
    match value {
        SampleValue::Text(s) => s,
        SampleValue::Number(n) => n.to_string(),
        SampleValue::Flag(b) => b.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u32(v: f64) -> Option<u32> {
    (v.is_finite() && v >= 0.0 && v <= f64::from(u32::MAX)).then(|| v.round() as u32)
}

/// Everything a session needs to build frames, fetched once at creation.
pub struct SessionTelemetry {
    duration_ms: f64,
    total_laps: Option<u32>,
    track_status: Option<TelemetrySeries>,
    drivers: Vec<DriverTelemetry>,
}

impl SessionTelemetry {
    /// Fetch duration, session data, roster and every channel of every driver.
    pub async fn load(
        source: &dyn TelemetrySource,
        session_id: &SessionId,
    ) -> Result<Self, SourceError> {
        let duration_ms = source.duration(session_id).await?;
        let info = source.session_info(session_id).await?;
        let mut roster = source.drivers(session_id).await?;
        roster.sort_by_key(|d| d.driver_id);

        let mut drivers = Vec::with_capacity(roster.len());
        for info in roster {
            let mut channels = HashMap::new();
            for channel in Channel::ALL {
                if let Some(series) = source.series(session_id, info.driver_id, channel).await? {
                    if !series.is_empty() {
                        let _ = channels.insert(channel, series);
                    }
                }
            }
            drivers.push(DriverTelemetry::new(info, channels));
        }
        debug!(%session_id, duration_ms, drivers = drivers.len(), "telemetry loaded");
        Ok(Self {
            duration_ms,
            total_laps: info.total_laps,
            track_status: info.track_status.filter(|s| !s.is_empty()),
            drivers,
        })
    }

    /// Recording length reported by the source.
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Driver roster, ordered by driver id.
    pub fn drivers(&self) -> Vec<DriverInfo> {
        self.drivers.iter().map(|d| d.info.clone()).collect()
    }

    /// Whether any driver has recorded samples.
    pub fn has_telemetry(&self) -> bool {
        self.drivers.iter().any(|d| !d.channels.is_empty())
    }

    /// Payload of the `init` event.
    pub fn init_data(&self, session_id: &SessionId, tick_rate_hz: u32) -> InitData {
        let drivers = self.drivers();
        InitData {
            session_id: session_id.clone(),
            duration_ms: self.duration_ms,
            driver_count: drivers.len(),
            drivers,
            has_telemetry: self.has_telemetry(),
            total_laps: self.total_laps,
            tick_rate_hz,
        }
    }

    /// Snapshot of every driver with samples around `t_ms`.
    pub fn frame_at(&self, t_ms: f64, speed: f64) -> Frame {
        let cars: Vec<CarSnapshot> = self
            .drivers
            .iter()
            .filter(|d| d.is_active_at(t_ms))
            .map(|d| d.snapshot(t_ms))
            .collect();
        let current_lap = cars
            .iter()
            .filter_map(|c| c.position.map(|p| (p, c.lap_number)))
            .min_by_key(|(p, _)| *p)
            .and_then(|(_, lap)| lap);
        let track_status = self
            .track_status
            .as_ref()
            .and_then(|s| value_at(s, ChannelKind::Categorical, t_ms))
            .map(label);
        Frame {
            timestamp_ms: t_ms,
            elapsed_time_str: format_elapsed(t_ms),
            current_lap,
            total_laps: self.total_laps,
            speed,
            cars,
            track_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_core::{InMemorySource, RecordedSession};
    use serde_json::json;

    fn source() -> (InMemorySource, SessionId) {
        let rec: RecordedSession = serde_json::from_value(json!({
            "duration_ms": 2000.0,
            "total_laps": 63,
            "track_status": [
                {"timestamp_ms": 0.0, "value": "GREEN"},
                {"timestamp_ms": 1200.0, "value": "SC"}
            ],
            "drivers": [
                {
                    "driver_id": 44,
                    "driver_code": "HAM",
                    "team_color": "#27F4D2",
                    "channels": {
                        "speed": [
                            {"timestamp_ms": 0.0, "value": 0.0},
                            {"timestamp_ms": 1000.0, "value": 100.0},
                            {"timestamp_ms": 2000.0, "value": 200.0}
                        ],
                        "position": [{"timestamp_ms": 0.0, "value": 2}],
                        "lap": [{"timestamp_ms": 0.0, "value": 4}],
                        "drs": [
                            {"timestamp_ms": 0.0, "value": false},
                            {"timestamp_ms": 1500.0, "value": true}
                        ],
                        "compound": [
                            {"timestamp_ms": 0.0, "value": "MEDIUM"},
                            {"timestamp_ms": 1000.0, "value": "HARD"}
                        ],
                        "gear": [{"timestamp_ms": 0.0, "value": 7}],
                        "x": [
                            {"timestamp_ms": 0.0, "value": 0.0},
                            {"timestamp_ms": 2000.0, "value": 200.0}
                        ],
                        "y": [
                            {"timestamp_ms": 0.0, "value": 50.0},
                            {"timestamp_ms": 2000.0, "value": 50.0}
                        ],
                        "gap_to_leader": [{"timestamp_ms": 0.0, "value": 1200.0}],
                        "interval": [
                            {"timestamp_ms": 0.0, "value": 1200.0},
                            {"timestamp_ms": 2000.0, "value": 800.0}
                        ]
                    }
                },
                {
                    "driver_id": 1,
                    "driver_code": "VER",
                    "team_color": "#3671C6",
                    "channels": {
                        "speed": [
                            {"timestamp_ms": 0.0, "value": 300.0},
                            {"timestamp_ms": 1000.0, "value": 310.0}
                        ],
                        "position": [{"timestamp_ms": 0.0, "value": 1}],
                        "lap": [{"timestamp_ms": 0.0, "value": 5}],
                        "x": [
                            {"timestamp_ms": 0.0, "value": 10.0},
                            {"timestamp_ms": 1000.0, "value": 10.0}
                        ],
                        "y": [
                            {"timestamp_ms": 0.0, "value": 0.0},
                            {"timestamp_ms": 1000.0, "value": 100.0}
                        ]
                    }
                },
                {"driver_id": 99, "driver_code": "RES", "team_color": "#000000"}
            ]
        }))
        .unwrap();
        let src = InMemorySource::new();
        let id = SessionId::from_raw("imola");
        src.insert(id.clone(), rec).unwrap();
        (src, id)
    }

    #[tokio::test]
    async fn loads_sorted_roster() {
        let (src, id) = source();
        let t = SessionTelemetry::load(&src, &id).await.unwrap();
        let ids: Vec<u32> = t.drivers().iter().map(|d| d.driver_id).collect();
        assert_eq!(ids, vec![1, 44, 99]);
        assert!(t.has_telemetry());
        assert_eq!(t.duration_ms(), 2000.0);
    }

    #[tokio::test]
    async fn frame_interpolates_each_car() {
        let (src, id) = source();
        let t = SessionTelemetry::load(&src, &id).await.unwrap();
        let frame = t.frame_at(1500.0, 2.0);
        assert_eq!(frame.timestamp_ms, 1500.0);
        assert_eq!(frame.elapsed_time_str, "00:00:01");
        assert_eq!(frame.speed, 2.0);

        // VER's samples end at 1000ms; only HAM is active.
        assert_eq!(frame.cars.len(), 1);
        let ham = &frame.cars[0];
        assert_eq!(ham.driver_code, "HAM");
        assert_eq!(ham.speed, Some(150.0));
        assert_eq!(ham.compound.as_deref(), Some("HARD"));
        assert!(ham.drs_active);
        assert_eq!(ham.gear, Some(7));
        assert_eq!(ham.x, Some(150.0));
        assert_eq!(ham.y, Some(50.0));
        assert_eq!(ham.gap_to_leader_ms, Some(1200.0));
        assert_eq!(ham.interval_ms, Some(900.0));
    }

    #[tokio::test]
    async fn heading_follows_direction_of_travel() {
        let (src, id) = source();
        let t = SessionTelemetry::load(&src, &id).await.unwrap();
        let frame = t.frame_at(500.0, 1.0);
        let ver = frame.cars.iter().find(|c| c.driver_code == "VER").unwrap();
        let ham = frame.cars.iter().find(|c| c.driver_code == "HAM").unwrap();
        assert_eq!(ham.heading, Some(0.0));
        assert!((ver.heading.unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn stationary_car_has_no_heading() {
        let fixed = |v: f64| TelemetrySeries::new(vec![pitwall_core::Sample::new(0.0, v)]).unwrap();
        let mut channels = HashMap::new();
        let _ = channels.insert(Channel::X, fixed(3.0));
        let _ = channels.insert(Channel::Y, fixed(4.0));
        let car = DriverTelemetry::new(DriverInfo::anonymous(7), channels);
        assert_eq!(car.heading(0.0), None);

        let reverse = TelemetrySeries::new(vec![
            pitwall_core::Sample::new(0.0, 10.0),
            pitwall_core::Sample::new(1000.0, 0.0),
        ])
        .unwrap();
        let mut channels = HashMap::new();
        let _ = channels.insert(Channel::X, reverse);
        let _ = channels.insert(Channel::Y, fixed(4.0));
        let car = DriverTelemetry::new(DriverInfo::anonymous(8), channels);
        assert!((car.heading(500.0).unwrap() - 180.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn track_status_and_total_laps() {
        let (src, id) = source();
        let t = SessionTelemetry::load(&src, &id).await.unwrap();
        let early = t.frame_at(500.0, 1.0);
        assert_eq!(early.track_status.as_deref(), Some("GREEN"));
        assert_eq!(early.total_laps, Some(63));
        let late = t.frame_at(1500.0, 1.0);
        assert_eq!(late.track_status.as_deref(), Some("SC"));
        assert_eq!(t.init_data(&id, 30).total_laps, Some(63));
    }

    #[tokio::test]
    async fn current_lap_follows_leader() {
        let (src, id) = source();
        let t = SessionTelemetry::load(&src, &id).await.unwrap();
        let frame = t.frame_at(500.0, 1.0);
        assert_eq!(frame.cars.len(), 2);
        assert_eq!(frame.current_lap, Some(5));
        assert!(!frame.cars[1].drs_active);
        assert_eq!(frame.cars[1].compound.as_deref(), Some("MEDIUM"));
    }

    #[tokio::test]
    async fn init_payload() {
        let (src, id) = source();
        let t = SessionTelemetry::load(&src, &id).await.unwrap();
        let init = t.init_data(&id, 30);
        assert_eq!(init.driver_count, 3);
        assert_eq!(init.tick_rate_hz, 30);
        assert_eq!(init.session_id, id);
    }

    #[tokio::test]
    async fn recording_without_session_data() {
        let src = InMemorySource::new();
        let id = SessionId::from_raw("bare");
        src.insert(
            id.clone(),
            RecordedSession {
                duration_ms: 10.0,
                ..RecordedSession::default()
            },
        )
        .unwrap();
        let t = SessionTelemetry::load(&src, &id).await.unwrap();
        let frame = t.frame_at(5.0, 1.0);
        assert_eq!(frame.total_laps, None);
        assert_eq!(frame.track_status, None);
        assert!(frame.cars.is_empty());
        assert!(!t.has_telemetry());
    }

    #[tokio::test]
    async fn unknown_session_fails_to_load() {
        let src = InMemorySource::new();
        let err = SessionTelemetry::load(&src, &SessionId::from_raw("x"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn count_conversion() {
        assert_eq!(to_u32(3.0), Some(3));
        assert_eq!(to_u32(-1.0), None);
        assert_eq!(to_u32(f64::NAN), None);
    }
}
