//! Read-only telemetry provider consumed by the replay engine.
//!
//! Storage is not part of this crate. A [`TelemetrySource`] is queried once
//! when a session is created and never from the tick loop.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, SourceError};
use crate::ids::SessionId;
use crate::telemetry::{Channel, DriverInfo, Sample, TelemetrySeries};

/// Provider of recorded per-driver channel data.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Length of the recording in milliseconds.
    async fn duration(&self, session: &SessionId) -> Result<f64, SourceError>;

    /// Driver roster.
    async fn drivers(&self, session: &SessionId) -> Result<Vec<DriverInfo>, SourceError>;

    /// Samples of one driver's channel, `None` when it was not recorded.
    async fn series(
        &self,
        session: &SessionId,
        driver_id: u32,
        channel: Channel,
    ) -> Result<Option<TelemetrySeries>, SourceError>;

    /// Session-wide data. Defaults to empty for sources that only carry
    /// per-driver channels.
    async fn session_info(&self, session: &SessionId) -> Result<SessionInfo, SourceError> {
        let _ = session;
        Ok(SessionInfo::default())
    }

    /// The session finished loading and will not query this source again.
    /// Sources that cache recordings drop them here.
    async fn release(&self, session: &SessionId) {
        let _ = session;
    }

    /// Whether the session can be replayed. Defaults to probing
    /// [`duration`](Self::duration).
    async fn exists(&self, session: &SessionId) -> Result<bool, SourceError> {
        match self.duration(session).await {
            Ok(_) => Ok(true),
            Err(SourceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Data that belongs to the session rather than to one driver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionInfo {
    /// Scheduled race distance in laps.
    pub total_laps: Option<u32>,
    /// Track flag state over time (categorical).
    pub track_status: Option<TelemetrySeries>,
}

/// Serialized form of one recorded session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedSession {
    /// Length of the recording.
    pub duration_ms: f64,
    /// Scheduled race distance in laps.
    #[serde(default)]
    pub total_laps: Option<u32>,
    /// Track flag changes, e.g. `GREEN`, `SC`, `RED`.
    #[serde(default)]
    pub track_status: Vec<Sample>,
    /// Per-driver data.
    #[serde(default)]
    pub drivers: Vec<RecordedDriver>,
}

/// One driver's roster entry and channel samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedDriver {
    /// Roster entry.
    #[serde(flatten)]
    pub info: DriverInfo,
    /// Samples keyed by channel.
    #[serde(default)]
    pub channels: BTreeMap<Channel, Vec<Sample>>,
}

impl RecordedSession {
    /// Check every series and index them for lookup.
    pub fn index(self) -> Result<IndexedSession, CoreError> {
        let mut series = HashMap::new();
        let mut drivers = Vec::with_capacity(self.drivers.len());
        for driver in self.drivers {
            for (channel, samples) in driver.channels {
                let _ = series.insert(
                    (driver.info.driver_id, channel),
                    TelemetrySeries::new(samples)?,
                );
            }
            drivers.push(driver.info);
        }
        let track_status = if self.track_status.is_empty() {
            None
        } else {
            Some(TelemetrySeries::new(self.track_status)?)
        };
        Ok(IndexedSession {
            duration_ms: self.duration_ms.max(0.0),
            drivers,
            info: SessionInfo {
                total_laps: self.total_laps,
                track_status,
            },
            series,
        })
    }
}

/// A validated recording, ready to serve lookups.
#[derive(Clone, Debug, Default)]
pub struct IndexedSession {
    /// Length of the recording.
    pub duration_ms: f64,
    /// Driver roster.
    pub drivers: Vec<DriverInfo>,
    /// Session-wide data.
    pub info: SessionInfo,
    series: HashMap<(u32, Channel), TelemetrySeries>,
}

impl IndexedSession {
    /// Series of one driver's channel.
    pub fn series(&self, driver_id: u32, channel: Channel) -> Option<&TelemetrySeries> {
        self.series.get(&(driver_id, channel))
    }
}

/// Source holding recordings in memory.
#[derive(Default)]
pub struct InMemorySource {
    sessions: RwLock<HashMap<SessionId, Arc<IndexedSession>>>,
}

impl InMemorySource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a recording under `id`, replacing any previous one.
    pub fn insert(&self, id: SessionId, recording: RecordedSession) -> Result<(), CoreError> {
        let indexed = Arc::new(recording.index()?);
        let _ = self.sessions.write().insert(id, indexed);
        Ok(())
    }

    /// Forget a recording. Returns whether it existed.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    fn get(&self, id: &SessionId) -> Result<Arc<IndexedSession>, SourceError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl TelemetrySource for InMemorySource {
    async fn duration(&self, session: &SessionId) -> Result<f64, SourceError> {
        Ok(self.get(session)?.duration_ms)
    }

    async fn drivers(&self, session: &SessionId) -> Result<Vec<DriverInfo>, SourceError> {
        Ok(self.get(session)?.drivers.clone())
    }

    async fn series(
        &self,
        session: &SessionId,
        driver_id: u32,
        channel: Channel,
    ) -> Result<Option<TelemetrySeries>, SourceError> {
        Ok(self.get(session)?.series(driver_id, channel).cloned())
    }

    async fn session_info(&self, session: &SessionId) -> Result<SessionInfo, SourceError> {
        Ok(self.get(session)?.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recording() -> RecordedSession {
        serde_json::from_value(json!({
            "duration_ms": 2000.0,
            "drivers": [{
                "driver_id": 1,
                "driver_code": "VER",
                "team_color": "#3671C6",
                "channels": {
                    "speed": [
                        {"timestamp_ms": 0.0, "value": 0.0},
                        {"timestamp_ms": 1000.0, "value": 100.0}
                    ],
                    "compound": [{"timestamp_ms": 0.0, "value": "SOFT"}]
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn parses_file_format() {
        let rec = recording();
        assert_eq!(rec.drivers.len(), 1);
        assert_eq!(rec.drivers[0].info.driver_code, "VER");
        assert_eq!(rec.drivers[0].channels[&Channel::Speed].len(), 2);
    }

    #[tokio::test]
    async fn session_info_from_recording() {
        let mut rec = recording();
        rec.total_laps = Some(53);
        rec.track_status = vec![Sample::new(0.0, "GREEN"), Sample::new(900.0, "SC")];
        let source = InMemorySource::new();
        let id = SessionId::from_raw("monza");
        source.insert(id.clone(), rec).unwrap();

        let info = source.session_info(&id).await.unwrap();
        assert_eq!(info.total_laps, Some(53));
        assert_eq!(info.track_status.unwrap().len(), 2);
        assert_eq!(recording().index().unwrap().info, SessionInfo::default());
    }

    #[test]
    fn index_rejects_unordered_track_status() {
        let mut rec = recording();
        rec.track_status = vec![Sample::new(10.0, "GREEN"), Sample::new(5.0, "SC")];
        assert!(rec.index().is_err());
    }

    #[test]
    fn index_rejects_unordered_series() {
        let mut rec = recording();
        let _ = rec.drivers[0]
            .channels
            .insert(Channel::X, vec![Sample::new(10.0, 1.0), Sample::new(5.0, 2.0)]);
        assert!(rec.index().is_err());
    }

    #[tokio::test]
    async fn in_memory_serves_lookups() {
        let source = InMemorySource::new();
        let id = SessionId::from_raw("monza");
        source.insert(id.clone(), recording()).unwrap();

        assert_eq!(source.duration(&id).await.unwrap(), 2000.0);
        assert_eq!(source.drivers(&id).await.unwrap()[0].driver_id, 1);
        let speed = source.series(&id, 1, Channel::Speed).await.unwrap().unwrap();
        assert_eq!(speed.len(), 2);
        assert!(source.series(&id, 1, Channel::Gear).await.unwrap().is_none());
        assert!(source.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let source = InMemorySource::new();
        let id = SessionId::from_raw("nope");
        assert_eq!(
            source.duration(&id).await.unwrap_err(),
            SourceError::NotFound("nope".into())
        );
        assert!(!source.exists(&id).await.unwrap());
    }

    #[test]
    fn remove_forgets_recording() {
        let source = InMemorySource::new();
        let id = SessionId::from_raw("a");
        source.insert(id.clone(), recording()).unwrap();
        assert!(source.remove(&id));
        assert!(!source.remove(&id));
    }
}
