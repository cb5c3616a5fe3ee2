//! Sources and helpers shared by the unit tests of this crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pitwall_core::{
    Channel, DriverInfo, InMemorySource, RecordedDriver, RecordedSession, Sample, SessionId,
    SourceError, TelemetrySeries, TelemetrySource,
};
use serde_json::Value;

use crate::connection::Connection;
use crate::session::SessionConfig;

/// Driver `D1` with speed samples `(0,0) (1000,100) (2000,200)`.
pub(crate) fn speed_recording() -> RecordedSession {
    let mut driver = RecordedDriver {
        info: DriverInfo {
            driver_id: 1,
            driver_code: "D1".into(),
            team_color: "#FF0000".into(),
        },
        channels: std::collections::BTreeMap::new(),
    };
    let _ = driver.channels.insert(
        Channel::Speed,
        vec![
            Sample::new(0.0, 0.0),
            Sample::new(1000.0, 100.0),
            Sample::new(2000.0, 200.0),
        ],
    );
    RecordedSession {
        duration_ms: 2000.0,
        drivers: vec![driver],
        ..RecordedSession::default()
    }
}

pub(crate) fn speed_source(id: &SessionId) -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    source.insert(id.clone(), speed_recording()).unwrap();
    Arc::new(source)
}

pub(crate) fn speed_session() -> (Arc<dyn TelemetrySource>, SessionId) {
    let id = SessionId::from_raw("d1-session");
    (speed_source(&id), id)
}

pub(crate) fn test_config() -> SessionConfig {
    SessionConfig::default()
}

/// Source that always fails.
pub(crate) struct FailingSource;

#[async_trait]
impl TelemetrySource for FailingSource {
    async fn duration(&self, _: &SessionId) -> Result<f64, SourceError> {
        Err(SourceError::Unavailable("disk offline".into()))
    }

    async fn drivers(&self, _: &SessionId) -> Result<Vec<DriverInfo>, SourceError> {
        Err(SourceError::Unavailable("disk offline".into()))
    }

    async fn series(
        &self,
        _: &SessionId,
        _: u32,
        _: Channel,
    ) -> Result<Option<TelemetrySeries>, SourceError> {
        Err(SourceError::Unavailable("disk offline".into()))
    }
}

/// Source whose duration lookup takes `delay`, then succeeds or fails.
pub(crate) struct SlowSource {
    inner: Arc<InMemorySource>,
    delay: Duration,
    fail: bool,
}

impl SlowSource {
    pub(crate) fn new(delay: Duration) -> (Arc<dyn TelemetrySource>, SessionId) {
        Self::build(delay, false)
    }

    pub(crate) fn failing(delay: Duration) -> (Arc<dyn TelemetrySource>, SessionId) {
        Self::build(delay, true)
    }

    fn build(delay: Duration, fail: bool) -> (Arc<dyn TelemetrySource>, SessionId) {
        let id = SessionId::from_raw("slow-session");
        let source = Self {
            inner: speed_source(&id),
            delay,
            fail,
        };
        (Arc::new(source), id)
    }
}

#[async_trait]
impl TelemetrySource for SlowSource {
    async fn duration(&self, session: &SessionId) -> Result<f64, SourceError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(SourceError::Unavailable("timed out".into()));
        }
        self.inner.duration(session).await
    }

    async fn drivers(&self, session: &SessionId) -> Result<Vec<DriverInfo>, SourceError> {
        self.inner.drivers(session).await
    }

    async fn series(
        &self,
        session: &SessionId,
        driver_id: u32,
        channel: Channel,
    ) -> Result<Option<TelemetrySeries>, SourceError> {
        self.inner.series(session, driver_id, channel).await
    }

    async fn exists(&self, session: &SessionId) -> Result<bool, SourceError> {
        self.inner.exists(session).await
    }
}

/// Source that counts how often sessions release it.
pub(crate) struct ReleaseCounter {
    inner: Arc<InMemorySource>,
    pub(crate) releases: AtomicUsize,
}

impl ReleaseCounter {
    pub(crate) fn new() -> (Arc<Self>, SessionId) {
        let id = SessionId::from_raw("counted-session");
        let source = Self {
            inner: speed_source(&id),
            releases: AtomicUsize::new(0),
        };
        (Arc::new(source), id)
    }
}

#[async_trait]
impl TelemetrySource for ReleaseCounter {
    async fn duration(&self, session: &SessionId) -> Result<f64, SourceError> {
        self.inner.duration(session).await
    }

    async fn drivers(&self, session: &SessionId) -> Result<Vec<DriverInfo>, SourceError> {
        self.inner.drivers(session).await
    }

    async fn series(
        &self,
        session: &SessionId,
        driver_id: u32,
        channel: Channel,
    ) -> Result<Option<TelemetrySeries>, SourceError> {
        self.inner.series(session, driver_id, channel).await
    }

    async fn release(&self, _: &SessionId) {
        let _ = self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Next event queued for `conn`, parsed. Panics after ten (virtual) seconds.
pub(crate) async fn next_event(conn: &Connection) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(10), conn.next_outbound())
        .await
        .expect("timed out waiting for event")
        .expect("connection closed");
    serde_json::from_str(&msg).unwrap()
}

/// Skip events until one of type `kind` arrives.
pub(crate) async fn drain_until(conn: &Connection, kind: &str) -> Value {
    loop {
        let ev = next_event(conn).await;
        if ev["type"] == kind {
            return ev;
        }
    }
}
