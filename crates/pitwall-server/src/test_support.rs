//! Sources shared by the unit tests of this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pitwall_core::{
    Channel, DriverInfo, InMemorySource, RecordedDriver, RecordedSession, Sample, SessionId,
    SourceError, TelemetrySeries, TelemetrySource,
};

/// One driver, one second of speed samples, served as `monza`.
pub(crate) fn monza_source() -> Arc<InMemorySource> {
    let mut driver = RecordedDriver {
        info: DriverInfo::anonymous(1),
        channels: std::collections::BTreeMap::new(),
    };
    let _ = driver.channels.insert(
        Channel::Speed,
        vec![Sample::new(0.0, 0.0), Sample::new(1000.0, 100.0)],
    );
    let source = InMemorySource::new();
    source
        .insert(
            SessionId::from_raw("monza"),
            RecordedSession {
                duration_ms: 1000.0,
                drivers: vec![driver],
                ..RecordedSession::default()
            },
        )
        .unwrap();
    Arc::new(source)
}

/// `monza`, except that releasing the recording hangs for `delay`.
pub(crate) struct StuckRelease {
    inner: Arc<InMemorySource>,
    delay: Duration,
}

impl StuckRelease {
    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: monza_source(),
            delay,
        })
    }
}

#[async_trait]
impl TelemetrySource for StuckRelease {
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
        tokio::time::sleep(self.delay).await;
    }
}
