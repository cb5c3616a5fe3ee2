//! Telemetry source backed by a directory of JSON recordings.
//!
//! Each session is one file, `<data_dir>/<session_id>.json`, in the
//! [`RecordedSession`] format. Files are parsed and validated on first use
//! and cached until the session that loaded them releases them, so memory
//! tracks the running sessions rather than every recording ever opened.
//! Existence checks only stat the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use pitwall_core::{
    Channel, DriverInfo, IndexedSession, RecordedSession, SessionId, SessionInfo, SourceError,
    TelemetrySeries, TelemetrySource,
};
use tracing::{debug, warn};

/// Reads `<dir>/<session_id>.json`.
pub struct JsonDirSource {
    dir: PathBuf,
    cache: RwLock<HashMap<SessionId, Arc<IndexedSession>>>,
}

impl JsonDirSource {
    /// Source rooted at `dir`. The directory is not touched until a lookup.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Recordings currently held in memory.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    /// File for `id`. Ids that could escape the directory are unknown.
    fn path_for(&self, id: &SessionId) -> Result<PathBuf, SourceError> {
        let raw = id.as_str();
        let valid = !raw.is_empty()
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(SourceError::NotFound(raw.to_string()));
        }
        Ok(self.dir.join(format!("{raw}.json")))
    }

    async fn load(&self, id: &SessionId) -> Result<Arc<IndexedSession>, SourceError> {
        let cached = self.cache.read().get(id).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(id.to_string()));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read recording");
                return Err(SourceError::Unavailable(format!("{}: {e}", path.display())));
            }
        };

        let recording: RecordedSession = serde_json::from_slice(&bytes).map_err(|e| {
            SourceError::Unavailable(format!("{}: invalid recording: {e}", path.display()))
        })?;
        let indexed = Arc::new(recording.index().map_err(|e| {
            SourceError::Unavailable(format!("{}: {e}", path.display()))
        })?);
        debug!(
            session_id = %id,
            drivers = indexed.drivers.len(),
            duration_ms = indexed.duration_ms,
            "recording loaded"
        );

        let _ = self
            .cache
            .write()
            .insert(id.clone(), Arc::clone(&indexed));
        Ok(indexed)
    }
}

#[async_trait]
impl TelemetrySource for JsonDirSource {
    async fn duration(&self, session: &SessionId) -> Result<f64, SourceError> {
        Ok(self.load(session).await?.duration_ms)
    }

    async fn drivers(&self, session: &SessionId) -> Result<Vec<DriverInfo>, SourceError> {
        Ok(self.load(session).await?.drivers.clone())
    }

    async fn series(
        &self,
        session: &SessionId,
        driver_id: u32,
        channel: Channel,
    ) -> Result<Option<TelemetrySeries>, SourceError> {
        Ok(self.load(session).await?.series(driver_id, channel).cloned())
    }

    async fn session_info(&self, session: &SessionId) -> Result<SessionInfo, SourceError> {
        Ok(self.load(session).await?.info.clone())
    }

    async fn release(&self, session: &SessionId) {
        if self.cache.write().remove(session).is_some() {
            debug!(session_id = %session, "recording released");
        }
    }

    async fn exists(&self, session: &SessionId) -> Result<bool, SourceError> {
        if self.cache.read().contains_key(session) {
            return Ok(true);
        }
        let Ok(path) = self.path_for(session) else {
            return Ok(false);
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SourceError::Unavailable(format!("{}: {e}", path.display()))),
        }
    }
}
