//! Service context bundling the port trait objects a command needs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::recording::RecordingSource;
use crate::cassette::recorder::CassetteRecorder;
use crate::error::{Error, Result};
use crate::ports::{Clock, FileSystem, SnapshotSource};

/// Cassette name written into recordings.
const SESSION_NAME: &str = "sysdelta-session";

/// Bundles the port trait objects shared by every command.
///
/// Constructors wire up different adapter implementations (live, fixed for
/// tests, recording).
pub struct ServiceContext {
    /// Clock for stamping reports.
    pub clock: Arc<dyn Clock>,
    /// Filesystem for local snapshots, reports and diff artifacts.
    pub fs: Arc<dyn FileSystem>,
    record_path: Option<PathBuf>,
    recorder: Mutex<Option<Arc<Mutex<CassetteRecorder>>>>,
}

impl ServiceContext {
    /// Creates a live context with real adapters.
    #[must_use]
    pub fn live() -> Self {
        Self::with_ports(Arc::new(LiveClock), Arc::new(LiveFileSystem))
    }

    /// Creates a live context that records the recorded source's
    /// interactions into a cassette at `path`.
    ///
    /// Nothing is written until [`ServiceContext::finish_recording`].
    #[must_use]
    pub fn recording(path: &Path) -> Self {
        Self { record_path: Some(path.to_path_buf()), ..Self::live() }
    }

    /// Creates a context from explicit ports.
    pub fn with_ports(clock: Arc<dyn Clock>, fs: Arc<dyn FileSystem>) -> Self {
        Self { clock, fs, record_path: None, recorder: Mutex::new(None) }
    }

    /// Wraps `source` in a recording adapter when this context records.
    /// Only the first wrapped source is recorded; later ones pass through.
    pub fn record(&self, source: Box<dyn SnapshotSource>) -> Box<dyn SnapshotSource> {
        let Some(path) = &self.record_path else { return source };
        let Ok(mut slot) = self.recorder.lock() else { return source };
        if slot.is_some() {
            return source;
        }
        let recorder =
            Arc::new(Mutex::new(CassetteRecorder::new(path, SESSION_NAME, source.describe())));
        *slot = Some(Arc::clone(&recorder));
        tracing::info!(source = %source.describe(), cassette = %path.display(), "recording source");
        Box::new(RecordingSource::new(source, recorder))
    }

    /// Writes the cassette if anything was recorded. Returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the cassette cannot be written.
    pub fn finish_recording(&self) -> Result<Option<PathBuf>> {
        let recorder = match self.recorder.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(recorder) = recorder else { return Ok(None) };
        let guard = recorder
            .lock()
            .map_err(|e| Error::io("finishing recording", std::io::Error::other(e.to_string())))?;
        let path = guard.finish().map_err(|e| Error::io("writing cassette", e))?;
        tracing::info!(path = %path.display(), interactions = guard.len(), "recording saved");
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySource;
    use crate::cassette::format::Cassette;
    use tempfile::TempDir;

    #[tokio::test]
    async fn recording_context_writes_cassette_for_first_source() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.yaml");
        let ctx = ServiceContext::recording(&path);

        let recorded = ctx.record(Box::new(InMemorySource::new("remote").with_file("S1", "a.json", b"{}")));
        let passthrough = ctx.record(Box::new(InMemorySource::new("other")));
        recorded.list_snapshot_ids().await.unwrap();
        passthrough.list_snapshot_ids().await.unwrap();

        assert_eq!(ctx.finish_recording().unwrap(), Some(path.clone()));
        let cassette = Cassette::load(&path).unwrap();
        assert_eq!(cassette.source, "remote");
        assert_eq!(cassette.interactions.len(), 1);
    }

    #[test]
    fn live_context_records_nothing() {
        let ctx = ServiceContext::live();
        let source = ctx.record(Box::new(InMemorySource::new("remote")));
        assert_eq!(source.describe(), "remote");
        assert_eq!(ctx.finish_recording().unwrap(), None);
    }
}
