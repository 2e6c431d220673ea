//! In-memory adapters for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::ports::{DiffSink, FetchError, FileEntry, SinkError, SnapshotSource, SourceFuture};

/// Sink that discards every artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiffSink for NoopSink {
    fn write(&self, _snapshot_id: &str, _file_name: &str, _payload: &Value) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink that keeps every artifact in a map keyed by `(snapshot, file)`.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<BTreeMap<(String, String), Value>>,
}

impl MemorySink {
    /// Snapshot of everything written so far.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<(String, String), Value> {
        self.entries.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

impl DiffSink for MemorySink {
    fn write(&self, snapshot_id: &str, file_name: &str, payload: &Value) -> Result<(), SinkError> {
        let mut entries = self.entries.lock().map_err(|e| SinkError {
            snapshot_id: snapshot_id.to_string(),
            file_name: file_name.to_string(),
            reason: e.to_string(),
        })?;
        entries.insert((snapshot_id.to_string(), file_name.to_string()), payload.clone());
        Ok(())
    }
}

/// What an [`InMemorySource`] answers for one file.
#[derive(Debug, Clone)]
enum Stored {
    Bytes(Vec<u8>),
    Failing(FetchError),
}

#[derive(Debug, Clone, Default)]
struct StoredSnapshot {
    files: BTreeMap<String, Stored>,
    listing_error: Option<FetchError>,
}

/// Snapshot source serving a fixed set of files, with optional failures.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    name: String,
    snapshots: BTreeMap<String, StoredSnapshot>,
    id_listing_error: Option<FetchError>,
}

impl InMemorySource {
    /// An empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Adds a file.
    #[must_use]
    pub fn with_file(mut self, snapshot_id: &str, file_name: &str, content: &[u8]) -> Self {
        self.snapshot(snapshot_id).files.insert(file_name.to_string(), Stored::Bytes(content.to_vec()));
        self
    }

    /// Makes fetching one file fail. The file is still listed.
    #[must_use]
    pub fn with_file_error(mut self, snapshot_id: &str, file_name: &str, error: FetchError) -> Self {
        self.snapshot(snapshot_id).files.insert(file_name.to_string(), Stored::Failing(error));
        self
    }

    /// Makes listing one snapshot's files fail.
    #[must_use]
    pub fn with_listing_error(mut self, snapshot_id: &str, error: FetchError) -> Self {
        self.snapshot(snapshot_id).listing_error = Some(error);
        self
    }

    /// Makes listing snapshot ids fail.
    #[must_use]
    pub fn with_id_listing_error(mut self, error: FetchError) -> Self {
        self.id_listing_error = Some(error);
        self
    }

    fn snapshot(&mut self, snapshot_id: &str) -> &mut StoredSnapshot {
        self.snapshots.entry(snapshot_id.to_string()).or_default()
    }

    fn stored(&self, snapshot_id: &str) -> Result<&StoredSnapshot, FetchError> {
        self.snapshots.get(snapshot_id).ok_or_else(|| {
            FetchError::status(404, format!("snapshot {snapshot_id} not found"))
        })
    }
}

impl SnapshotSource for InMemorySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn list_snapshot_ids(&self) -> SourceFuture<'_, Vec<String>> {
        let result = match &self.id_listing_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.snapshots.keys().cloned().collect()),
        };
        Box::pin(async move { result })
    }

    fn list_files(&self, snapshot_id: &str) -> SourceFuture<'_, Vec<FileEntry>> {
        let result = self.stored(snapshot_id).and_then(|snapshot| {
            if let Some(error) = &snapshot.listing_error {
                return Err(error.clone());
            }
            Ok(snapshot
                .files
                .iter()
                .map(|(name, stored)| FileEntry {
                    name: name.clone(),
                    size: match stored {
                        Stored::Bytes(bytes) => bytes.len() as u64,
                        Stored::Failing(_) => 0,
                    },
                })
                .collect())
        });
        Box::pin(async move { result })
    }

    fn get_file_content(&self, snapshot_id: &str, file_name: &str) -> SourceFuture<'_, Vec<u8>> {
        let result = self.stored(snapshot_id).and_then(|snapshot| match snapshot.files.get(file_name) {
            Some(Stored::Bytes(bytes)) => Ok(bytes.clone()),
            Some(Stored::Failing(error)) => Err(error.clone()),
            None => Err(FetchError::status(404, format!("file {file_name} not found"))),
        });
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FetchErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn serves_files_and_failures() {
        let source = InMemorySource::new("mem")
            .with_file("S1", "a.json", b"{}")
            .with_file_error("S1", "b.json", FetchError::new(FetchErrorKind::Timeout, "slow"));
        assert_eq!(source.list_snapshot_ids().await.unwrap(), ["S1"]);
        let files = source.list_files("S1").await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(source.get_file_content("S1", "a.json").await.unwrap(), b"{}");
        let err = source.get_file_content("S1", "b.json").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Timeout);
        let err = source.list_files("S9").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NotFound);
    }

    #[test]
    fn memory_sink_keeps_last_write_per_key() {
        let sink = MemorySink::default();
        sink.write("S1", "a.json", &json!(1)).unwrap();
        sink.write("S1", "a.json", &json!(2)).unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[&("S1".to_string(), "a.json".to_string())], json!(2));
    }
}
