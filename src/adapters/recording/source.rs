//! Recording adapter for the `SnapshotSource` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::format::encode_bytes;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{FileEntry, SnapshotSource, SourceFuture};

/// Port name used for snapshot source interactions.
pub const PORT: &str = "source";

/// Records every source interaction while delegating to an inner source.
pub struct RecordingSource {
    inner: Box<dyn SnapshotSource>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSource {
    /// Wraps `inner`, recording into `recorder`.
    pub fn new(inner: Box<dyn SnapshotSource>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct NoInput {}

#[derive(Serialize)]
struct SnapshotInput<'a> {
    snapshot_id: &'a str,
}

#[derive(Serialize)]
struct FileInput<'a> {
    snapshot_id: &'a str,
    file_name: &'a str,
}

impl SnapshotSource for RecordingSource {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn list_snapshot_ids(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(async move {
            let result = self.inner.list_snapshot_ids().await;
            record_result(&self.recorder, PORT, "list_snapshot_ids", &NoInput {}, &result);
            result
        })
    }

    fn list_files(&self, snapshot_id: &str) -> SourceFuture<'_, Vec<FileEntry>> {
        let snapshot_id = snapshot_id.to_string();
        Box::pin(async move {
            let result = self.inner.list_files(&snapshot_id).await;
            let input = SnapshotInput { snapshot_id: &snapshot_id };
            record_result(&self.recorder, PORT, "list_files", &input, &result);
            result
        })
    }

    fn get_file_content(&self, snapshot_id: &str, file_name: &str) -> SourceFuture<'_, Vec<u8>> {
        let snapshot_id = snapshot_id.to_string();
        let file_name = file_name.to_string();
        Box::pin(async move {
            let result = self.inner.get_file_content(&snapshot_id, &file_name).await;
            let encoded = result.as_ref().map(|bytes| encode_bytes(bytes)).map_err(Clone::clone);
            let input = FileInput { snapshot_id: &snapshot_id, file_name: &file_name };
            record_result(&self.recorder, PORT, "get_file_content", &input, &encoded);
            result
        })
    }
}
