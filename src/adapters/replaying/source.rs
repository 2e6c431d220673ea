//! Replaying adapter for the `SnapshotSource` port.

use std::path::Path;
use std::sync::Mutex;

use serde_json::{json, Value};

use super::replay_result;
use crate::adapters::recording::source::PORT;
use crate::cassette::format::{decode_bytes, Cassette};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{FetchError, FetchErrorKind, FileEntry, SnapshotSource, SourceFuture};

/// Serves snapshot source calls from a recorded cassette.
pub struct ReplayingSource {
    description: String,
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingSource {
    /// Creates a source replaying `cassette`.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        Self {
            description: format!("cassette:{}", cassette.source),
            replayer: Mutex::new(CassetteReplayer::new(cassette)),
        }
    }

    /// Loads a cassette file and replays it.
    ///
    /// # Errors
    ///
    /// Returns a message if the cassette cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        Ok(Self::new(&Cassette::load(path)?))
    }
}

impl SnapshotSource for ReplayingSource {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn list_snapshot_ids(&self) -> SourceFuture<'_, Vec<String>> {
        let result = replay_result(&self.replayer, PORT, "list_snapshot_ids", &json!({}));
        Box::pin(async move { result })
    }

    fn list_files(&self, snapshot_id: &str) -> SourceFuture<'_, Vec<FileEntry>> {
        let input = json!({ "snapshot_id": snapshot_id });
        let result = replay_result(&self.replayer, PORT, "list_files", &input);
        Box::pin(async move { result })
    }

    fn get_file_content(&self, snapshot_id: &str, file_name: &str) -> SourceFuture<'_, Vec<u8>> {
        let input = json!({ "snapshot_id": snapshot_id, "file_name": file_name });
        let result = replay_result::<Value>(&self.replayer, PORT, "get_file_content", &input)
            .and_then(|encoded| {
                decode_bytes(&encoded).map_err(|e| FetchError::new(FetchErrorKind::Replay, e))
            });
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Interaction;
    use chrono::Utc;

    fn cassette() -> Cassette {
        let call = |seq, method: &str, input: Value, output: Value| Interaction {
            seq,
            port: PORT.into(),
            method: method.into(),
            input,
            output,
        };
        Cassette {
            name: "remote".into(),
            recorded_at: Utc::now(),
            source: "https://api.local/".into(),
            interactions: vec![
                call(0, "list_snapshot_ids", json!({}), json!({"Ok": ["S1"]})),
                call(1, "list_files", json!({"snapshot_id": "S1"}), json!({"Ok": [{"name": "a.json", "size": 2}]})),
                call(
                    2,
                    "get_file_content",
                    json!({"snapshot_id": "S1", "file_name": "a.json"}),
                    json!({"Ok": {"text": "{}"}}),
                ),
                call(
                    3,
                    "get_file_content",
                    json!({"snapshot_id": "S1", "file_name": "b.json"}),
                    json!({"Err": {"kind": "timeout", "message": "slow"}}),
                ),
            ],
        }
    }

    #[tokio::test]
    async fn replays_results_and_errors() {
        let source = ReplayingSource::new(&cassette());
        assert_eq!(source.describe(), "cassette:https://api.local/");
        assert_eq!(source.list_snapshot_ids().await.unwrap(), ["S1"]);
        assert_eq!(source.list_files("S1").await.unwrap()[0].name, "a.json");
        assert_eq!(source.get_file_content("S1", "a.json").await.unwrap(), b"{}");
        let err = source.get_file_content("S1", "b.json").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Timeout);
    }

    #[tokio::test]
    async fn unrecorded_call_is_a_replay_error() {
        let source = ReplayingSource::new(&cassette());
        let err = source.list_files("S9").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Replay);
    }
}
