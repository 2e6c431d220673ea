//! Record-replay round-trip integration test.
//!
//! Proves that the record/replay system works end-to-end:
//! 1. Record a collection run through `RecordingSource`.
//! 2. Replay the cassette through `ReplayingSource`.
//! 3. Assert the replayed collection reconciles exactly like the live one.
//! 4. Replay a second time and assert determinism.

use std::sync::{Arc, Mutex};

use sysdelta::adapters::memory::{InMemorySource, NoopSink};
use sysdelta::adapters::recording::RecordingSource;
use sysdelta::adapters::replaying::ReplayingSource;
use sysdelta::cassette::format::Cassette;
use sysdelta::cassette::recorder::CassetteRecorder;
use sysdelta::ports::{FetchError, FetchErrorKind, SnapshotSource};
use sysdelta::reconcile::{
    collect_collection, reconcile, FileFilter, ReconcileOptions, ReconciliationResult, RunLimits,
};
use sysdelta::snapshot::SnapshotCollection;

fn remote() -> InMemorySource {
    InMemorySource::new("https://snapshots.example.net/api/")
        .with_file("S1", "metadata.json", br#"{"Timestamp": "2024-05-01T10:00:00Z"}"#)
        .with_file("S1", "Path.json", br#"[{"Path": "C:\\Tools"}]"#)
        .with_file("S1", "Blob.json", &[0xff, 0xfe, 0x00])
        .with_file_error("S1", "Slow.json", FetchError::new(FetchErrorKind::Timeout, "timed out"))
        .with_file("S3", "Path.json", b"[]")
}

fn local() -> InMemorySource {
    InMemorySource::new("local")
        .with_file("S1", "metadata.json", br#"{"Timestamp": "2024-05-01T10:00:00Z"}"#)
        .with_file("S1", "Path.json", br#"[{"Path": "C:\\Windows"}]"#)
        .with_file("S1", "Blob.json", b"{}")
        .with_file("S1", "Slow.json", b"{}")
        .with_file("S2", "Path.json", b"[]")
}

async fn collect(source: &dyn SnapshotSource) -> SnapshotCollection {
    collect_collection(source, &FileFilter::all(), &RunLimits::default()).await.unwrap()
}

async fn reconcile_against_local(right: &SnapshotCollection) -> ReconciliationResult {
    let left = collect(&local()).await;
    reconcile(&left, right, &NoopSink, &ReconcileOptions::default()).await.unwrap()
}

#[tokio::test]
async fn record_then_replay_produces_identical_results() {
    let tmp = tempfile::TempDir::new().unwrap();
    let cassette_path = tmp.path().join("remote.cassette.yaml");

    // --- Phase 1: record ---
    let recorder = Arc::new(Mutex::new(CassetteRecorder::new(
        &cassette_path,
        "roundtrip-test",
        "https://snapshots.example.net/api/",
    )));
    let recording = RecordingSource::new(Box::new(remote()), Arc::clone(&recorder));
    let live = collect(&recording).await;
    let expected = reconcile_against_local(&live).await;
    let written = recorder.lock().unwrap().finish().unwrap();
    assert_eq!(written, cassette_path);

    let cassette = Cassette::load(&cassette_path).unwrap();
    // 1 id listing + 2 file listings + 4 + 1 content fetches.
    assert_eq!(cassette.interactions.len(), 8);

    // --- Phase 2: replay ---
    let replaying = ReplayingSource::from_file(&cassette_path).unwrap();
    assert_eq!(replaying.describe(), "cassette:https://snapshots.example.net/api/");
    let replayed = collect(&replaying).await;
    assert_eq!(replayed.snapshots, live.snapshots);

    let mut actual = reconcile_against_local(&replayed).await;
    actual.right_source.clone_from(&expected.right_source);
    assert_eq!(actual, expected);

    let s1 = actual.snapshot("S1").unwrap();
    let slow = s1.content_differences.iter().find(|c| c.file_name == "Slow.json").unwrap();
    assert_eq!(slow.failures.len(), 1);
    assert!(s1.content_differences.iter().any(|c| c.file_name == "Blob.json"));

    // --- Phase 3: determinism ---
    let again = collect(&ReplayingSource::new(&cassette)).await;
    assert_eq!(again.snapshots, replayed.snapshots);
}

#[tokio::test]
async fn replay_of_unrecorded_call_is_a_replay_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("empty.yaml");
    CassetteRecorder::new(&path, "empty", "nowhere").finish().unwrap();

    let replaying = ReplayingSource::from_file(&path).unwrap();
    let err = replaying.get_file_content("S1", "Path.json").await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Replay);
}
