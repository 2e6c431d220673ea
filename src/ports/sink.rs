//! Storage sink port for persisted diff artifacts.

use serde_json::Value;

/// Failure to persist one diff artifact.
#[derive(Debug, thiserror::Error)]
#[error("failed to store diff for {snapshot_id}/{file_name}: {reason}")]
pub struct SinkError {
    /// Snapshot the artifact belongs to.
    pub snapshot_id: String,
    /// File the artifact describes.
    pub file_name: String,
    /// Underlying cause.
    pub reason: String,
}

/// Receives every content diff produced by the reconciler.
///
/// Writes are keyed by `(snapshot_id, file_name)`. The reconciler only
/// writes from its join loop, one key at a time, so implementations need
/// not serialize by key themselves.
pub trait DiffSink: Send + Sync {
    /// Persists one diff payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be stored. The reconciler
    /// logs and counts the failure and carries on.
    fn write(&self, snapshot_id: &str, file_name: &str, payload: &Value) -> Result<(), SinkError>;
}
