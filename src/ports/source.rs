//! Snapshot source port: where snapshot collections come from.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future type alias used by [`SnapshotSource`] to keep the trait
/// dyn-compatible.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// A file listed inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name, unique within the snapshot.
    pub name: String,
    /// Size in bytes as reported by the source.
    #[serde(default)]
    pub size: u64,
}

/// Broad category of a retrieval failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// The request did not complete within its timeout.
    Timeout,
    /// The server answered with a non-success status.
    Status,
    /// Connection-level failure.
    Transport,
    /// The snapshot or file does not exist.
    NotFound,
    /// The response body could not be decoded.
    Decode,
    /// The run's wall-clock budget ran out before the item was fetched.
    Budget,
    /// A recorded interaction could not be replayed.
    Replay,
}

/// Structured retrieval failure for a single snapshot or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    /// Failure category.
    pub kind: FetchErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// HTTP status code, when the failure came from a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl FetchError {
    /// Creates an error of the given kind.
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status: None }
    }

    /// Creates a `status` error carrying the HTTP code.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        let kind = if code == 404 { FetchErrorKind::NotFound } else { FetchErrorKind::Status };
        Self { kind, message: message.into(), status: Some(code) }
    }

    /// Whether a retry has a chance of succeeding.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FetchErrorKind::Timeout | FetchErrorKind::Transport => true,
            FetchErrorKind::Status => {
                matches!(self.status, Some(code) if code == 429 || code >= 500)
            }
            FetchErrorKind::NotFound
            | FetchErrorKind::Decode
            | FetchErrorKind::Budget
            | FetchErrorKind::Replay => false,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Status => "status",
            Self::Transport => "transport",
            Self::NotFound => "not_found",
            Self::Decode => "decode",
            Self::Budget => "budget",
            Self::Replay => "replay",
        };
        f.write_str(label)
    }
}

/// Lists and retrieves snapshots.
///
/// Implemented by the local directory reader, the HTTP client and the
/// cassette recorder/replayer. Every method is per item so that one failed
/// file never hides the rest of a collection.
pub trait SnapshotSource: Send + Sync {
    /// Short description used in logs and reports (a path or a URL).
    fn describe(&self) -> String;

    /// Lists every snapshot identifier available from this source.
    fn list_snapshot_ids(&self) -> SourceFuture<'_, Vec<String>>;

    /// Lists the files of one snapshot.
    fn list_files(&self, snapshot_id: &str) -> SourceFuture<'_, Vec<FileEntry>>;

    /// Retrieves the raw content of one file.
    fn get_file_content(&self, snapshot_id: &str, file_name: &str) -> SourceFuture<'_, Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(FetchError::status(503, "unavailable").is_retryable());
        assert!(FetchError::status(429, "slow down").is_retryable());
        assert!(!FetchError::status(400, "bad").is_retryable());
        assert!(!FetchError::status(404, "gone").is_retryable());
        assert!(FetchError::new(FetchErrorKind::Timeout, "slow").is_retryable());
        assert!(!FetchError::new(FetchErrorKind::Budget, "late").is_retryable());
    }

    #[test]
    fn not_found_status_is_classified() {
        let err = FetchError::status(404, "missing");
        assert_eq!(err.kind, FetchErrorKind::NotFound);
        assert_eq!(err.to_string(), "not_found: missing");
    }
}
