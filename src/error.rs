//! Crate-level errors.
//!
//! Only failures that make a run meaningless propagate as [`Error`]. Per-item
//! problems (a file that would not fetch, a document that would not parse, a
//! sink write that failed) are folded into the reconciliation result instead.

use crate::ports::FetchError;
use crate::snapshot::loader::SnapshotError;

/// Result alias for fallible crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run before any comparison starts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A side of the comparison was not supplied.
    #[error("no snapshot source supplied for the {0} side")]
    NoSources(&'static str),

    /// The worker-pool bound is unusable.
    #[error("concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(usize),

    /// Any other configuration value is unusable.
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting {
        /// Setting name, as spelled in the environment.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A source could not list its snapshots at all.
    #[error("failed to list snapshots from {source_name}: {error}")]
    Source {
        /// Source description.
        source_name: String,
        /// Underlying failure.
        error: FetchError,
    },

    /// A snapshot directory could not be loaded.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Local I/O failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// A report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Wraps an I/O error with what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// An [`Error::InvalidSetting`].
    pub fn setting(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting { name, reason: reason.into() }
    }
}
