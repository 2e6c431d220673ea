//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the comparison core and an
//! external system (time, filesystem, snapshot sources, diff storage).
//! Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod sink;
pub mod source;

pub use clock::{Clock, FixedClock};
pub use filesystem::{FileSystem, FsError};
pub use sink::{DiffSink, SinkError};
pub use source::{FetchError, FetchErrorKind, FileEntry, SnapshotSource, SourceFuture};
