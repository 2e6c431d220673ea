//! Building a [`SnapshotCollection`] from a [`SnapshotSource`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use super::{within, DEFAULT_CONCURRENCY};
use crate::error::{Error, Result};
use crate::ports::{FetchError, FileEntry, SnapshotSource};
use crate::snapshot::{section_name, FileContent, SnapshotCollection, SnapshotEntry, METADATA_FILE};

/// Restricts which files of each snapshot are fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    sections: Vec<String>,
}

impl FileFilter {
    /// Accepts every file.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Accepts `metadata.json` plus the files of the named sections. An
    /// empty list accepts everything.
    #[must_use]
    pub fn sections(sections: Vec<String>) -> Self {
        Self { sections }
    }

    /// Whether `file_name` passes the filter.
    #[must_use]
    pub fn accepts(&self, file_name: &str) -> bool {
        self.sections.is_empty()
            || file_name == METADATA_FILE
            || self.sections.iter().any(|s| s == section_name(file_name))
    }
}

/// Concurrency bound and deadline for collection.
///
/// Clones share one pool of request permits, so collecting both sides of a
/// run with clones of the same limits keeps the whole run within
/// `concurrency` requests in flight.
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Upper bound on requests in flight.
    pub concurrency: usize,
    /// Requests not finished by this instant fail with a budget error.
    pub deadline: Option<Instant>,
    permits: Arc<Semaphore>,
}

impl RunLimits {
    /// Limits allowing `concurrency` requests in flight until `deadline`.
    #[must_use]
    pub fn new(concurrency: usize, deadline: Option<Instant>) -> Self {
        let permits = Arc::new(Semaphore::new(concurrency.min(Semaphore::MAX_PERMITS)));
        Self { concurrency, deadline, permits }
    }

    /// Runs one request once a permit is free and the deadline allows.
    async fn request<T, F>(&self, fut: F) -> std::result::Result<T, FetchError>
    where
        F: Future<Output = std::result::Result<T, FetchError>>,
    {
        // The semaphore is never closed, so acquiring only waits.
        let _permit = self.permits.acquire().await.ok();
        within(self.deadline, fut).await
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, None)
    }
}

/// Lists and fetches every snapshot of `source`.
///
/// File listings and file contents are fetched concurrently, at most
/// `limits.concurrency` at a time. A failed listing or fetch is kept inline
/// in the collection so the rest of the run can proceed. When the snapshot
/// ids themselves cannot be listed the collection is empty and carries the
/// error in [`SnapshotCollection::listing_error`].
///
/// # Errors
///
/// Returns [`Error::InvalidConcurrency`] for a zero bound.
pub async fn collect_collection(
    source: &dyn SnapshotSource,
    filter: &FileFilter,
    limits: &RunLimits,
) -> Result<SnapshotCollection> {
    if limits.concurrency == 0 {
        return Err(Error::InvalidConcurrency(limits.concurrency));
    }
    let description = source.describe();
    let ids = match limits.request(source.list_snapshot_ids()).await {
        Ok(ids) => ids,
        Err(error) => {
            tracing::warn!(source = %description, error = %error, "listing snapshots failed");
            let mut collection = SnapshotCollection::new(description);
            collection.listing_error = Some(error);
            return Ok(collection);
        }
    };
    tracing::info!(source = %description, snapshots = ids.len(), "listed snapshots");

    let listings: Vec<(String, std::result::Result<Vec<FileEntry>, _>)> = stream::iter(ids)
        .map(|id| async move {
            let files = limits.request(source.list_files(&id)).await;
            (id, files)
        })
        .buffer_unordered(limits.concurrency)
        .collect()
        .await;

    let mut collection = SnapshotCollection::new(description);
    let mut wanted = Vec::new();
    for (id, listing) in listings {
        match listing {
            Ok(files) => {
                wanted.extend(
                    files
                        .into_iter()
                        .filter(|f| filter.accepts(&f.name))
                        .map(|f| (id.clone(), f.name)),
                );
                collection.snapshots.insert(id, SnapshotEntry::default());
            }
            Err(error) => {
                tracing::warn!(snapshot = %id, error = %error, "listing files failed");
                collection.snapshots.insert(id, SnapshotEntry::listing_failed(error));
            }
        }
    }

    let fetched: Vec<(String, String, FileContent)> = stream::iter(wanted)
        .map(|(id, name)| async move {
            let content = match limits.request(source.get_file_content(&id, &name)).await {
                Ok(bytes) => FileContent::Bytes(bytes),
                Err(error) => {
                    tracing::warn!(snapshot = %id, file = %name, error = %error, "fetch failed");
                    FileContent::Failed(error)
                }
            };
            (id, name, content)
        })
        .buffer_unordered(limits.concurrency)
        .collect()
        .await;

    let mut files: BTreeMap<String, BTreeMap<String, FileContent>> = BTreeMap::new();
    for (id, name, content) in fetched {
        files.entry(id).or_default().insert(name, content);
    }
    for (id, entry) in &mut collection.snapshots {
        if entry.listing_error.is_none() {
            *entry = SnapshotEntry::from_files(files.remove(id).unwrap_or_default());
        }
    }
    tracing::debug!(source = %collection.source, "collection complete");
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySource;
    use crate::ports::{FetchError, FetchErrorKind};

    fn source() -> InMemorySource {
        InMemorySource::new("memory")
            .with_file("S1", "metadata.json", b"{\"ComputerName\": \"PC\"}")
            .with_file("S1", "Path.json", b"[]")
            .with_file("S1", "DiskSpace.json", b"[]")
            .with_file("S2", "Path.json", b"[]")
    }

    #[tokio::test]
    async fn collects_every_snapshot_and_file() {
        let collection =
            collect_collection(&source(), &FileFilter::all(), &RunLimits::default()).await.unwrap();
        assert_eq!(collection.ids().collect::<Vec<_>>(), ["S1", "S2"]);
        let s1 = &collection.snapshots["S1"];
        assert_eq!(s1.files.len(), 3);
        assert_eq!(s1.metadata.as_ref().and_then(|m| m.host.as_deref()), Some("PC"));
    }

    #[tokio::test]
    async fn filter_keeps_metadata_and_named_sections() {
        let filter = FileFilter::sections(vec!["Path".to_string()]);
        let collection = collect_collection(&source(), &filter, &RunLimits::default()).await.unwrap();
        let names: Vec<&String> = collection.snapshots["S1"].files.keys().collect();
        assert_eq!(names, ["Path.json", "metadata.json"]);
    }

    #[tokio::test]
    async fn per_item_failures_stay_inline() {
        let source = source()
            .with_file_error("S1", "Path.json", FetchError::status(500, "boom"))
            .with_listing_error("S2", FetchError::new(FetchErrorKind::Timeout, "slow"));
        let collection =
            collect_collection(&source, &FileFilter::all(), &RunLimits::default()).await.unwrap();
        assert!(matches!(collection.snapshots["S1"].files["Path.json"], FileContent::Failed(_)));
        assert!(collection.snapshots["S2"].listing_error.is_some());
    }

    #[tokio::test]
    async fn failing_id_listing_is_kept_on_the_collection() {
        let source = source().with_id_listing_error(FetchError::new(FetchErrorKind::Timeout, "down"));
        let collection =
            collect_collection(&source, &FileFilter::all(), &RunLimits::default()).await.unwrap();
        assert_eq!(collection.source, "memory");
        assert!(collection.snapshots.is_empty());
        assert_eq!(collection.listing_error.map(|e| e.kind), Some(FetchErrorKind::Timeout));
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let err = collect_collection(&source(), &FileFilter::all(), &RunLimits::new(0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConcurrency(0)));
    }

    #[tokio::test]
    async fn shared_limits_serialise_both_sides() {
        let limits = RunLimits::new(1, None);
        let shared = limits.clone();
        let filter = FileFilter::all();
        let left = source();
        let right = InMemorySource::new("other").with_file("S9", "Path.json", b"[]");
        let (left, right) = tokio::try_join!(
            collect_collection(&left, &filter, &limits),
            collect_collection(&right, &filter, &shared),
        )
        .unwrap();
        assert_eq!(left.snapshots.len(), 2);
        assert_eq!(right.snapshots.len(), 1);
        assert_eq!(limits.permits.available_permits(), 1);
    }
}
