//! Reconciliation of two snapshot collections.
//!
//! Snapshots are aligned by id, then files by name within each matching
//! snapshot, then common files are compared by content. Every per-item
//! failure is recorded in the result; the run itself only fails on bad
//! options.

pub mod collect;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::diff::{diff_with, DiffKind, DiffOptions, Difference};
use crate::error::{Error, Result};
use crate::normalize::canonical_equals;
use crate::ports::{DiffSink, FetchError, FetchErrorKind};
use crate::snapshot::{decode_document, FileContent, SnapshotCollection, SnapshotEntry};

pub use collect::{collect_collection, FileFilter, RunLimits};

/// Default bound on concurrent fetches and comparisons.
pub const DEFAULT_CONCURRENCY: usize = 8;

const BUDGET_REASON: &str = "run budget exhausted";

/// Which collection an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The left (usually local) collection.
    Left,
    /// The right (usually remote) collection.
    Right,
}

/// Why a content comparison could not be completed normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The content could not be retrieved.
    Fetch,
    /// The content is not valid JSON.
    MalformedInput,
    /// The run's deadline passed before the comparison finished.
    Budget,
    /// The comparison task itself failed.
    Aborted,
}

/// One recorded failure for a file or a snapshot listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFailure {
    /// Side the failure occurred on; absent when it concerns both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    /// Failure category.
    pub kind: FailureKind,
    /// Captured reason.
    pub reason: String,
}

impl ContentFailure {
    fn fetch(side: Side, error: &FetchError) -> Self {
        Self { side: Some(side), kind: FailureKind::Fetch, reason: error.to_string() }
    }
}

/// Outcome of comparing one common file whose contents disagree or could
/// not be compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDifference {
    /// File name within the snapshot.
    pub file_name: String,
    /// Structural differences, left to right.
    pub differences: Vec<Difference>,
    /// Failures that prevented or degraded the comparison.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ContentFailure>,
}

/// File-level reconciliation of one snapshot present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFileComparison {
    /// Snapshot id.
    pub snapshot_id: String,
    /// File names present on both sides.
    pub matching_files: Vec<String>,
    /// File names only the right side has.
    pub missing_in_left: Vec<String>,
    /// File names only the left side has.
    pub missing_in_right: Vec<String>,
    /// Common files whose contents differ or failed to compare.
    pub content_differences: Vec<ContentDifference>,
    /// Sides whose file listing failed; file comparison was skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listing_failures: Vec<ContentFailure>,
}

/// Full result of reconciling two collections.
///
/// `matching_snapshot_ids ∪ missing_in_right` is the left id set,
/// `matching_snapshot_ids ∪ missing_in_left` is the right id set, and the
/// three lists are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Description of the left source.
    pub left_source: String,
    /// Description of the right source.
    pub right_source: String,
    /// Ids on both sides.
    pub matching_snapshot_ids: Vec<String>,
    /// Ids only the right side has.
    pub missing_in_left: Vec<String>,
    /// Ids only the left side has.
    pub missing_in_right: Vec<String>,
    /// Sides whose snapshot ids could not be listed. Such a side counts as
    /// holding no snapshots.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listing_failures: Vec<ContentFailure>,
    /// One entry per matching id, in id order.
    pub per_snapshot_file_comparisons: Vec<SnapshotFileComparison>,
    /// Diff artifacts the sink failed to store.
    #[serde(default)]
    pub sink_failures: usize,
}

impl ReconciliationResult {
    /// Number of snapshots in the left collection.
    #[must_use]
    pub fn left_count(&self) -> usize {
        self.matching_snapshot_ids.len() + self.missing_in_right.len()
    }

    /// Number of snapshots in the right collection.
    #[must_use]
    pub fn right_count(&self) -> usize {
        self.matching_snapshot_ids.len() + self.missing_in_left.len()
    }

    /// The file comparison for a snapshot id.
    #[must_use]
    pub fn snapshot(&self, snapshot_id: &str) -> Option<&SnapshotFileComparison> {
        self.per_snapshot_file_comparisons.iter().find(|c| c.snapshot_id == snapshot_id)
    }
}

/// Run options for [`reconcile`].
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Upper bound on comparisons in flight.
    pub concurrency: usize,
    /// Options for the structural differ.
    pub diff: DiffOptions,
    /// Comparisons not finished by this instant are recorded as failures.
    pub deadline: Option<Instant>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY, diff: DiffOptions::default(), deadline: None }
    }
}

/// One common file awaiting comparison.
struct FileJob {
    snapshot_id: String,
    file_name: String,
    left: FileContent,
    right: FileContent,
}

/// Reconciles two collections and writes every content diff to `sink`.
///
/// Comparisons run on the blocking pool, at most `options.concurrency` at a
/// time. Results are joined in completion order and sink writes happen in
/// the join loop, so no two writes for the same key ever overlap. The
/// returned lists are sorted regardless of completion order.
///
/// # Errors
///
/// Returns [`Error::InvalidConcurrency`] when `options.concurrency` is 0.
pub async fn reconcile(
    left: &SnapshotCollection,
    right: &SnapshotCollection,
    sink: &dyn DiffSink,
    options: &ReconcileOptions,
) -> Result<ReconciliationResult> {
    if options.concurrency == 0 {
        return Err(Error::InvalidConcurrency(options.concurrency));
    }

    let left_ids: BTreeSet<&str> = left.ids().collect();
    let right_ids: BTreeSet<&str> = right.ids().collect();

    let mut result = ReconciliationResult {
        left_source: left.source.clone(),
        right_source: right.source.clone(),
        matching_snapshot_ids: owned(left_ids.intersection(&right_ids)),
        missing_in_left: owned(right_ids.difference(&left_ids)),
        missing_in_right: owned(left_ids.difference(&right_ids)),
        ..ReconciliationResult::default()
    };
    for (side, collection) in [(Side::Left, left), (Side::Right, right)] {
        if let Some(error) = &collection.listing_error {
            tracing::warn!(source = %collection.source, ?side, error = %error, "snapshot listing failed");
            result.listing_failures.push(ContentFailure::fetch(side, error));
        }
    }
    tracing::info!(
        matching = result.matching_snapshot_ids.len(),
        missing_in_left = result.missing_in_left.len(),
        missing_in_right = result.missing_in_right.len(),
        "reconciled snapshot ids"
    );

    let mut jobs = Vec::new();
    let mut comparisons: BTreeMap<String, SnapshotFileComparison> = BTreeMap::new();
    for id in &result.matching_snapshot_ids {
        if let (Some(l), Some(r)) = (left.snapshots.get(id), right.snapshots.get(id)) {
            let comparison = reconcile_files(id, l, r, &mut jobs);
            comparisons.insert(id.clone(), comparison);
        }
    }

    let diff_options = options.diff;
    let deadline = options.deadline;
    let mut completed = stream::iter(jobs)
        .map(|job| async move {
            let snapshot_id = job.snapshot_id.clone();
            let file_name = job.file_name.clone();
            if expired(deadline) {
                let outcome = failed(&file_name, FailureKind::Budget, BUDGET_REASON.to_string());
                return (snapshot_id, Some(outcome));
            }
            let task = tokio::task::spawn_blocking(move || {
                compare_contents(&job.file_name, &job.left, &job.right, &diff_options)
            });
            let outcome = match within(deadline, async { Ok::<_, FetchError>(task.await) }).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join)) => Some(failed(&file_name, FailureKind::Aborted, join.to_string())),
                Err(_) => Some(failed(&file_name, FailureKind::Budget, BUDGET_REASON.to_string())),
            };
            (snapshot_id, outcome)
        })
        .buffer_unordered(options.concurrency);

    while let Some((snapshot_id, outcome)) = completed.next().await {
        let Some(difference) = outcome else {
            continue;
        };
        match serde_json::to_value(&difference) {
            Ok(payload) => {
                if let Err(e) = sink.write(&snapshot_id, &difference.file_name, &payload) {
                    tracing::warn!(error = %e, "diff artifact not stored");
                    result.sink_failures += 1;
                }
            }
            Err(e) => {
                tracing::warn!(snapshot = %snapshot_id, file = %difference.file_name, error = %e, "diff artifact not serializable");
                result.sink_failures += 1;
            }
        }
        if let Some(comparison) = comparisons.get_mut(&snapshot_id) {
            comparison.content_differences.push(difference);
        }
    }

    result.per_snapshot_file_comparisons = comparisons
        .into_values()
        .map(|mut comparison| {
            comparison.content_differences.sort_by(|a, b| a.file_name.cmp(&b.file_name));
            comparison
        })
        .collect();
    Ok(result)
}

/// File-name reconciliation for one snapshot. Queues a job per common file.
fn reconcile_files(
    snapshot_id: &str,
    left: &SnapshotEntry,
    right: &SnapshotEntry,
    jobs: &mut Vec<FileJob>,
) -> SnapshotFileComparison {
    let mut comparison =
        SnapshotFileComparison { snapshot_id: snapshot_id.to_string(), ..Default::default() };
    for (side, entry) in [(Side::Left, left), (Side::Right, right)] {
        if let Some(error) = &entry.listing_error {
            tracing::warn!(snapshot = snapshot_id, ?side, error = %error, "file listing failed");
            comparison.listing_failures.push(ContentFailure::fetch(side, error));
        }
    }
    if !comparison.listing_failures.is_empty() {
        return comparison;
    }

    let left_files: BTreeSet<&str> = left.files.keys().map(String::as_str).collect();
    let right_files: BTreeSet<&str> = right.files.keys().map(String::as_str).collect();
    comparison.matching_files = owned(left_files.intersection(&right_files));
    comparison.missing_in_left = owned(right_files.difference(&left_files));
    comparison.missing_in_right = owned(left_files.difference(&right_files));

    for name in &comparison.matching_files {
        if let (Some(l), Some(r)) = (left.files.get(name), right.files.get(name)) {
            jobs.push(FileJob {
                snapshot_id: snapshot_id.to_string(),
                file_name: name.clone(),
                left: l.clone(),
                right: r.clone(),
            });
        }
    }
    tracing::debug!(
        snapshot = snapshot_id,
        matching = comparison.matching_files.len(),
        missing_in_left = comparison.missing_in_left.len(),
        missing_in_right = comparison.missing_in_right.len(),
        "reconciled files"
    );
    comparison
}

/// Compares two copies of one file. `None` means they agree.
///
/// Collector envelopes are unwrapped first, so only the `data` payloads are
/// compared. Content that fails to fetch or parse is recorded as a failure.
/// When a side is malformed and the raw bytes differ, the raw texts are compared
/// as a single root value.
#[must_use]
pub fn compare_contents(
    file_name: &str,
    left: &FileContent,
    right: &FileContent,
    options: &DiffOptions,
) -> Option<ContentDifference> {
    let (left_bytes, right_bytes) = match (left, right) {
        (FileContent::Bytes(l), FileContent::Bytes(r)) => (l, r),
        _ => {
            let mut failures = Vec::new();
            for (side, content) in [(Side::Left, left), (Side::Right, right)] {
                if let FileContent::Failed(error) = content {
                    failures.push(ContentFailure::fetch(side, error));
                }
            }
            return Some(ContentDifference {
                file_name: file_name.to_string(),
                differences: Vec::new(),
                failures,
            });
        }
    };

    match (decode_document(left_bytes), decode_document(right_bytes)) {
        (Ok(l), Ok(r)) => {
            if canonical_equals(&l, &r) {
                return None;
            }
            let differences = diff_with(&l, &r, options);
            if differences.is_empty() {
                return None;
            }
            Some(ContentDifference { file_name: file_name.to_string(), differences, failures: Vec::new() })
        }
        (l, r) => {
            let mut failures = Vec::new();
            for (side, parsed) in [(Side::Left, &l), (Side::Right, &r)] {
                if let Err(e) = parsed {
                    tracing::warn!(file = file_name, ?side, error = %e, "malformed content");
                    failures.push(ContentFailure {
                        side: Some(side),
                        kind: FailureKind::MalformedInput,
                        reason: e.to_string(),
                    });
                }
            }
            let mut differences = Vec::new();
            if left_bytes != right_bytes {
                differences.push(Difference::values(
                    Vec::new(),
                    DiffKind::ValueChanged,
                    Value::String(String::from_utf8_lossy(left_bytes).into_owned()),
                    Value::String(String::from_utf8_lossy(right_bytes).into_owned()),
                ));
            }
            Some(ContentDifference { file_name: file_name.to_string(), differences, failures })
        }
    }
}

fn failed(file_name: &str, kind: FailureKind, reason: String) -> ContentDifference {
    ContentDifference {
        file_name: file_name.to_string(),
        differences: Vec::new(),
        failures: vec![ContentFailure { side: None, kind, reason }],
    }
}

/// Runs `fut` unless the deadline passes first, in which case the item
/// fails with a budget error.
pub(crate) async fn within<T, F>(deadline: Option<Instant>, fut: F) -> std::result::Result<T, FetchError>
where
    F: Future<Output = std::result::Result<T, FetchError>>,
{
    match deadline {
        _ if expired(deadline) => Err(FetchError::new(FetchErrorKind::Budget, BUDGET_REASON)),
        None => fut.await,
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .unwrap_or_else(|_| Err(FetchError::new(FetchErrorKind::Budget, BUDGET_REASON))),
    }
}

/// True once the deadline has passed.
pub(crate) fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn owned<'a, 'b: 'a>(ids: impl Iterator<Item = &'a &'b str>) -> Vec<String> {
    ids.map(|id| (*id).to_string()).collect()
}
