//! Summary statistics and the machine-readable report document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reconcile::ReconciliationResult;

/// Counts derived from a [`ReconciliationResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Snapshots in the left collection.
    pub left_snapshots: usize,
    /// Snapshots in the right collection.
    pub right_snapshots: usize,
    /// Snapshots on both sides.
    pub matching_snapshots: usize,
    /// Snapshots only the right side has.
    pub missing_in_left: usize,
    /// Snapshots only the left side has.
    pub missing_in_right: usize,
    /// Files only the right side has, over all matching snapshots.
    pub files_missing_in_left: usize,
    /// Files only the left side has, over all matching snapshots.
    pub files_missing_in_right: usize,
    /// Common files whose content differs or failed to compare.
    pub files_with_content_differences: usize,
    /// Sum of the three file counts above.
    pub file_issue_count: usize,
    /// Difference records across all files.
    pub difference_count: usize,
    /// Content, file listing and snapshot listing failures.
    pub failure_count: usize,
    /// Diff artifacts the sink failed to store.
    pub sink_failures: usize,
}

impl Summary {
    /// True when the two collections disagree in any way.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.missing_in_left > 0
            || self.missing_in_right > 0
            || self.file_issue_count > 0
            || self.failure_count > 0
    }
}

/// Computes summary counts. Pure.
#[must_use]
pub fn aggregate(result: &ReconciliationResult) -> Summary {
    let mut summary = Summary {
        left_snapshots: result.left_count(),
        right_snapshots: result.right_count(),
        matching_snapshots: result.matching_snapshot_ids.len(),
        missing_in_left: result.missing_in_left.len(),
        missing_in_right: result.missing_in_right.len(),
        sink_failures: result.sink_failures,
        failure_count: result.listing_failures.len(),
        ..Summary::default()
    };
    for comparison in &result.per_snapshot_file_comparisons {
        summary.files_missing_in_left += comparison.missing_in_left.len();
        summary.files_missing_in_right += comparison.missing_in_right.len();
        summary.files_with_content_differences += comparison.content_differences.len();
        summary.failure_count += comparison.listing_failures.len();
        for content in &comparison.content_differences {
            summary.difference_count += content.differences.len();
            summary.failure_count += content.failures.len();
        }
    }
    summary.file_issue_count = summary.files_missing_in_left
        + summary.files_missing_in_right
        + summary.files_with_content_differences;
    summary
}

/// The document handed to renderers: summary plus full details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Left source description.
    pub left: String,
    /// Right source description.
    pub right: String,
    /// Aggregate counts.
    pub summary: Summary,
    /// The reconciliation result, unchanged.
    pub details: ReconciliationResult,
}

/// Assembles the report document.
#[must_use]
pub fn build_report(result: ReconciliationResult, generated_at: DateTime<Utc>) -> Report {
    Report {
        generated_at,
        left: result.left_source.clone(),
        right: result.right_source.clone(),
        summary: aggregate(&result),
        details: result,
    }
}

/// Plain-text rendering of a summary.
#[must_use]
pub fn format_summary(summary: &Summary) -> String {
    let mut lines = vec![
        format!(
            "Snapshots: {} left, {} right, {} matching",
            summary.left_snapshots, summary.right_snapshots, summary.matching_snapshots
        ),
        format!(
            "Missing snapshots: {} in left, {} in right",
            summary.missing_in_left, summary.missing_in_right
        ),
        format!(
            "File issues: {} ({} missing in left, {} missing in right, {} with content differences)",
            summary.file_issue_count,
            summary.files_missing_in_left,
            summary.files_missing_in_right,
            summary.files_with_content_differences
        ),
        format!("Differences: {}", summary.difference_count),
        format!("Failures: {}", summary.failure_count),
    ];
    if summary.sink_failures > 0 {
        lines.push(format!("Unsaved diff artifacts: {}", summary.sink_failures));
    }
    lines.push(if summary.has_issues() {
        "Result: collections differ".to_string()
    } else {
        "Result: collections agree".to_string()
    });
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffKind, Difference};
    use crate::reconcile::{
        ContentDifference, ContentFailure, FailureKind, Side, SnapshotFileComparison,
    };
    use chrono::TimeZone;
    use serde_json::json;

    fn result() -> ReconciliationResult {
        ReconciliationResult {
            left_source: "local".into(),
            right_source: "remote".into(),
            matching_snapshot_ids: vec!["S1".into(), "S2".into()],
            missing_in_left: vec!["S4".into()],
            missing_in_right: vec!["S3".into()],
            listing_failures: Vec::new(),
            per_snapshot_file_comparisons: vec![
                SnapshotFileComparison {
                    snapshot_id: "S1".into(),
                    matching_files: vec!["a.json".into(), "b.json".into()],
                    missing_in_left: vec!["c.json".into()],
                    missing_in_right: vec!["d.json".into(), "e.json".into()],
                    content_differences: vec![ContentDifference {
                        file_name: "a.json".into(),
                        differences: vec![
                            Difference::values(vec!["x".into()], DiffKind::ValueChanged, json!(1), json!(2)),
                            Difference::values(vec!["y".into()], DiffKind::TypeChanged, json!(1), json!("1")),
                        ],
                        failures: Vec::new(),
                    }],
                    listing_failures: Vec::new(),
                },
                SnapshotFileComparison {
                    snapshot_id: "S2".into(),
                    matching_files: vec!["a.json".into()],
                    content_differences: vec![ContentDifference {
                        file_name: "a.json".into(),
                        differences: Vec::new(),
                        failures: vec![ContentFailure {
                            side: Some(Side::Right),
                            kind: FailureKind::Fetch,
                            reason: "timeout".into(),
                        }],
                    }],
                    ..SnapshotFileComparison::default()
                },
            ],
            sink_failures: 0,
        }
    }

    #[test]
    fn aggregates_counts() {
        let summary = aggregate(&result());
        assert_eq!(summary.left_snapshots, 3);
        assert_eq!(summary.right_snapshots, 3);
        assert_eq!(summary.matching_snapshots, 2);
        assert_eq!(summary.files_missing_in_left, 1);
        assert_eq!(summary.files_missing_in_right, 2);
        assert_eq!(summary.files_with_content_differences, 2);
        assert_eq!(summary.file_issue_count, 5);
        assert_eq!(summary.difference_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert!(summary.has_issues());
    }

    #[test]
    fn snapshot_listing_failure_is_an_issue() {
        let result = ReconciliationResult {
            listing_failures: vec![ContentFailure {
                side: Some(Side::Left),
                kind: FailureKind::Fetch,
                reason: "connection refused".into(),
            }],
            ..ReconciliationResult::default()
        };
        let summary = aggregate(&result);
        assert_eq!(summary.failure_count, 1);
        assert!(summary.has_issues());
    }

    #[test]
    fn empty_result_has_no_issues() {
        let summary = aggregate(&ReconciliationResult::default());
        assert_eq!(summary, Summary::default());
        assert!(!summary.has_issues());
        assert!(format_summary(&summary).ends_with("Result: collections agree\n"));
    }

    #[test]
    fn report_passes_details_through() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let report = build_report(result(), at);
        assert_eq!(report.details, result());
        assert_eq!(report.left, "local");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["summary"]["file_issue_count"], 5);
        assert_eq!(value["generated_at"], "2024-05-01T12:00:00Z");
        assert_eq!(value["details"]["per_snapshot_file_comparisons"][0]["snapshot_id"], "S1");
    }

    #[test]
    fn summary_text_lists_counts() {
        let text = format_summary(&aggregate(&result()));
        assert!(text.contains("Snapshots: 3 left, 3 right, 2 matching"));
        assert!(text.contains("File issues: 5 (1 missing in left, 2 missing in right, 2 with content differences)"));
        assert!(text.ends_with("Result: collections differ\n"));
    }
}
