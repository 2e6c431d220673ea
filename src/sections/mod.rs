//! Keyed comparison of snapshot sections.
//!
//! Most sections are lists of records with a natural identifying field (a
//! program's name, a PATH entry, a disk letter). Comparing them
//! positionally produces noise whenever the collector reorders records, so
//! registered sections are bucketed by key instead. Sections without a
//! registered comparator fall back to [`crate::diff::diff_with`].

pub mod comparators;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diff::{diff_with, DiffOptions, Difference};
use crate::snapshot::Snapshot;

/// Field name to delta, for one changed record.
pub type FieldDeltas = BTreeMap<String, FieldDelta>;

type RecordsFn = Box<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;
type KeyFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;
type FieldsFn = Box<dyn Fn(&Value, &Value) -> Option<FieldDeltas> + Send + Sync>;

/// Direction of a numeric change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// `current > baseline`.
    Increased,
    /// `current < baseline`.
    Decreased,
}

/// Change of one field between the baseline and current record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDelta {
    /// Any non-numeric change. Absent fields are `null`.
    Value {
        /// Baseline value.
        baseline: Value,
        /// Current value.
        current: Value,
    },
    /// A numeric field moved; `delta = current - baseline`.
    Numeric {
        /// Baseline value.
        baseline: f64,
        /// Current value.
        current: f64,
        /// Signed difference.
        delta: f64,
        /// Sign of `delta`.
        direction: Direction,
    },
}

/// Result of comparing one keyed section.
///
/// The four buckets partition the union of baseline and current keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionComparison {
    /// Keys only in the current section.
    pub added: BTreeSet<String>,
    /// Keys only in the baseline section.
    pub removed: BTreeSet<String>,
    /// Keys on both sides whose compared fields differ.
    pub changed: BTreeMap<String, FieldDeltas>,
    /// Keys on both sides whose compared fields agree.
    pub unchanged: BTreeSet<String>,
}

impl SectionComparison {
    /// True when nothing was added, removed or changed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Every key across the four buckets.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<&str> {
        self.added
            .iter()
            .chain(&self.removed)
            .chain(self.changed.keys())
            .chain(&self.unchanged)
            .map(String::as_str)
            .collect()
    }
}

/// How one section was compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SectionOutcome {
    /// Registered keyed comparator.
    Keyed(SectionComparison),
    /// Several keyed members of one blob plus a structural diff of the rest.
    Composite {
        /// Member comparator name to its comparison.
        members: BTreeMap<String, SectionComparison>,
        /// Differences in the parts of the blob no member covers.
        remainder: Vec<Difference>,
    },
    /// No comparator applied; generic structural diff.
    Structural {
        /// Differences between the two payloads.
        differences: Vec<Difference>,
    },
}

impl SectionOutcome {
    /// True when the section differs between the two sides.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match self {
            Self::Keyed(comparison) => !comparison.is_clean(),
            Self::Composite { members, remainder } => {
                !remainder.is_empty() || members.values().any(|c| !c.is_clean())
            }
            Self::Structural { differences } => !differences.is_empty(),
        }
    }
}

/// Strategy for one keyed section: how to find its records, how to key
/// them and which fields to compare.
pub struct SectionComparator {
    records: RecordsFn,
    key: KeyFn,
    fields: FieldsFn,
}

impl std::fmt::Debug for SectionComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionComparator").finish_non_exhaustive()
    }
}

impl SectionComparator {
    /// Builds a comparator from its three functions.
    pub fn new(
        records: impl Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
        key: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
        fields: impl Fn(&Value, &Value) -> Option<FieldDeltas> + Send + Sync + 'static,
    ) -> Self {
        Self { records: Box::new(records), key: Box::new(key), fields: Box::new(fields) }
    }

    /// Records of a section payload.
    #[must_use]
    pub fn records(&self, payload: &Value) -> Vec<Value> {
        (self.records)(payload)
    }

    /// Buckets both payloads by key and classifies every key.
    #[must_use]
    pub fn compare(&self, baseline: &Value, current: &Value) -> SectionComparison {
        let before = self.bucket(baseline, "baseline");
        let after = self.bucket(current, "current");

        let mut result = SectionComparison::default();
        for (key, old) in &before {
            match after.get(key) {
                None => {
                    result.removed.insert(key.clone());
                }
                Some(new) => match (self.fields)(old, new) {
                    Some(deltas) if !deltas.is_empty() => {
                        result.changed.insert(key.clone(), deltas);
                    }
                    _ => {
                        result.unchanged.insert(key.clone());
                    }
                },
            }
        }
        result
            .added
            .extend(after.keys().filter(|k| !before.contains_key(*k)).cloned());
        result
    }

    fn bucket(&self, payload: &Value, side: &str) -> BTreeMap<String, Value> {
        let mut buckets = BTreeMap::new();
        for record in self.records(payload) {
            let Some(key) = (self.key)(&record) else {
                tracing::warn!(side, "record without a key skipped");
                continue;
            };
            if buckets.insert(key.clone(), record).is_some() {
                tracing::warn!(side, key = %key, "duplicate key; keeping the last record");
            }
        }
        buckets
    }
}

/// A blob whose named members are each compared by a registered comparator.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Composite {
    /// Member field name to comparator name.
    members: Vec<(String, String)>,
}

/// Section name to comparator.
#[derive(Debug, Default)]
pub struct ComparatorRegistry {
    comparators: BTreeMap<String, SectionComparator>,
    composites: BTreeMap<String, Composite>,
}

impl ComparatorRegistry {
    /// An empty registry: every section falls back to the structural differ.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The comparators for the sections the collector produces.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        comparators::register_defaults(&mut registry);
        registry
    }

    /// Registers (or replaces) the comparator for a section.
    pub fn register(&mut self, section: impl Into<String>, comparator: SectionComparator) {
        self.comparators.insert(section.into(), comparator);
    }

    /// Registers a blob section whose `member` fields are compared by the
    /// named comparators; everything else in the blob is diffed structurally.
    pub fn register_composite(&mut self, section: impl Into<String>, members: &[(&str, &str)]) {
        let members =
            members.iter().map(|(field, name)| ((*field).to_string(), (*name).to_string())).collect();
        self.composites.insert(section.into(), Composite { members });
    }

    /// The comparator registered for `section`, if any.
    #[must_use]
    pub fn get(&self, section: &str) -> Option<&SectionComparator> {
        self.comparators.get(section)
    }

    /// Registered section names, composites included.
    #[must_use]
    pub fn sections(&self) -> Vec<&str> {
        self.comparators.keys().chain(self.composites.keys()).map(String::as_str).collect()
    }

    /// Number of records a section holds, as its comparator sees them.
    #[must_use]
    pub fn record_count(&self, section: &str, payload: &Value) -> usize {
        if let Some(comparator) = self.get(section) {
            return comparator.records(payload).len();
        }
        if let Some(composite) = self.composites.get(section) {
            return composite
                .members
                .iter()
                .filter_map(|(field, name)| {
                    let comparator = self.get(name)?;
                    Some(comparator.records(payload.get(field).unwrap_or(&Value::Null)).len())
                })
                .sum();
        }
        match payload {
            Value::Null => 0,
            Value::Array(items) => items.len(),
            _ => 1,
        }
    }
}

/// Compares one section, choosing keyed, composite or structural
/// comparison by name.
///
/// A payload standing in for a section that failed to load (`{"error": ..}`)
/// is always compared structurally so the error text shows up in the diff.
#[must_use]
pub fn compare_section(
    registry: &ComparatorRegistry,
    section: &str,
    baseline: &Value,
    current: &Value,
    options: &DiffOptions,
) -> SectionOutcome {
    if is_error_payload(baseline) || is_error_payload(current) {
        return SectionOutcome::Structural { differences: diff_with(baseline, current, options) };
    }
    if let Some(comparator) = registry.get(section) {
        return SectionOutcome::Keyed(comparator.compare(baseline, current));
    }
    if let Some(composite) = registry.composites.get(section) {
        return compare_composite(registry, composite, baseline, current, options);
    }
    tracing::debug!(section, "no comparator registered, diffing structurally");
    SectionOutcome::Structural { differences: diff_with(baseline, current, options) }
}

fn compare_composite(
    registry: &ComparatorRegistry,
    composite: &Composite,
    baseline: &Value,
    current: &Value,
    options: &DiffOptions,
) -> SectionOutcome {
    let mut members = BTreeMap::new();
    let mut rest_before = baseline.as_object().cloned().unwrap_or_default();
    let mut rest_after = current.as_object().cloned().unwrap_or_default();
    for (field, name) in &composite.members {
        let Some(comparator) = registry.get(name) else {
            continue;
        };
        let before = rest_before.remove(field).unwrap_or(Value::Null);
        let after = rest_after.remove(field).unwrap_or(Value::Null);
        members.insert(name.clone(), comparator.compare(&before, &after));
    }
    let remainder = if baseline.is_object() && current.is_object() {
        diff_with(&Value::Object(rest_before), &Value::Object(rest_after), options)
    } else {
        diff_with(baseline, current, options)
    };
    SectionOutcome::Composite { members, remainder }
}

fn is_error_payload(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.len() == 1 && map.contains_key("error"))
}

/// One section of a snapshot comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    /// Records in the baseline payload.
    pub baseline_records: usize,
    /// Records in the current payload.
    pub current_records: usize,
    /// The comparison itself.
    #[serde(flatten)]
    pub outcome: SectionOutcome,
}

/// Section-by-section comparison of two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotComparison {
    /// Baseline snapshot id.
    pub baseline: String,
    /// Current snapshot id.
    pub current: String,
    /// Sections present on both sides.
    pub sections: BTreeMap<String, SectionReport>,
    /// Sections only the current snapshot has.
    pub missing_in_baseline: Vec<String>,
    /// Sections only the baseline snapshot has.
    pub missing_in_current: Vec<String>,
}

impl SnapshotComparison {
    /// Names of sections that differ, including one-sided ones.
    #[must_use]
    pub fn changed_sections(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .sections
            .iter()
            .filter(|(_, report)| report.outcome.has_changes())
            .map(|(name, _)| name.as_str())
            .chain(self.missing_in_baseline.iter().map(String::as_str))
            .chain(self.missing_in_current.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names
    }
}

/// Compares every section of two snapshots.
#[must_use]
pub fn compare_snapshots(
    registry: &ComparatorRegistry,
    baseline: &Snapshot,
    current: &Snapshot,
    options: &DiffOptions,
) -> SnapshotComparison {
    let mut sections = BTreeMap::new();
    let mut missing_in_current = Vec::new();
    for (name, before) in &baseline.sections {
        let Some(after) = current.sections.get(name) else {
            missing_in_current.push(name.clone());
            continue;
        };
        let outcome = compare_section(registry, name, before, after, options);
        sections.insert(
            name.clone(),
            SectionReport {
                baseline_records: registry.record_count(name, before),
                current_records: registry.record_count(name, after),
                outcome,
            },
        );
    }
    let missing_in_baseline = current
        .sections
        .keys()
        .filter(|name| !baseline.sections.contains_key(*name))
        .cloned()
        .collect();

    SnapshotComparison {
        baseline: baseline.id.clone(),
        current: current.id.clone(),
        sections,
        missing_in_baseline,
        missing_in_current,
    }
}

/// Renders a short per-section summary of a snapshot comparison.
#[must_use]
pub fn format_comparison(comparison: &SnapshotComparison) -> String {
    let mut out = format!("{} -> {}\n", comparison.baseline, comparison.current);
    for (name, report) in &comparison.sections {
        let detail = match &report.outcome {
            SectionOutcome::Keyed(c) => describe_keyed(c),
            SectionOutcome::Composite { members, remainder } => {
                let mut parts: Vec<String> =
                    members.iter().map(|(m, c)| format!("{m}: {}", describe_keyed(c))).collect();
                parts.push(format!("other: {} differences", remainder.len()));
                parts.join("; ")
            }
            SectionOutcome::Structural { differences } => {
                format!("{} differences", differences.len())
            }
        };
        out.push_str(&format!(
            "  {name} ({} -> {} records): {detail}\n",
            report.baseline_records, report.current_records
        ));
    }
    for name in &comparison.missing_in_current {
        out.push_str(&format!("  {name}: only in baseline\n"));
    }
    for name in &comparison.missing_in_baseline {
        out.push_str(&format!("  {name}: only in current\n"));
    }
    out
}

fn describe_keyed(c: &SectionComparison) -> String {
    format!(
        "+{} -{} ~{} ={}",
        c.added.len(),
        c.removed.len(),
        c.changed.len(),
        c.unchanged.len()
    )
}

/// Looks up a record field by name, falling back to an ASCII
/// case-insensitive match.
#[must_use]
pub fn field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    let map: &Map<String, Value> = record.as_object()?;
    map.get(name)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v))
}
