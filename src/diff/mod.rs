//! Structural diffing of arbitrary JSON trees.
//!
//! [`tree::diff`] walks two trees in lockstep and returns a flat list of
//! [`Difference`] records. Each record addresses one divergence by its full
//! path, so the list can be filtered, persisted or rendered without
//! reconstructing any tree structure.

pub mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use tree::{diff, diff_with};

/// Default recursion limit for [`DiffOptions`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// One step in a path through a JSON tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Index into an array.
    Index(usize),
    /// Key of an object member.
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Key(k) => write!(f, "{k}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Classification of a single divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Two scalars of the same shape hold different values.
    ValueChanged,
    /// The two sides have different shapes, or exactly one side is null.
    TypeChanged,
    /// Object keys present on the right but absent on the left.
    MissingInLeft,
    /// Object keys present on the left but absent on the right.
    MissingInRight,
    /// Two arrays have different lengths.
    ArrayLengthMismatch,
    /// The comparison stopped descending because the depth limit was hit.
    RecursionLimitExceeded,
}

impl DiffKind {
    /// Stable snake-case label, identical to the serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValueChanged => "value_changed",
            Self::TypeChanged => "type_changed",
            Self::MissingInLeft => "missing_in_left",
            Self::MissingInRight => "missing_in_right",
            Self::ArrayLengthMismatch => "array_length_mismatch",
            Self::RecursionLimitExceeded => "recursion_limit_exceeded",
        }
    }
}

/// A single path-addressed divergence between two trees.
///
/// For `array_length_mismatch` the two values carry the array lengths. For
/// the two presence kinds, `keys` lists the missing keys and the values are
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    /// Keys and indices leading from the root to the divergence.
    pub path: Vec<PathSegment>,
    /// What kind of divergence this is.
    pub kind: DiffKind,
    /// Value on the left side, when meaningful for the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_value: Option<Value>,
    /// Value on the right side, when meaningful for the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_value: Option<Value>,
    /// Object keys reported missing, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl Difference {
    /// A `value_changed` or `type_changed` record carrying both values.
    #[must_use]
    pub fn values(path: Vec<PathSegment>, kind: DiffKind, left: Value, right: Value) -> Self {
        Self { path, kind, left_value: Some(left), right_value: Some(right), keys: Vec::new() }
    }

    /// A presence record listing the keys missing on one side.
    #[must_use]
    pub fn missing(path: Vec<PathSegment>, kind: DiffKind, keys: Vec<String>) -> Self {
        Self { path, kind, left_value: None, right_value: None, keys }
    }

    /// Renders the path as `a.b[2].c`, or `$` for the root.
    #[must_use]
    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path_string(), self.kind.as_str())?;
        if !self.keys.is_empty() {
            write!(f, " [{}]", self.keys.join(", "))?;
        }
        if let (Some(l), Some(r)) = (&self.left_value, &self.right_value) {
            write!(f, " {l} -> {r}")?;
        }
        Ok(())
    }
}

/// Renders a path as `a.b[2].c`, or `$` for the empty path.
#[must_use]
pub fn render_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "$".to_string();
    }
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
            PathSegment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
        }
    }
    out
}

/// Tuning knobs for the structural differ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Maximum container nesting depth before the walk stops descending.
    pub max_depth: usize,
    /// Absolute tolerance for numeric comparison. `None` means exact.
    pub float_tolerance: Option<f64>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, float_tolerance: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_path_mixes_keys_and_indices() {
        let path = vec![PathSegment::from("x"), PathSegment::from(2), PathSegment::from("y")];
        assert_eq!(render_path(&path), "x[2].y");
        assert_eq!(render_path(&[]), "$");
        assert_eq!(render_path(&[PathSegment::Index(0)]), "[0]");
    }

    #[test]
    fn difference_serializes_with_snake_case_kind() {
        let d = Difference::values(
            vec!["x".into(), "y".into()],
            DiffKind::ValueChanged,
            json!(1),
            json!(2),
        );
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(
            value,
            json!({"path": ["x", "y"], "kind": "value_changed", "left_value": 1, "right_value": 2})
        );
    }

    #[test]
    fn missing_record_omits_values() {
        let d = Difference::missing(vec![], DiffKind::MissingInRight, vec!["a".into()]);
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value, json!({"path": [], "kind": "missing_in_right", "keys": ["a"]}));
        assert_eq!(d.to_string(), "$: missing_in_right [a]");
    }
}
