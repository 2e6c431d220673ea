//! Recursive structural comparison of two JSON trees.

use std::collections::BTreeSet;

use serde_json::{Map, Number, Value};

use super::{DiffKind, DiffOptions, Difference, PathSegment};

/// Compares two trees with default options.
#[must_use]
pub fn diff(left: &Value, right: &Value) -> Vec<Difference> {
    diff_with(left, right, &DiffOptions::default())
}

/// Compares two trees and returns every divergence as a flat list.
///
/// Rules, in precedence order:
/// 1. both null: nothing;
/// 2. exactly one null, or different shapes: one `type_changed`, no descent;
/// 3. same-shape scalars: `value_changed` when unequal;
/// 4. arrays: `array_length_mismatch` when lengths differ, then element-wise
///    comparison over the common prefix;
/// 5. objects: one `missing_in_right` / `missing_in_left` per side, then
///    descent into the common keys.
///
/// Containers nested deeper than `options.max_depth` are not descended into;
/// if they differ a single `recursion_limit_exceeded` record marks the spot.
#[must_use]
pub fn diff_with(left: &Value, right: &Value, options: &DiffOptions) -> Vec<Difference> {
    let mut walker = Walker { options, path: Vec::new(), out: Vec::new() };
    walker.walk(left, right);
    walker.out
}

/// Runtime shape of a JSON value. Scalars of different kinds are distinct
/// shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

fn shape(value: &Value) -> Shape {
    match value {
        Value::Null => Shape::Null,
        Value::Bool(_) => Shape::Bool,
        Value::Number(_) => Shape::Number,
        Value::String(_) => Shape::String,
        Value::Array(_) => Shape::Array,
        Value::Object(_) => Shape::Object,
    }
}

struct Walker<'a> {
    options: &'a DiffOptions,
    path: Vec<PathSegment>,
    out: Vec<Difference>,
}

impl Walker<'_> {
    fn walk(&mut self, left: &Value, right: &Value) {
        match (left, right) {
            (Value::Null, Value::Null) => {}
            (Value::Array(l), Value::Array(r)) => self.arrays(l, r, left, right),
            (Value::Object(l), Value::Object(r)) => self.objects(l, r, left, right),
            (l, r) if shape(l) != shape(r) => self.push_values(DiffKind::TypeChanged, l, r),
            (l, r) => {
                if !scalars_equal(l, r, self.options.float_tolerance) {
                    self.push_values(DiffKind::ValueChanged, l, r);
                }
            }
        }
    }

    /// Returns true when the walk may not descend any further. Emits the
    /// limit marker if the two containers differ.
    fn at_limit(&mut self, left: &Value, right: &Value) -> bool {
        if self.path.len() < self.options.max_depth {
            return false;
        }
        if !trees_equal(left, right, self.options.float_tolerance) {
            tracing::debug!(path = %super::render_path(&self.path), "recursion limit reached");
            self.out.push(Difference {
                path: self.path.clone(),
                kind: DiffKind::RecursionLimitExceeded,
                left_value: None,
                right_value: None,
                keys: Vec::new(),
            });
        }
        true
    }

    fn arrays(&mut self, l: &[Value], r: &[Value], left: &Value, right: &Value) {
        if self.at_limit(left, right) {
            return;
        }
        if l.len() != r.len() {
            self.out.push(Difference::values(
                self.path.clone(),
                DiffKind::ArrayLengthMismatch,
                Value::from(l.len()),
                Value::from(r.len()),
            ));
        }
        // The common prefix is still compared after a length mismatch;
        // downstream reports rely on the per-element records.
        for (i, (lv, rv)) in l.iter().zip(r.iter()).enumerate() {
            self.path.push(PathSegment::Index(i));
            self.walk(lv, rv);
            self.path.pop();
        }
    }

    fn objects(&mut self, l: &Map<String, Value>, r: &Map<String, Value>, left: &Value, right: &Value) {
        if self.at_limit(left, right) {
            return;
        }
        let left_keys: BTreeSet<&str> = l.keys().map(String::as_str).collect();
        let right_keys: BTreeSet<&str> = r.keys().map(String::as_str).collect();

        let only_left: Vec<String> =
            left_keys.difference(&right_keys).map(|k| (*k).to_string()).collect();
        if !only_left.is_empty() {
            self.out.push(Difference::missing(
                self.path.clone(),
                DiffKind::MissingInRight,
                only_left,
            ));
        }
        let only_right: Vec<String> =
            right_keys.difference(&left_keys).map(|k| (*k).to_string()).collect();
        if !only_right.is_empty() {
            self.out.push(Difference::missing(
                self.path.clone(),
                DiffKind::MissingInLeft,
                only_right,
            ));
        }

        for key in left_keys.intersection(&right_keys) {
            if let (Some(lv), Some(rv)) = (l.get(*key), r.get(*key)) {
                self.path.push(PathSegment::Key((*key).to_string()));
                self.walk(lv, rv);
                self.path.pop();
            }
        }
    }

    fn push_values(&mut self, kind: DiffKind, left: &Value, right: &Value) {
        self.out.push(Difference::values(self.path.clone(), kind, left.clone(), right.clone()));
    }
}

/// Whether a full walk of the two trees would record nothing.
fn trees_equal(left: &Value, right: &Value, tolerance: Option<f64>) -> bool {
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| trees_equal(a, b, tolerance))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter().all(|(k, a)| r.get(k).is_some_and(|b| trees_equal(a, b, tolerance)))
        }
        (l, r) if shape(l) != shape(r) => false,
        (l, r) => scalars_equal(l, r, tolerance),
    }
}

/// Equality for two scalars already known to share a shape.
fn scalars_equal(left: &Value, right: &Value, tolerance: Option<f64>) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b, tolerance),
        _ => left == right,
    }
}

/// Numeric equality. Integers compare exactly; anything involving a float
/// compares as `f64`, exactly unless a tolerance is supplied.
#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number, tolerance: Option<f64>) -> bool {
    if tolerance.is_none() {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return x == y;
        }
        if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
            return x == y;
        }
    }
    match (a.as_f64(), b.as_f64(), tolerance) {
        (Some(x), Some(y), Some(t)) => (x - y).abs() <= t,
        (Some(x), Some(y), None) => x == y,
        _ => a == b,
    }
}
