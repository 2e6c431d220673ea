//! Built-in comparators and the helpers they are assembled from.

use serde_json::Value;

use super::{field, ComparatorRegistry, Direction, FieldDelta, FieldDeltas, SectionComparator};
use crate::diff::diff;

/// Environment variable scopes, in the order the collector writes them.
const ENVIRONMENT_SCOPES: [(&str, &str); 3] = [
    ("SystemVariables", "System"),
    ("UserVariables", "User"),
    ("ProcessVariables", "Process"),
];

/// Registers the comparators for every keyed section the collector emits.
pub fn register_defaults(registry: &mut ComparatorRegistry) {
    registry.register(
        "InstalledPrograms",
        SectionComparator::new(
            top_level_records,
            key_field("Name"),
            compare_fields(&["Version", "Publisher", "InstallDate", "InstallLocation"], &[]),
        ),
    );
    registry.register(
        "Path",
        SectionComparator::new(top_level_records, key_field("Path"), compare_fields(&["Exists"], &[])),
    );
    registry.register(
        "RunningServices",
        SectionComparator::new(
            top_level_records,
            key_field("Name"),
            compare_fields(&["Status", "StartType", "DisplayName"], &[]),
        ),
    );
    registry.register(
        "StartupPrograms",
        SectionComparator::new(
            top_level_records,
            key_field("Name"),
            compare_fields(&["Command", "Location", "User"], &[]),
        ),
    );
    registry.register(
        "DiskSpace",
        SectionComparator::new(
            top_level_records,
            key_field("Name"),
            compare_fields(&[], &["FreeGB", "UsedGB", "TotalGB", "PercentFree"]),
        ),
    );
    registry.register(
        "NetworkAdapters",
        SectionComparator::new(
            member_records("Adapters"),
            key_field("Name"),
            compare_fields(&["Status", "MediaType", "LinkSpeed", "MacAddress"], &[]),
        ),
    );
    registry.register(
        "IPConfiguration",
        SectionComparator::new(
            member_records("IPConfiguration"),
            key_field("InterfaceAlias"),
            compare_fields(&["IPv4Address", "IPv6Address", "DefaultGateway", "DNSServer"], &[]),
        ),
    );
    registry.register(
        "Environment",
        SectionComparator::new(environment_records, environment_key, compare_fields(&["Value"], &[])),
    );
    registry.register_composite(
        "Network",
        &[("Adapters", "NetworkAdapters"), ("IPConfiguration", "IPConfiguration")],
    );
}

/// Records of a payload that is itself the record list.
///
/// A lone object counts as a single record; the collector emits one when a
/// list has exactly one element.
#[must_use]
pub fn top_level_records(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![payload.clone()],
        _ => Vec::new(),
    }
}

/// Records found under `member` when the payload is the enclosing blob, or
/// the payload itself when it is already the list.
pub fn member_records(member: &'static str) -> impl Fn(&Value) -> Vec<Value> + Send + Sync + 'static {
    move |payload: &Value| match payload.get(member) {
        Some(inner) if payload.is_object() => top_level_records(inner),
        _ => top_level_records(payload),
    }
}

/// Variables of every scope, each tagged with a `Scope` field.
#[must_use]
pub fn environment_records(payload: &Value) -> Vec<Value> {
    let mut records = Vec::new();
    for (member, scope) in ENVIRONMENT_SCOPES {
        let Some(list) = field(payload, member) else {
            continue;
        };
        for mut record in top_level_records(list) {
            if let Value::Object(map) = &mut record {
                map.insert("Scope".to_string(), Value::String(scope.to_string()));
            }
            records.push(record);
        }
    }
    records
}

/// `<Scope>:<Name>`, so a user variable never collides with a system one.
#[must_use]
pub fn environment_key(record: &Value) -> Option<String> {
    let scope = field(record, "Scope").and_then(Value::as_str)?;
    let name = scalar_key(field(record, "Name")?)?;
    Some(format!("{scope}:{name}"))
}

/// Keys records by the named field. Strings and numbers are usable keys;
/// an empty string is not.
pub fn key_field(name: &'static str) -> impl Fn(&Value) -> Option<String> + Send + Sync + 'static {
    move |record: &Value| field(record, name).and_then(scalar_key)
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compares the listed fields of two records. `numeric` fields yield signed
/// deltas; the rest yield before/after values. Missing fields read as null.
pub fn compare_fields(
    text: &[&str],
    numeric: &[&str],
) -> impl Fn(&Value, &Value) -> Option<FieldDeltas> + Send + Sync + 'static {
    let text: Vec<String> = text.iter().map(|s| (*s).to_string()).collect();
    let numeric: Vec<String> = numeric.iter().map(|s| (*s).to_string()).collect();
    move |baseline: &Value, current: &Value| {
        let mut deltas = FieldDeltas::new();
        for name in &text {
            if let Some(delta) = value_delta(field(baseline, name), field(current, name)) {
                deltas.insert(name.clone(), delta);
            }
        }
        for name in &numeric {
            let (before, after) = (field(baseline, name), field(current, name));
            let delta = match (before.and_then(as_number), after.and_then(as_number)) {
                (Some(b), Some(c)) if (c - b).is_finite() => numeric_delta(b, c),
                _ => value_delta(before, after),
            };
            if let Some(delta) = delta {
                deltas.insert(name.clone(), delta);
            }
        }
        if deltas.is_empty() {
            None
        } else {
            Some(deltas)
        }
    }
}

/// Signed change from `baseline` to `current`, or `None` when equal.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn numeric_delta(baseline: f64, current: f64) -> Option<FieldDelta> {
    if baseline == current {
        return None;
    }
    let delta = current - baseline;
    let direction = if delta > 0.0 { Direction::Increased } else { Direction::Decreased };
    Some(FieldDelta::Numeric { baseline, current, delta, direction })
}

fn value_delta(baseline: Option<&Value>, current: Option<&Value>) -> Option<FieldDelta> {
    let baseline = baseline.cloned().unwrap_or(Value::Null);
    let current = current.cloned().unwrap_or(Value::Null);
    if diff(&baseline, &current).is_empty() {
        None
    } else {
        Some(FieldDelta::Value { baseline, current })
    }
}

/// Numbers, and strings holding finite numbers, as `f64`.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}
