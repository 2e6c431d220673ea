//! Snapshot model: collections, entries, file contents and decoded sections.
//!
//! A snapshot is produced by the collector as one JSON document per section
//! plus a `metadata.json`. Documents may be wrapped in an envelope
//! `{timestamp, hostIdentity, data}`; [`decode_document`] strips a UTF-8 BOM,
//! parses, and unwraps the payload.

pub mod loader;

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::ports::FetchError;

/// File holding snapshot metadata.
pub const METADATA_FILE: &str = "metadata.json";
/// Optional file mapping section names to file names.
pub const INDEX_FILE: &str = "index.json";

/// Capture metadata attached to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Capture timestamp, as written by the collector.
    #[serde(
        default,
        alias = "Timestamp",
        alias = "CaptureTimestamp",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    /// Host identity (computer name).
    #[serde(
        default,
        alias = "ComputerName",
        alias = "hostIdentity",
        alias = "Hostname",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub host: Option<String>,
    /// User identity the capture ran as.
    #[serde(
        default,
        alias = "UserName",
        alias = "userIdentity",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<String>,
    /// Any other metadata fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts any scalar for a string field; `null` becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Raw content of one file, or the reason it could not be retrieved.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// Bytes as retrieved.
    Bytes(Vec<u8>),
    /// Retrieval failed.
    Failed(FetchError),
}

/// One snapshot as seen through a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotEntry {
    /// Parsed `metadata.json`, when present and well-formed.
    pub metadata: Option<SnapshotMetadata>,
    /// File name to content.
    pub files: BTreeMap<String, FileContent>,
    /// Set when the file listing itself failed; `files` is then empty.
    pub listing_error: Option<FetchError>,
}

impl SnapshotEntry {
    /// Builds an entry from retrieved files, deriving metadata from
    /// `metadata.json` when it decodes.
    #[must_use]
    pub fn from_files(files: BTreeMap<String, FileContent>) -> Self {
        let metadata = match files.get(METADATA_FILE) {
            Some(FileContent::Bytes(bytes)) => decode_document(bytes)
                .ok()
                .and_then(|value| serde_json::from_value(value).ok()),
            _ => None,
        };
        Self { metadata, files, listing_error: None }
    }

    /// An entry whose listing failed.
    #[must_use]
    pub fn listing_failed(error: FetchError) -> Self {
        Self { metadata: None, files: BTreeMap::new(), listing_error: Some(error) }
    }
}

/// A set of snapshots obtained from one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotCollection {
    /// Where the collection came from.
    pub source: String,
    /// Snapshot id to entry.
    pub snapshots: BTreeMap<String, SnapshotEntry>,
    /// Set when the source could not list its snapshot ids; `snapshots` is
    /// then empty.
    pub listing_error: Option<FetchError>,
}

impl SnapshotCollection {
    /// Creates an empty collection for the named source.
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), snapshots: BTreeMap::new(), listing_error: None }
    }

    /// Snapshot ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }
}

/// A fully decoded snapshot: metadata plus one JSON payload per section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier.
    pub id: String,
    /// Capture metadata.
    pub metadata: SnapshotMetadata,
    /// Section name to unwrapped payload.
    pub sections: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Decodes every section file of an entry. Files that failed to fetch or
    /// parse become `{"error": ...}` payloads so the section is still
    /// visible to comparison.
    #[must_use]
    pub fn from_entry(id: &str, entry: &SnapshotEntry) -> Self {
        let mut sections = BTreeMap::new();
        for (name, content) in &entry.files {
            if name == METADATA_FILE || name == INDEX_FILE {
                continue;
            }
            let section = section_name(name);
            let payload = match content {
                FileContent::Bytes(bytes) => decode_document(bytes).unwrap_or_else(|e| {
                    tracing::warn!(snapshot = id, file = %name, error = %e, "section did not parse");
                    error_payload(&format!("Failed to parse JSON: {e}"))
                }),
                FileContent::Failed(e) => error_payload(&format!("Failed to load: {e}")),
            };
            sections.insert(section.to_string(), payload);
        }
        Self {
            id: id.to_string(),
            metadata: entry.metadata.clone().unwrap_or_default(),
            sections,
        }
    }
}

/// Section name for a file name: the file stem (`DiskSpace.json` → `DiskSpace`).
#[must_use]
pub fn section_name(file_name: &str) -> &str {
    file_name.strip_suffix(".json").unwrap_or(file_name)
}

/// Payload standing in for a section that could not be loaded.
#[must_use]
pub fn error_payload(message: &str) -> Value {
    let mut map = Map::new();
    map.insert("error".to_string(), Value::String(message.to_string()));
    Value::Object(map)
}

/// Why a document could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Content is not UTF-8.
    #[error("content is not valid UTF-8: {0}")]
    Utf8(String),
    /// Content is not JSON.
    #[error("{0}")]
    Json(String),
}

/// Parses a document without unwrapping any envelope.
///
/// # Errors
///
/// Returns [`DecodeError`] when the bytes are not UTF-8 JSON.
pub fn parse_document(bytes: &[u8]) -> Result<Value, DecodeError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.to_string()))?;
    serde_json::from_str(text).map_err(|e| {
        DecodeError::Json(format!("JSON error at line {}, column {}: {e}", e.line(), e.column()))
    })
}

/// Parses a collector document and unwraps its payload.
///
/// # Errors
///
/// Returns [`DecodeError`] when the bytes are not UTF-8 JSON.
pub fn decode_document(bytes: &[u8]) -> Result<Value, DecodeError> {
    parse_document(bytes).map(unwrap_envelope)
}

/// Returns the `data` (or `Data`) member of an envelope object, or the value
/// itself when it is not wrapped.
#[must_use]
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if let Some(data) = map.remove("data").or_else(|| map.remove("Data")) {
                data
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}
