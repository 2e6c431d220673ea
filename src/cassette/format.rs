//! Cassette data structures for recording and replaying interactions.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single recorded interaction with a port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number (assigned automatically by the recorder).
    pub seq: u64,
    /// Port name (e.g. "source").
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Arguments passed to the port.
    pub input: Value,
    /// Result returned by the port: `{"Ok": ..}` or `{"Err": ..}`.
    pub output: Value,
}

/// A cassette containing a sequence of recorded interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Description of the source that was recorded (a URL or a path).
    pub source: String,
    /// Interactions in the order they completed.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Reads a cassette from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a message if the file cannot be read or is not a cassette.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read cassette {}: {e}", path.display()))?;
        serde_yaml::from_str(&text)
            .map_err(|e| format!("failed to parse cassette {}: {e}", path.display()))
    }
}

/// Encodes file bytes for a cassette: readable text when the bytes are
/// UTF-8, base64 otherwise.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => json!({ "text": text }),
        Err(_) => json!({ "base64": STANDARD.encode(bytes) }),
    }
}

/// Inverse of [`encode_bytes`].
///
/// # Errors
///
/// Returns a message if the value is neither encoding.
pub fn decode_bytes(value: &Value) -> Result<Vec<u8>, String> {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(encoded) = value.get("base64").and_then(Value::as_str) {
        return STANDARD.decode(encoded).map_err(|e| format!("invalid base64 content: {e}"));
    }
    Err(format!("unrecognized content encoding: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip() {
        let cassette = Cassette {
            name: "remote".into(),
            recorded_at: Utc::now(),
            source: "https://snapshots.local/api/".into(),
            interactions: vec![Interaction {
                seq: 0,
                port: "source".into(),
                method: "list_snapshot_ids".into(),
                input: json!({}),
                output: json!({"Ok": ["S1"]}),
            }],
        };
        let yaml = serde_yaml::to_string(&cassette).expect("serialize");
        let deserialized: Cassette = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(cassette, deserialized);
    }

    #[test]
    fn text_stays_readable_and_binary_is_base64() {
        assert_eq!(encode_bytes(b"[1]"), json!({"text": "[1]"}));
        let binary = [0xff, 0x00, 0x10];
        let encoded = encode_bytes(&binary);
        assert!(encoded.get("base64").is_some());
        assert_eq!(decode_bytes(&encoded).unwrap(), binary);
        assert!(decode_bytes(&json!({"other": 1})).is_err());
    }
}
