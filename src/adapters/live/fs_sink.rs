//! Diff sink writing one JSON artifact per `(snapshot, file)` key.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::ports::{DiffSink, FileSystem, SinkError};

/// Writes `<dir>/<snapshot id>/<file name>.diff.json`.
///
/// Distinct keys map to distinct paths, so writes never contend or
/// overwrite one another.
pub struct FsDiffSink {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FsDiffSink {
    /// Creates a sink rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self { dir: dir.into(), fs }
    }

    /// Path of the artifact for one key.
    #[must_use]
    pub fn artifact_path(&self, snapshot_id: &str, file_name: &str) -> PathBuf {
        self.dir.join(encode(snapshot_id)).join(format!("{}.diff.json", encode(file_name)))
    }
}

/// Percent-encodes the characters that are unsafe in a path component,
/// `%` included, so the mapping is injective and a key always stays inside
/// the sink directory. `.` and `..` are encoded whole; empty becomes `%00`.
fn encode(name: &str) -> String {
    match name {
        "" => return "%00".to_string(),
        "." => return "%2E".to_string(),
        ".." => return "%2E%2E".to_string(),
        _ => {}
    }
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl DiffSink for FsDiffSink {
    fn write(&self, snapshot_id: &str, file_name: &str, payload: &Value) -> Result<(), SinkError> {
        let error = |reason: String| SinkError {
            snapshot_id: snapshot_id.to_string(),
            file_name: file_name.to_string(),
            reason,
        };
        let path = self.artifact_path(snapshot_id, file_name);
        let mut body = serde_json::to_vec_pretty(payload).map_err(|e| error(e.to_string()))?;
        body.push(b'\n');
        self.fs.write(&path, &body).map_err(|e| error(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "stored diff artifact");
        Ok(())
    }
}
