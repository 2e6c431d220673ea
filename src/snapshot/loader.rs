//! Loading a single snapshot directory from disk.
//!
//! A snapshot directory holds `metadata.json`, an optional `index.json`
//! mapping section names to file names, and one JSON file per section.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{
    decode_document, error_payload, parse_document, section_name, Snapshot, SnapshotMetadata,
    INDEX_FILE, METADATA_FILE,
};
use crate::ports::FileSystem;

/// Focus entry meaning "every section".
pub const ALL_SECTIONS: &str = "All";

/// Why a snapshot directory could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The directory does not exist.
    #[error("snapshot directory not found: {0}")]
    NotFound(PathBuf),
    /// `metadata.json` is absent.
    #[error("metadata file not found: {0}")]
    MissingMetadata(PathBuf),
    /// `metadata.json` or `index.json` did not parse.
    #[error("error parsing {file}: {reason}")]
    Unparseable {
        /// Offending file.
        file: PathBuf,
        /// Parser message.
        reason: String,
    },
    /// No section files in the directory.
    #[error("no data files found in snapshot directory: {0}")]
    Empty(PathBuf),
    /// None of the requested sections exist.
    #[error("none of the requested sections {requested:?} were found in the snapshot")]
    NoMatchingSections {
        /// The focus list as given.
        requested: Vec<String>,
    },
    /// Every selected section failed to load.
    #[error("failed to load any sections from {0}")]
    NothingLoaded(PathBuf),
    /// Filesystem failure.
    #[error("failed to read {path}: {reason}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },
}

/// Loads a snapshot directory, restricted to `focus` when given.
///
/// An empty focus, or one containing [`ALL_SECTIONS`], selects every
/// section. Unknown focus names are logged and skipped. A section that
/// fails to read or parse is kept as an `{"error": ...}` payload.
///
/// # Errors
///
/// Returns [`SnapshotError`] when the directory or its metadata is missing
/// or unparseable, when no section matches the focus, or when no selected
/// section loads.
pub fn load_snapshot_dir(
    fs: &dyn FileSystem,
    dir: &Path,
    focus: &[String],
) -> Result<Snapshot, SnapshotError> {
    if !fs.is_dir(dir) {
        return Err(SnapshotError::NotFound(dir.to_path_buf()));
    }

    let metadata_path = dir.join(METADATA_FILE);
    if !fs.exists(&metadata_path) {
        return Err(SnapshotError::MissingMetadata(metadata_path));
    }
    let metadata: SnapshotMetadata = serde_json::from_value(read_json(fs, &metadata_path)?)
        .map_err(|e| SnapshotError::Unparseable { file: metadata_path.clone(), reason: e.to_string() })?;

    let index = load_index(fs, dir)?;
    let selected = select_sections(&index, focus)?;

    let mut sections = BTreeMap::new();
    let mut loaded = 0usize;
    for section in selected {
        let path = dir.join(&index[&section]);
        let payload = if fs.exists(&path) {
            match fs.read(&path) {
                Ok(bytes) => match decode_document(&bytes) {
                    Ok(value) => {
                        loaded += 1;
                        tracing::debug!(section = %section, "loaded section");
                        value
                    }
                    Err(e) => {
                        tracing::error!(file = %path.display(), error = %e, "section did not parse");
                        error_payload(&format!("Failed to parse JSON: {e}"))
                    }
                },
                Err(e) => {
                    tracing::error!(section = %section, error = %e, "section could not be read");
                    error_payload(&format!("Failed to load: {e}"))
                }
            }
        } else {
            tracing::warn!(file = %path.display(), "section file not found");
            error_payload("File not found")
        };
        sections.insert(section, payload);
    }

    if loaded == 0 {
        return Err(SnapshotError::NothingLoaded(dir.to_path_buf()));
    }

    let id = dir
        .file_name()
        .map_or_else(|| dir.display().to_string(), |name| name.to_string_lossy().into_owned());
    Ok(Snapshot { id, metadata, sections })
}

fn read_json(fs: &dyn FileSystem, path: &Path) -> Result<Value, SnapshotError> {
    let bytes = fs
        .read(path)
        .map_err(|e| SnapshotError::Io { path: path.to_path_buf(), reason: e.to_string() })?;
    parse_document(&bytes)
        .map_err(|e| SnapshotError::Unparseable { file: path.to_path_buf(), reason: e.to_string() })
}

/// Section name to file name, from `index.json` or the directory listing.
fn load_index(fs: &dyn FileSystem, dir: &Path) -> Result<BTreeMap<String, String>, SnapshotError> {
    let index_path = dir.join(INDEX_FILE);
    if fs.exists(&index_path) {
        let value = read_json(fs, &index_path)?;
        let Value::Object(map) = value else {
            return Err(SnapshotError::Unparseable {
                file: index_path,
                reason: "expected an object mapping sections to files".to_string(),
            });
        };
        return Ok(map
            .into_iter()
            .filter_map(|(section, file)| match file {
                Value::String(file) => Some((section, file)),
                _ => None,
            })
            .collect());
    }

    tracing::info!(dir = %dir.display(), "no index.json, indexing directory contents");
    let names = fs
        .list_dir(dir)
        .map_err(|e| SnapshotError::Io { path: dir.to_path_buf(), reason: e.to_string() })?;
    let index: BTreeMap<String, String> = names
        .into_iter()
        .filter(|name| {
            name.ends_with(".json") && name != METADATA_FILE && name != INDEX_FILE
        })
        .map(|name| (section_name(&name).to_string(), name))
        .collect();
    if index.is_empty() {
        return Err(SnapshotError::Empty(dir.to_path_buf()));
    }
    Ok(index)
}

fn select_sections(
    index: &BTreeMap<String, String>,
    focus: &[String],
) -> Result<Vec<String>, SnapshotError> {
    if focus.is_empty() || focus.iter().any(|f| f == ALL_SECTIONS) {
        return Ok(index.keys().cloned().collect());
    }
    let mut selected = Vec::new();
    for section in focus {
        if index.contains_key(section) {
            selected.push(section.clone());
        } else {
            tracing::warn!(section = %section, "section not found in snapshot data");
        }
    }
    if selected.is_empty() {
        return Err(SnapshotError::NoMatchingSections { requested: focus.to_vec() });
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn snapshot_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "metadata.json", r#"{"ComputerName": "WS-01", "Timestamp": "2024-05-01"}"#);
        write(tmp.path(), "Path.json", r#"{"Data": [{"Path": "C:\\Windows", "Exists": true}]}"#);
        write(tmp.path(), "DiskSpace.json", r#"{"Data": [{"Name": "C", "FreeGB": 10}]}"#);
        tmp
    }

    #[test]
    fn loads_every_section_without_index() {
        let tmp = snapshot_dir();
        let snapshot = load_snapshot_dir(&LiveFileSystem, tmp.path(), &[]).unwrap();
        assert_eq!(snapshot.metadata.host.as_deref(), Some("WS-01"));
        assert_eq!(snapshot.sections.keys().collect::<Vec<_>>(), ["DiskSpace", "Path"]);
        assert_eq!(snapshot.sections["DiskSpace"], json!([{"Name": "C", "FreeGB": 10}]));
    }

    #[test]
    fn index_maps_sections_to_files() {
        let tmp = snapshot_dir();
        write(tmp.path(), "index.json", r#"{"Disks": "DiskSpace.json"}"#);
        let snapshot = load_snapshot_dir(&LiveFileSystem, tmp.path(), &[]).unwrap();
        assert_eq!(snapshot.sections.keys().collect::<Vec<_>>(), ["Disks"]);
    }

    #[test]
    fn focus_skips_unknown_sections() {
        let tmp = snapshot_dir();
        let focus = vec!["Path".to_string(), "Nope".to_string()];
        let snapshot = load_snapshot_dir(&LiveFileSystem, tmp.path(), &focus).unwrap();
        assert_eq!(snapshot.sections.keys().collect::<Vec<_>>(), ["Path"]);

        let all = vec!["All".to_string()];
        let snapshot = load_snapshot_dir(&LiveFileSystem, tmp.path(), &all).unwrap();
        assert_eq!(snapshot.sections.len(), 2);
    }

    #[test]
    fn focus_matching_nothing_is_an_error() {
        let tmp = snapshot_dir();
        let err = load_snapshot_dir(&LiveFileSystem, tmp.path(), &["Nope".to_string()]).unwrap_err();
        assert!(matches!(err, SnapshotError::NoMatchingSections { .. }));
    }

    #[test]
    fn malformed_section_becomes_error_payload() {
        let tmp = snapshot_dir();
        write(tmp.path(), "Network.json", "{ not json");
        let snapshot = load_snapshot_dir(&LiveFileSystem, tmp.path(), &[]).unwrap();
        let error = snapshot.sections["Network"]["error"].as_str().unwrap();
        assert!(error.starts_with("Failed to parse JSON"), "{error}");
    }

    #[test]
    fn missing_metadata_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "Path.json", "[]");
        let err = load_snapshot_dir(&LiveFileSystem, tmp.path(), &[]).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingMetadata(_)));
    }

    #[test]
    fn nothing_loaded_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "metadata.json", "{}");
        write(tmp.path(), "Path.json", "{");
        let err = load_snapshot_dir(&LiveFileSystem, tmp.path(), &[]).unwrap_err();
        assert!(matches!(err, SnapshotError::NothingLoaded(_)));
    }

    #[test]
    fn byte_order_mark_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("metadata.json"), b"\xEF\xBB\xBF{\"UserName\": \"bob\"}").unwrap();
        write(tmp.path(), "Path.json", "[]");
        let snapshot = load_snapshot_dir(&LiveFileSystem, tmp.path(), &[]).unwrap();
        assert_eq!(snapshot.metadata.user.as_deref(), Some("bob"));
    }
}
