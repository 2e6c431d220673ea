//! Snapshot source over a local directory tree.
//!
//! Layout: `<root>/<snapshot id>/<section>.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ports::{FetchError, FetchErrorKind, FileEntry, FileSystem, SnapshotSource, SourceFuture};

/// Reads snapshots from subdirectories of a root directory.
pub struct LocalSnapshotSource {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl LocalSnapshotSource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self { root: root.into(), fs }
    }

    fn snapshot_dir(&self, snapshot_id: &str) -> Result<PathBuf, FetchError> {
        let dir = self.root.join(checked_name(snapshot_id)?);
        if self.fs.is_dir(&dir) {
            Ok(dir)
        } else {
            Err(FetchError::new(
                FetchErrorKind::NotFound,
                format!("no snapshot directory {}", dir.display()),
            ))
        }
    }
}

/// Rejects names that would escape the root.
fn checked_name(name: &str) -> Result<&str, FetchError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(FetchError::new(FetchErrorKind::NotFound, format!("invalid name {name:?}")));
    }
    Ok(name)
}

fn io_error(path: &Path, error: &dyn std::fmt::Display) -> FetchError {
    FetchError::new(FetchErrorKind::Transport, format!("{}: {error}", path.display()))
}

impl SnapshotSource for LocalSnapshotSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn list_snapshot_ids(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(async move {
            let names = self.fs.list_dir(&self.root).map_err(|e| io_error(&self.root, &e))?;
            Ok(names.into_iter().filter(|name| self.fs.is_dir(&self.root.join(name))).collect())
        })
    }

    fn list_files(&self, snapshot_id: &str) -> SourceFuture<'_, Vec<FileEntry>> {
        let snapshot_id = snapshot_id.to_string();
        Box::pin(async move {
            let dir = self.snapshot_dir(&snapshot_id)?;
            let names = self.fs.list_dir(&dir).map_err(|e| io_error(&dir, &e))?;
            let mut files = Vec::new();
            for name in names.into_iter().filter(|n| n.ends_with(".json")) {
                let path = dir.join(&name);
                if self.fs.is_dir(&path) {
                    continue;
                }
                let size = self.fs.file_size(&path).map_err(|e| io_error(&path, &e))?;
                files.push(FileEntry { name, size });
            }
            Ok(files)
        })
    }

    fn get_file_content(&self, snapshot_id: &str, file_name: &str) -> SourceFuture<'_, Vec<u8>> {
        let snapshot_id = snapshot_id.to_string();
        let file_name = file_name.to_string();
        Box::pin(async move {
            let path = self.snapshot_dir(&snapshot_id)?.join(checked_name(&file_name)?);
            if !self.fs.exists(&path) {
                return Err(FetchError::new(
                    FetchErrorKind::NotFound,
                    format!("no file {}", path.display()),
                ));
            }
            self.fs.read(&path).map_err(|e| io_error(&path, &e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("2024-05-01/nested.json")).unwrap();
        std::fs::create_dir_all(tmp.path().join("2024-05-02")).unwrap();
        std::fs::write(tmp.path().join("2024-05-01/Path.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("2024-05-01/notes.txt"), "x").unwrap();
        std::fs::write(tmp.path().join("stray.json"), "{}").unwrap();
        tmp
    }

    #[tokio::test]
    async fn lists_directories_and_json_files() {
        let tmp = tree();
        let source = LocalSnapshotSource::new(tmp.path(), Arc::new(LiveFileSystem));
        assert_eq!(source.list_snapshot_ids().await.unwrap(), ["2024-05-01", "2024-05-02"]);
        let files = source.list_files("2024-05-01").await.unwrap();
        assert_eq!(files, [FileEntry { name: "Path.json".to_string(), size: 2 }]);
        assert_eq!(source.get_file_content("2024-05-01", "Path.json").await.unwrap(), b"[]");
    }

    #[tokio::test]
    async fn missing_items_are_not_found() {
        let tmp = tree();
        let source = LocalSnapshotSource::new(tmp.path(), Arc::new(LiveFileSystem));
        let err = source.list_files("nope").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NotFound);
        let err = source.get_file_content("2024-05-01", "Gone.json").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NotFound);
        let err = source.get_file_content("..", "stray.json").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NotFound);
    }
}
