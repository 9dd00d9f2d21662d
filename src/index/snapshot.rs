//! On-disk snapshot of the symbol index
//!
//! The snapshot is a single JSON document keyed by project-relative path. It
//! is only a warm-start hint: the scanner re-hashes every file after loading
//! it, so stale entries get re-analyzed.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, Result};
use crate::index::models::{AnalysisError, FileSummary, Symbol};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    files: BTreeMap<String, SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    content_hash: String,
    modified_at: DateTime<Utc>,
    #[serde(default)]
    symbols: Vec<Symbol>,
    #[serde(default)]
    errors: Vec<AnalysisError>,
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the snapshot through a temp file and a rename, so `load` never
    /// sees a partially written document.
    pub fn save<'a, I>(&self, summaries: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a FileSummary>,
    {
        let files = summaries
            .into_iter()
            .map(|s| {
                (
                    s.path.clone(),
                    SnapshotEntry {
                        content_hash: s.content_hash.clone(),
                        modified_at: s.modified_at,
                        symbols: s.symbols.clone(),
                        errors: s.errors.clone(),
                    },
                )
            })
            .collect();
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION,
            files,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path)?;
            serde_json::to_writer(&mut file, &snapshot)?;
            file.flush()?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::debug!(
            "Saved snapshot with {} files to {}",
            snapshot.files.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Reads the snapshot back.
    ///
    /// `Ok(None)` means there is no snapshot yet; a malformed or
    /// incompatible file is an error the caller is expected to absorb.
    pub fn load(&self) -> Result<Option<Vec<FileSummary>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: SnapshotFile = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexerError::Index(format!(
                "Unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let summaries = snapshot
            .files
            .into_iter()
            .map(|(path, entry)| FileSummary {
                path,
                content_hash: entry.content_hash,
                modified_at: entry.modified_at,
                symbols: entry.symbols,
                errors: entry.errors,
            })
            .collect();

        Ok(Some(summaries))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::models::SymbolKind;
    use tempfile::TempDir;

    fn sample() -> Vec<FileSummary> {
        vec![
            FileSummary {
                path: "a.py".into(),
                content_hash: "1111".into(),
                modified_at: Utc::now(),
                symbols: vec![
                    Symbol::new("Widget", SymbolKind::Class, 1).with_docstring("A widget."),
                    Symbol::new("draw", SymbolKind::Method, 3).with_parent("Widget"),
                ],
                errors: vec![],
            },
            FileSummary {
                path: "pkg/b.py".into(),
                content_hash: "2222".into(),
                modified_at: Utc::now(),
                symbols: vec![],
                errors: vec![AnalysisError::at("invalid syntax", 2, 4)],
            },
        ]
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing.json"));
        assert!(store.load().unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_save_then_load_preserves_entries() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested/index.json"));
        let original = sample();

        store.save(&original).unwrap();
        let mut loaded = store.load().unwrap().unwrap();
        loaded.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(loaded.len(), 2);
        for (a, b) in original.iter().zip(loaded.iter()) {
            assert_eq!(a.path, b.path);
            assert_eq!(a.content_hash, b.content_hash);
            assert_eq!(a.symbols, b.symbols);
            assert_eq!(a.errors, b.errors);
            assert_eq!(a.modified_at, b.modified_at);
        }
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("index.json"));
        store.save(&sample()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["index.json".to_string()]);
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SnapshotStore::new(&path);
        assert!(store.load().is_err());
    }

    #[test]
    fn test_wrong_version_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, r#"{"version": 99, "files": {}}"#).unwrap();

        let store = SnapshotStore::new(&path);
        assert!(matches!(store.load(), Err(IndexerError::Index(_))));
    }

    #[test]
    fn test_persisted_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let store = SnapshotStore::new(&path);
        store.save(&sample()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &value["files"]["a.py"];
        assert_eq!(entry["content_hash"], "1111");
        assert!(entry["modified_at"].as_str().unwrap().ends_with('Z'));
        assert_eq!(entry["symbols"][1]["parent"], "Widget");
        assert_eq!(value["files"]["pkg/b.py"]["errors"][0]["column"], 4);
    }
}
