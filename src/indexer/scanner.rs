//! Project scanner
//!
//! Owns the only write path into the [`SymbolIndex`]. Every mutating
//! operation takes the scanner's write gate first, so a full scan, an
//! incremental scan and a snapshot hydrate never interleave, and snapshot
//! saves happen one at a time.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;

use crate::error::Result;
use crate::index::{AnalysisError, FileSummary, ScanOutcome, SnapshotStore, SymbolIndex};
use crate::indexer::extractor::{FileAnalysis, SymbolExtractor};
use crate::indexer::hashing::compute_content_hash;
use crate::indexer::parser::Parser;
use crate::indexer::progress::ScanProgress;
use crate::indexer::walker::{relative_path, FileWalker};
use crate::languages::AnalyzerRegistry;

pub struct ProjectScanner {
    root: PathBuf,
    parser: Parser,
    extractor: SymbolExtractor,
    walker: FileWalker,
    index: Arc<SymbolIndex>,
    snapshot: SnapshotStore,
    write_gate: Mutex<()>,
    occupancy: GateOccupancy,
    progress: ScanProgress,
}

#[derive(Default)]
struct GateOccupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct GateGuard<'a> {
    _gate: MutexGuard<'a, ()>,
    occupancy: &'a GateOccupancy,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.occupancy.current.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ProjectScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        registry: Arc<AnalyzerRegistry>,
        index: Arc<SymbolIndex>,
        snapshot: SnapshotStore,
    ) -> Self {
        Self {
            root: root.into(),
            parser: Parser::new(registry.clone()),
            extractor: SymbolExtractor::new(),
            walker: FileWalker::new(registry),
            index,
            snapshot,
            write_gate: Mutex::new(()),
            occupancy: GateOccupancy::default(),
            progress: ScanProgress::new(),
        }
    }

    pub fn with_exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.walker = self.walker.with_exclude_dirs(dirs);
        self
    }

    pub fn with_gitignore(mut self, enabled: bool) -> Self {
        self.walker = self.walker.with_gitignore(enabled);
        self
    }

    pub fn with_docstrings(mut self, enabled: bool) -> Self {
        self.extractor = self.extractor.with_docstrings(enabled);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    pub fn progress(&self) -> &ScanProgress {
        &self.progress
    }

    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    /// Walks the whole tree and replaces the index contents.
    ///
    /// Files whose hash matches the summary already in the index (typically
    /// hydrated from the snapshot) are not re-analyzed.
    pub fn full_scan(&self) -> Result<Vec<Arc<FileSummary>>> {
        let _gate = self.enter();

        let files = self.walker.walk(&self.root)?;
        tracing::info!("Scanning {} files in {}", files.len(), self.root.display());
        self.progress.start(files.len());

        let previous: HashMap<String, Arc<FileSummary>> = self
            .index
            .all()
            .into_iter()
            .map(|s| (s.path.clone(), s))
            .collect();

        let summaries: Vec<FileSummary> = files
            .par_iter()
            .filter_map(|path| {
                let rel = relative_path(&self.root, path)?;
                self.summarize(&rel, path, previous.get(&rel).map(|s| s.as_ref()))
            })
            .collect();

        let with_errors = summaries.iter().filter(|s| s.has_errors()).count();
        self.index.replace_all(summaries);
        self.persist();
        self.progress.finish();

        tracing::info!(
            "Full scan complete: {} files, {} symbols, {} with errors",
            self.index.len(),
            self.index.symbol_count(),
            with_errors
        );
        Ok(self.index.all())
    }

    /// Re-checks the given paths (absolute or root-relative) against disk.
    ///
    /// A path that is now a directory (created, or renamed into place) has
    /// every eligible file below it indexed. Unreadable paths are skipped, so
    /// the scan itself cannot fail.
    pub fn incremental_scan(&self, paths: &[PathBuf]) -> ScanOutcome {
        let _gate = self.enter();
        let mut outcome = ScanOutcome::default();

        for path in paths {
            let abs = if path.is_absolute() {
                path.clone()
            } else {
                self.root.join(path)
            };
            let Some(rel) = self.relative(&abs) else {
                tracing::debug!("Ignoring path outside project: {}", abs.display());
                continue;
            };
            if self.walker.is_excluded(Path::new(&rel)) {
                continue;
            }

            if !abs.exists() {
                self.remove_under(&rel, &mut outcome);
            } else if abs.is_dir() {
                self.rescan_dir(&rel, &abs, &mut outcome);
            } else if abs.is_file() && self.walker.is_supported(&abs) {
                self.rescan_file(rel, &abs, &mut outcome);
            }
        }

        if !outcome.updated.is_empty() || !outcome.deleted.is_empty() {
            self.persist();
        }
        outcome
    }

    /// Loads the snapshot into the index; `false` when there was nothing usable
    pub fn hydrate_from_snapshot(&self) -> bool {
        let _gate = self.enter();

        match self.snapshot.load() {
            Ok(Some(summaries)) => {
                tracing::info!(
                    "Hydrated {} files from snapshot {}",
                    summaries.len(),
                    self.snapshot.path().display()
                );
                self.index.replace_all(summaries);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(
                    "Discarding unreadable snapshot {}: {}",
                    self.snapshot.path().display(),
                    e
                );
                false
            }
        }
    }

    /// Whether a change at `path` can affect the index at all
    pub fn is_relevant(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(rel) => !self.walker.is_excluded(Path::new(&rel)),
            None => false,
        }
    }

    fn relative(&self, abs: &Path) -> Option<String> {
        relative_path(&self.root, abs).or_else(|| {
            // Watchers may report canonical paths for a non-canonical root
            let canonical = abs.canonicalize().ok()?;
            let root = self.root.canonicalize().ok()?;
            relative_path(&root, &canonical)
        })
    }

    /// Removes `rel` and, for a deleted directory, everything below it
    fn remove_under(&self, rel: &str, outcome: &mut ScanOutcome) {
        let prefix = format!("{}/", rel);
        for path in self.index.paths() {
            if (path == rel || path.starts_with(&prefix)) && self.index.remove(&path) {
                tracing::debug!("Removed {} from index", path);
                outcome.deleted.push(path);
            }
        }
    }

    /// Indexes the files a directory holds and drops entries below it that are gone
    fn rescan_dir(&self, rel: &str, abs: &Path, outcome: &mut ScanOutcome) {
        let files = match self.walker.walk(abs) {
            Ok(files) => files,
            Err(e) => {
                tracing::debug!("Skipping directory {}: {}", rel, e);
                return;
            }
        };
        tracing::debug!("Directory {} holds {} files", rel, files.len());

        for file in files {
            let Some(file_rel) = self.relative(&file) else {
                continue;
            };
            if !self.walker.is_excluded(Path::new(&file_rel)) {
                self.rescan_file(file_rel, &file, outcome);
            }
        }

        let prefix = format!("{}/", rel);
        for path in self.index.paths() {
            if path.starts_with(&prefix) && !self.root.join(&path).exists() && self.index.remove(&path) {
                tracing::debug!("Removed {} from index", path);
                outcome.deleted.push(path);
            }
        }
    }

    /// Re-indexes one file unless its content hash is unchanged
    fn rescan_file(&self, rel: String, abs: &Path, outcome: &mut ScanOutcome) {
        if let Some(prev) = self.index.get(&rel) {
            if let Ok(content) = fs::read(abs) {
                if prev.content_hash == compute_content_hash(&content) {
                    outcome.unchanged.push(rel);
                    return;
                }
            }
        }

        match self.summarize(&rel, abs, None) {
            Some(summary) => {
                tracing::debug!("Re-indexed {}", rel);
                self.index.put(&rel, summary);
                outcome.updated.push(rel);
            }
            // Vanished between the existence check and the read
            None => self.remove_under(&rel, outcome),
        }
    }

    /// Takes the write gate; every mutation of the index goes through here
    fn enter(&self) -> GateGuard<'_> {
        let gate = self.write_gate.lock();
        let current = self.occupancy.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.occupancy.peak.fetch_max(current, Ordering::AcqRel);
        GateGuard {
            _gate: gate,
            occupancy: &self.occupancy,
        }
    }

    /// Largest number of scans ever seen inside the write gate at once
    pub(crate) fn peak_concurrent_scans(&self) -> usize {
        self.occupancy.peak.load(Ordering::Acquire)
    }

    /// Summary for one file, `None` if it disappeared before it could be read
    fn summarize(&self, rel: &str, abs: &Path, previous: Option<&FileSummary>) -> Option<FileSummary> {
        let content = match fs::read(abs) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", rel, e);
                self.progress.inc_error();
                return Some(
                    FileAnalysis::failed(AnalysisError::new(format!("failed to read file: {}", e)))
                        .into_summary(rel, "", Utc::now()),
                );
            }
        };

        let content_hash = compute_content_hash(&content);
        if let Some(prev) = previous {
            if prev.content_hash == content_hash {
                self.progress.inc(prev.symbols.len());
                return Some(prev.clone());
            }
        }

        let modified_at = fs::metadata(abs)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let analysis = self.analyze_content(abs, &content);
        if analysis.errors.is_empty() {
            self.progress.inc(analysis.symbols.len());
        } else {
            self.progress.inc_error();
        }
        Some(analysis.into_summary(rel, content_hash, modified_at))
    }

    fn analyze_content(&self, abs: &Path, content: &[u8]) -> FileAnalysis {
        let Some(analyzer) = self.parser.analyzer_for(abs) else {
            return FileAnalysis::failed(AnalysisError::new("no analyzer available"));
        };
        let source = String::from_utf8_lossy(content);
        match self.parser.parse_source(&source, analyzer) {
            Ok(parsed) => self.extractor.analyze(&parsed),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", abs.display(), e);
                FileAnalysis::failed(AnalysisError::new(e.to_string()))
            }
        }
    }

    fn persist(&self) {
        let summaries = self.index.all();
        if let Err(e) = self.snapshot.save(summaries.iter().map(|s| s.as_ref())) {
            tracing::warn!(
                "Failed to save snapshot {}: {}",
                self.snapshot.path().display(),
                e
            );
        }
    }
}
