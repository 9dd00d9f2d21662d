//! Engine facade
//!
//! Wires the scanner, scheduler, watcher and call graph extractor around one
//! shared [`SymbolIndex`] and exposes the query surface used by front ends.
//! Blocking work (scans, call graph walks) is moved onto tokio's blocking
//! pool so index reads stay responsive.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::error::{IndexerError, Result};
use crate::index::{
    CallGraphReport, ChangeNotification, FileSummary, ProjectTreeNode, SearchHit, SnapshotStore,
    SymbolIndex,
};
use crate::indexer::walker::relative_path;
use crate::indexer::{
    ChangeScheduler, CrossFileCallGraphExtractor, ProgressSnapshot, ProjectScanner,
    SchedulerHandle, SubscriberId, WatcherService, WatcherState,
};
use crate::languages::{AnalyzerRegistry, LanguageCapability};

/// Point-in-time view of the engine for status requests
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub root: String,
    pub files_indexed: usize,
    pub symbols_indexed: usize,
    pub watcher: WatcherState,
    pub pending_changes: usize,
    pub subscribers: usize,
    pub scan: ProgressSnapshot,
}

pub struct CodeIntelligence {
    config: EngineConfig,
    root: PathBuf,
    registry: Arc<AnalyzerRegistry>,
    index: Arc<SymbolIndex>,
    scanner: Arc<ProjectScanner>,
    scheduler: Arc<ChangeScheduler>,
    watcher: Arc<WatcherService>,
    call_graph: Arc<CrossFileCallGraphExtractor>,
    scheduler_handle: Mutex<Option<SchedulerHandle>>,
}

impl CodeIntelligence {
    /// Builds every component; fails only on an invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let root = config.canonical_root()?;

        let registry = Arc::new(AnalyzerRegistry::new());
        for capability in registry.capabilities().iter().filter(|c| !c.available) {
            tracing::warn!("{} support degraded: {}", capability.language, capability.reason);
        }

        let index = Arc::new(SymbolIndex::new());
        let scanner = Arc::new(
            ProjectScanner::new(
                root.clone(),
                registry.clone(),
                index.clone(),
                SnapshotStore::new(config.snapshot_path()),
            )
            .with_exclude_dirs(config.exclude_dirs.iter().cloned())
            .with_gitignore(config.respect_gitignore)
            .with_docstrings(config.extract_docstrings),
        );
        let scheduler = Arc::new(ChangeScheduler::new(scanner.clone(), config.debounce()?));
        let watcher = Arc::new(WatcherService::new(root.clone()));
        let call_graph = Arc::new(
            CrossFileCallGraphExtractor::new(root.clone(), registry.clone(), config.source_roots.clone())
                .with_max_files(config.max_files),
        );

        Ok(Self {
            config,
            root,
            registry,
            index,
            scanner,
            scheduler,
            watcher,
            call_graph,
            scheduler_handle: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    pub fn scanner(&self) -> &Arc<ProjectScanner> {
        &self.scanner
    }

    pub fn scheduler(&self) -> &Arc<ChangeScheduler> {
        &self.scheduler
    }

    /// Watcher first, then the initial scan, then the periodic drain loop.
    ///
    /// Edits that land while the initial scan runs are already pending when
    /// the loop starts, so its first drain picks them up.
    pub async fn start(&self) -> Result<()> {
        if self.config.watch_enabled {
            let scheduler = self.scheduler.clone();
            let scanner = self.scanner.clone();
            let state = self.watcher.start(move |event| {
                if scanner.is_relevant(&event.path) {
                    scheduler.enqueue_event(&event);
                }
            });
            tracing::debug!("Watcher state: {:?}", state);
        }

        self.initial_scan().await?;

        let mut handle = self.scheduler_handle.lock();
        if handle.is_none() {
            *handle = Some(self.scheduler.spawn());
        }
        Ok(())
    }

    /// Snapshot hydrate followed by a full scan to catch drift; returns the file count
    pub async fn initial_scan(&self) -> Result<usize> {
        let scanner = self.scanner.clone();
        run_blocking(move || {
            if scanner.hydrate_from_snapshot() {
                tracing::debug!("Index warm-started from snapshot");
            }
            scanner.full_scan().map(|summaries| summaries.len())
        })
        .await?
    }

    pub fn get_tree(&self) -> ProjectTreeNode {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());
        self.index.tree(&name)
    }

    /// Summary for a root-relative or absolute path
    pub fn get_file(&self, path: &str) -> Option<Arc<FileSummary>> {
        let key = self.index_key(path)?;
        self.index.get(&key)
    }

    pub fn search(&self, term: &str) -> Vec<SearchHit> {
        self.index.search(term)
    }

    /// Full rescan publishing whatever changed; `None` when nothing did
    pub async fn force_rescan(&self) -> Result<Option<ChangeNotification>> {
        let scheduler = self.scheduler.clone();
        run_blocking(move || scheduler.force_rescan()).await?
    }

    /// Applies pending watcher events now instead of at the next tick
    pub async fn refresh(&self) -> Result<Option<ChangeNotification>> {
        let scheduler = self.scheduler.clone();
        run_blocking(move || scheduler.force_drain()).await
    }

    pub fn subscribe(&self) -> (SubscriberId, mpsc::UnboundedReceiver<ChangeNotification>) {
        self.scheduler.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.scheduler.unsubscribe(id)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            root: self.root.display().to_string(),
            files_indexed: self.index.len(),
            symbols_indexed: self.index.symbol_count(),
            watcher: self.watcher.state(),
            pending_changes: self.scheduler.pending_count(),
            subscribers: self.scheduler.subscriber_count(),
            scan: self.scanner.progress().snapshot(),
        }
    }

    pub fn capabilities(&self) -> Vec<LanguageCapability> {
        self.registry.capabilities()
    }

    /// Cross-file call graph from `path`; `max_files` defaults to the configured ceiling
    pub async fn analyze_file(
        &self,
        path: impl Into<PathBuf>,
        recursive: bool,
        max_files: Option<usize>,
    ) -> Result<CallGraphReport> {
        let path = path.into();
        let graph = self.call_graph.clone();
        let max_files = max_files.unwrap_or(self.config.max_files);
        run_blocking(move || graph.analyze_file(&path, recursive, max_files)).await?
    }

    pub async fn trace_chain(&self, qualified: impl Into<String>, max_depth: usize) -> Result<Vec<String>> {
        let qualified = qualified.into();
        let graph = self.call_graph.clone();
        run_blocking(move || graph.trace_chain(&qualified, max_depth)).await?
    }

    /// Stops the watcher and the drain loop; pending events are applied first
    pub async fn shutdown(&self) -> Result<()> {
        let watcher = self.watcher.clone();
        run_blocking(move || watcher.stop()).await?;

        let handle = self.scheduler_handle.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        if self.scheduler.pending_count() > 0 {
            self.refresh().await?;
        }
        tracing::info!("Engine for {} stopped", self.root.display());
        Ok(())
    }

    fn index_key(&self, path: &str) -> Option<String> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return relative_path(&self.root, candidate);
        }
        let key = path.replace('\\', "/");
        Some(key.trim_start_matches("./").to_string())
    }
}

async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IndexerError::Index(format!("worker task failed: {}", e)))
}
