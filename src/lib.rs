pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod indexer;
pub mod languages;

pub use config::EngineConfig;
pub use engine::{CodeIntelligence, EngineStatus};
pub use error::{IndexerError, Result};
pub use index::{
    qualified_name, split_qualified_name, AnalysisError, CallGraph, CallGraphReport,
    ChangeNotification, FileSummary, ProjectTreeNode, ScanOutcome, SearchHit, SnapshotStore,
    Symbol, SymbolIndex, SymbolKind,
};
pub use indexer::{
    ChangeScheduler, CrossFileCallGraphExtractor, FileEvent, FileEventKind, FileWalker,
    ImportMap, Parser, ProjectImportResolver, ProjectScanner, Resolution, SymbolExtractor,
    WatcherService, WatcherState,
};
pub use languages::{AnalyzerRegistry, LanguageAnalyzer, LanguageCapability, RawImport};
