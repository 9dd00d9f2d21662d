pub mod call_graph;
pub mod extractor;
pub mod hashing;
pub mod import_resolver;
pub mod parser;
pub mod progress;
pub mod scanner;
pub mod scheduler;
pub mod walker;
pub mod watcher;

pub use call_graph::{CrossFileCallGraphExtractor, DEFAULT_MAX_FILES};
pub use extractor::{CallSite, FileAnalysis, SymbolExtractor};
pub use hashing::compute_content_hash;
pub use import_resolver::{
    ImportBinding, ImportMap, ImportResolver, ImportResolverRegistry, ProjectFiles,
    ProjectImportResolver, PythonImportResolver, Resolution, RustImportResolver,
    TypeScriptImportResolver,
};
pub use parser::{ParsedFile, Parser};
pub use progress::{ProgressSnapshot, ScanProgress};
pub use scanner::ProjectScanner;
pub use scheduler::{ChangeScheduler, SchedulerHandle, SubscriberId};
pub use walker::FileWalker;
pub use watcher::{FileEvent, FileEventKind, WatcherService, WatcherState};
