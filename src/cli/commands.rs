use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use code_intel::error::Result;
use code_intel::{CodeIntelligence, EngineConfig, SearchHit};

#[derive(Parser)]
#[command(name = "code-intel")]
#[command(about = "Incremental code intelligence: symbol index, change watching and call graphs")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Scan the current directory and write the snapshot
    code-intel scan

    # Keep the index live and print every change as JSON
    code-intel watch --root ./project

    # Search symbols by case-insensitive substring
    code-intel search parse

    # Call graph of one file, following imports into at most 20 files
    code-intel callgraph src/app.py --max-files 20

    # Depth-first call chain from one function
    code-intel trace "src/app.py::main" --max-depth 5
"#)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalOptions {
    /// Project root
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/.code-intel.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Additional directory names to skip
    #[arg(long = "exclude", global = true)]
    pub exclude: Vec<String>,

    /// Do not capture docstrings
    #[arg(long, global = true)]
    pub no_docstrings: bool,

    /// Ignore .gitignore and .ignore files
    #[arg(long, global = true)]
    pub no_gitignore: bool,

    /// Snapshot file location
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full scan of the project; writes the snapshot and prints a summary
    Scan,

    /// Keep the index up to date and print change notifications
    Watch {
        /// Seconds between drains of pending changes
        #[arg(long)]
        debounce: Option<f64>,
    },

    /// Case-insensitive substring search over symbol names
    Search {
        /// Search term
        term: String,
    },

    /// Directory tree with per-file symbols
    Tree,

    /// Summary of one file
    File {
        /// Path relative to the root
        path: String,
    },

    /// Cross-file call graph starting at one file
    Callgraph {
        /// Path relative to the root
        path: PathBuf,

        /// Only analyze the starting file
        #[arg(long)]
        no_recursive: bool,

        /// Maximum number of files to analyze
        #[arg(long)]
        max_files: Option<usize>,
    },

    /// Depth-first call chain from a qualified name such as `a.py::main`
    Trace {
        qualified: String,

        #[arg(long, default_value = "10")]
        max_depth: usize,
    },

    /// Supported languages and their availability
    Capabilities,

    /// Index and watcher status after a scan
    Status,
}

#[derive(Serialize)]
struct ScanSummary {
    root: String,
    files: usize,
    symbols: usize,
    files_with_errors: usize,
    elapsed_ms: u64,
    snapshot: String,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    term: &'a str,
    count: usize,
    results: Vec<SearchHit>,
}

/// Engine configuration from the config file plus command-line overrides
pub fn load_config(options: &GlobalOptions) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(&options.root, options.config.as_deref())?;
    // An explicit --root wins over a root named in the file
    if options.root != Path::new(".") {
        config.root = options.root.clone();
    }
    for dir in &options.exclude {
        if !config.exclude_dirs.contains(dir) {
            config.exclude_dirs.push(dir.clone());
        }
    }
    if options.no_docstrings {
        config.extract_docstrings = false;
    }
    if options.no_gitignore {
        config.respect_gitignore = false;
    }
    if let Some(snapshot) = &options.snapshot {
        config.snapshot_path = Some(snapshot.clone());
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Engine with a freshly scanned index
async fn scanned_engine(config: EngineConfig) -> Result<CodeIntelligence> {
    let engine = CodeIntelligence::new(config)?;
    engine.initial_scan().await?;
    Ok(engine)
}

pub async fn scan(config: EngineConfig) -> Result<()> {
    let engine = scanned_engine(config).await?;
    let status = engine.status();
    let files_with_errors = engine
        .index()
        .all()
        .iter()
        .filter(|s| s.has_errors())
        .count();

    print_json(&ScanSummary {
        root: status.root,
        files: status.files_indexed,
        symbols: status.symbols_indexed,
        files_with_errors,
        elapsed_ms: status.scan.elapsed_ms,
        snapshot: engine.config().snapshot_path().display().to_string(),
    })
}

pub async fn watch(mut config: EngineConfig, debounce: Option<f64>) -> Result<()> {
    if let Some(secs) = debounce {
        config.debounce_secs = secs;
    }
    config.watch_enabled = true;

    let engine = CodeIntelligence::new(config)?;
    let (id, mut changes) = engine.subscribe();
    engine.start().await?;

    let status = engine.status();
    tracing::info!(
        "Indexed {} files ({} symbols); watcher {:?}",
        status.files_indexed,
        status.symbols_indexed,
        status.watcher
    );

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Some(notification) => println!("{}", serde_json::to_string(&notification)?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    engine.unsubscribe(id);
    engine.shutdown().await
}

pub async fn search(config: EngineConfig, term: &str) -> Result<()> {
    let engine = scanned_engine(config).await?;
    let results = engine.search(term);
    print_json(&SearchOutput {
        term,
        count: results.len(),
        results,
    })
}

pub async fn tree(config: EngineConfig) -> Result<()> {
    let engine = scanned_engine(config).await?;
    print_json(&engine.get_tree())
}

pub async fn file(config: EngineConfig, path: &str) -> Result<()> {
    let engine = scanned_engine(config).await?;
    match engine.get_file(path) {
        Some(summary) => print_json(summary.as_ref()),
        None => Err(code_intel::IndexerError::FileNotFound(path.to_string())),
    }
}

pub async fn callgraph(
    config: EngineConfig,
    path: PathBuf,
    recursive: bool,
    max_files: Option<usize>,
) -> Result<()> {
    let engine = CodeIntelligence::new(config)?;
    let report = engine.analyze_file(path, recursive, max_files).await?;
    print_json(&report)
}

pub async fn trace(config: EngineConfig, qualified: String, max_depth: usize) -> Result<()> {
    let engine = CodeIntelligence::new(config)?;
    let chain = engine.trace_chain(qualified, max_depth).await?;
    print_json(&chain)
}

pub fn capabilities(config: EngineConfig) -> Result<()> {
    let engine = CodeIntelligence::new(config)?;
    print_json(&engine.capabilities())
}

pub async fn status(config: EngineConfig) -> Result<()> {
    let engine = scanned_engine(config).await?;
    print_json(&engine.status())
}
