//! Cross-file call graph
//!
//! Builds a `<path>::<symbol>` call graph starting from one file and following
//! calls through resolved imports into other project files. Per-file results
//! are cached by content hash, so an unchanged file is never re-parsed, and a
//! visited set bounds every traversal.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{IndexerError, Result};
use crate::index::{qualified_name, split_qualified_name, CallGraph, CallGraphReport, SymbolKind};
use crate::indexer::extractor::{CallSite, FileAnalysis, SymbolExtractor};
use crate::indexer::hashing::compute_content_hash;
use crate::indexer::import_resolver::{ImportMap, ProjectFiles, ProjectImportResolver, Resolution};
use crate::indexer::parser::Parser;
use crate::languages::{AnalyzerRegistry, RawImport};

pub const DEFAULT_MAX_FILES: usize = 50;

const RECEIVER_SELF: &[&str] = &["self", "this", "Self", "cls"];

/// Everything the graph needs from one file, valid for one content hash
#[derive(Debug)]
struct FileCallData {
    content_hash: String,
    /// Local names of every function and method
    callables: Vec<String>,
    /// `(caller local name, qualified callee)` in source order
    edges: Vec<(String, String)>,
    /// Project files the edges point into
    dependencies: BTreeSet<String>,
    /// Hashes of files whose exports were consulted for `*` imports
    consulted: Vec<(String, String)>,
}

/// Names a file defines at top level and methods by `Class.method`
#[derive(Default)]
struct LocalDefinitions {
    functions: HashSet<String>,
    classes: HashSet<String>,
    methods: HashSet<String>,
}

impl LocalDefinitions {
    fn from_analysis(analysis: &FileAnalysis) -> Self {
        let mut defs = Self::default();
        for symbol in &analysis.symbols {
            match symbol.kind {
                SymbolKind::Function => {
                    defs.functions.insert(symbol.name.clone());
                }
                SymbolKind::Class => {
                    defs.classes.insert(symbol.name.clone());
                }
                SymbolKind::Method => {
                    defs.methods.insert(symbol.local_name());
                }
            }
        }
        defs
    }

    fn method(&self, class: &str, name: &str) -> Option<String> {
        let local = format!("{}.{}", class, name);
        self.methods.contains(&local).then_some(local)
    }

    /// Constructor call target for a class defined here
    fn constructor(&self, class: &str) -> String {
        ["__init__", "constructor", "new"]
            .iter()
            .find_map(|init| self.method(class, init))
            .unwrap_or_else(|| class.to_string())
    }
}

/// State of one `analyze_file` request
struct Walk {
    recursive: bool,
    limit: usize,
    graph: CallGraph,
    analyzed_files: Vec<String>,
}

pub struct CrossFileCallGraphExtractor {
    parser: Parser,
    extractor: SymbolExtractor,
    resolver: ProjectImportResolver,
    max_files: usize,
    cache: Mutex<HashMap<String, Arc<FileCallData>>>,
    analyses: AtomicUsize,
}

impl CrossFileCallGraphExtractor {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<AnalyzerRegistry>, source_roots: Vec<String>) -> Self {
        let files = ProjectFiles::new(root, source_roots);
        Self {
            parser: Parser::new(registry.clone()),
            extractor: SymbolExtractor::new().with_docstrings(false),
            resolver: ProjectImportResolver::new(files, registry),
            max_files: DEFAULT_MAX_FILES,
            cache: Mutex::new(HashMap::new()),
            analyses: AtomicUsize::new(0),
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn resolver(&self) -> &ProjectImportResolver {
        &self.resolver
    }

    /// Number of files parsed so far; cache hits do not count
    pub fn analysis_count(&self) -> usize {
        self.analyses.load(Ordering::Relaxed)
    }

    pub fn cached_files(&self) -> usize {
        self.cache.lock().len()
    }

    /// Call graph of `path`, following resolved imports when `recursive`.
    ///
    /// At most `max_files` files are analyzed; the starting file always is.
    pub fn analyze_file(&self, path: &Path, recursive: bool, max_files: usize) -> Result<CallGraphReport> {
        let start = self
            .resolver
            .relative(path)
            .ok_or_else(|| IndexerError::FileNotFound(path.display().to_string()))?;

        let mut walk = Walk {
            recursive,
            limit: max_files.max(1),
            graph: CallGraph::new(),
            analyzed_files: Vec::new(),
        };
        let mut visited: HashSet<String> = HashSet::new();
        self.walk(&start, &mut visited, &mut walk)?;
        let Walk {
            graph,
            analyzed_files,
            ..
        } = walk;

        let called: HashSet<&String> = graph.values().flatten().collect();
        let entry_points = graph
            .keys()
            .filter(|name| !called.contains(name))
            .cloned()
            .collect();

        Ok(CallGraphReport {
            call_graph: graph,
            entry_points,
            analyzed_files,
        })
    }

    /// Adds `file` to the graph, then follows its dependencies depth first.
    ///
    /// Only a failure to load `file` itself is returned; dependencies that
    /// cannot be loaded are skipped.
    fn walk(&self, file: &str, visited: &mut HashSet<String>, walk: &mut Walk) -> Result<()> {
        if walk.analyzed_files.len() >= walk.limit {
            tracing::debug!("Call graph stopped at {} files before {}", walk.limit, file);
            return Ok(());
        }
        if !visited.insert(file.to_string()) {
            return Ok(());
        }

        let data = self.load(file)?;
        walk.analyzed_files.push(file.to_string());

        for callable in &data.callables {
            walk.graph.entry(qualified_name(file, callable)).or_default();
        }
        for (caller, callee) in &data.edges {
            let callees = walk.graph.entry(qualified_name(file, caller)).or_default();
            if !callees.contains(callee) {
                callees.push(callee.clone());
            }
        }

        if walk.recursive {
            for dep in &data.dependencies {
                if let Err(e) = self.walk(dep, visited, walk) {
                    tracing::debug!("Skipping {} in call graph: {}", dep, e);
                }
            }
        }
        Ok(())
    }

    /// Depth-first chain of calls starting at `qualified`, without revisits.
    ///
    /// Unknown names yield an empty chain.
    pub fn trace_chain(&self, qualified: &str, max_depth: usize) -> Result<Vec<String>> {
        let Some((path, _)) = split_qualified_name(qualified) else {
            return Ok(Vec::new());
        };
        let report = self.analyze_file(Path::new(path), true, self.max_files)?;
        if !report.call_graph.contains_key(qualified) {
            return Ok(Vec::new());
        }

        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(qualified.to_string(), 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if !seen.insert(node.clone()) {
                continue;
            }
            if depth < max_depth {
                if let Some(callees) = report.call_graph.get(&node) {
                    stack.extend(
                        callees
                            .iter()
                            .rev()
                            .filter(|c| !seen.contains(*c))
                            .map(|c| (c.clone(), depth + 1)),
                    );
                }
            }
            chain.push(node);
        }
        Ok(chain)
    }

    /// Drops cached results; the next request re-parses everything
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn load(&self, file: &str) -> Result<Arc<FileCallData>> {
        let abs = self.resolver.files().root().join(file);
        let content = match read_file(&abs, file) {
            Ok(content) => content,
            Err(e) => {
                if matches!(e, IndexerError::FileNotFound(_)) && self.cache.lock().remove(file).is_some() {
                    tracing::debug!("Evicted deleted file {} from call graph cache", file);
                }
                return Err(e);
            }
        };
        let content_hash = compute_content_hash(&content);

        if let Some(cached) = self.cache.lock().get(file).cloned() {
            if cached.content_hash == content_hash && self.still_fresh(&cached) {
                return Ok(cached);
            }
        }

        let analyzer = self
            .parser
            .analyzer_for(&abs)
            .ok_or_else(|| IndexerError::UnsupportedLanguage(file.to_string()))?;
        let source = String::from_utf8_lossy(&content);
        let parsed = self.parser.parse_source(&source, analyzer)?;
        let analysis = self.extractor.analyze(&parsed);
        let imports = self.resolver.import_map(&parsed.language, file, &analysis.imports);

        let data = Arc::new(self.build(file, content_hash, &analysis, &imports));
        self.analyses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Call data for {}: {} edges", file, data.edges.len());

        self.cache.lock().insert(file.to_string(), Arc::clone(&data));
        Ok(data)
    }

    fn still_fresh(&self, data: &FileCallData) -> bool {
        data.consulted.iter().all(|(path, hash)| {
            fs::read(self.resolver.files().root().join(path))
                .map(|content| compute_content_hash(&content) == *hash)
                .unwrap_or(false)
        })
    }

    fn build(&self, file: &str, content_hash: String, analysis: &FileAnalysis, imports: &ImportMap) -> FileCallData {
        let defs = LocalDefinitions::from_analysis(analysis);

        let mut callables: Vec<String> = analysis
            .symbols
            .iter()
            .filter(|s| s.kind.is_callable())
            .map(|s| s.local_name())
            .collect();
        callables.dedup();

        let mut wildcard_exports: Vec<(String, HashSet<String>)> = Vec::new();
        let mut consulted = Vec::new();
        for binding in &imports.wildcards {
            if let Resolution::Resolved(target) = &binding.target {
                if let Some((hash, names)) = self.exported_names(target) {
                    consulted.push((target.clone(), hash));
                    wildcard_exports.push((target.clone(), names));
                }
            }
        }

        let resolve = CallResolution {
            file,
            defs: &defs,
            imports,
            wildcard_exports: &wildcard_exports,
            resolver: &self.resolver,
        };

        let mut edges = Vec::new();
        let mut dependencies = BTreeSet::new();
        for call in &analysis.calls {
            let Some(caller) = call.caller.as_ref() else {
                continue;
            };
            let Some(target) = resolve.target(call) else {
                continue;
            };
            if let Some((path, _)) = split_qualified_name(&target.qualified) {
                if target.in_project && path != file {
                    dependencies.insert(path.to_string());
                }
            }
            edges.push((caller.clone(), target.qualified));
        }

        FileCallData {
            content_hash,
            callables,
            edges,
            dependencies,
            consulted,
        }
    }

    /// Top-level names of a file, for `*` imports
    fn exported_names(&self, file: &str) -> Option<(String, HashSet<String>)> {
        let abs = self.resolver.files().root().join(file);
        let content = fs::read(&abs).ok()?;
        let analyzer = self.parser.analyzer_for(&abs)?;
        let source = String::from_utf8_lossy(&content);
        let parsed = self.parser.parse_source(&source, analyzer).ok()?;
        let names = self
            .extractor
            .analyze(&parsed)
            .symbols
            .into_iter()
            .filter(|s| s.parent.is_none())
            .map(|s| s.name)
            .collect();
        Some((compute_content_hash(&content), names))
    }
}

fn read_file(abs: &Path, file: &str) -> Result<Vec<u8>> {
    fs::read(abs).map_err(|e| match e.kind() {
        ErrorKind::NotFound => IndexerError::FileNotFound(file.to_string()),
        _ => IndexerError::Io(e),
    })
}

struct Target {
    qualified: String,
    /// Whether the path part is a project file
    in_project: bool,
}

impl Target {
    fn project(path: &str, local: &str) -> Self {
        Self {
            qualified: qualified_name(path, local),
            in_project: true,
        }
    }

    fn boundary(module: &str, local: &str) -> Self {
        Self {
            qualified: qualified_name(module, local),
            in_project: false,
        }
    }

    fn from_resolution(resolution: &Resolution, module: &str, local: &str) -> Self {
        match resolution {
            Resolution::Resolved(path) => Self::project(path, local),
            Resolution::Unresolved => Self::boundary(module, local),
        }
    }
}

/// Maps call sites of one file onto qualified targets
struct CallResolution<'a> {
    file: &'a str,
    defs: &'a LocalDefinitions,
    imports: &'a ImportMap,
    wildcard_exports: &'a [(String, HashSet<String>)],
    resolver: &'a ProjectImportResolver,
}

impl CallResolution<'_> {
    fn target(&self, call: &CallSite) -> Option<Target> {
        match call.receiver.as_deref() {
            None => self.bare(&call.callee),
            Some(receiver) => self.qualified(receiver, &call.callee, call.caller_class.as_deref()),
        }
    }

    fn bare(&self, name: &str) -> Option<Target> {
        if self.defs.functions.contains(name) {
            return Some(Target::project(self.file, name));
        }
        if self.defs.classes.contains(name) {
            return Some(Target::project(self.file, &self.defs.constructor(name)));
        }

        if let Some(binding) = self.imports.binding(name) {
            return binding.symbol.as_deref().map(|symbol| {
                // Default exports are known by the importing name
                let symbol = if symbol == "default" { name } else { symbol };
                Target::from_resolution(&binding.target, &binding.module, symbol)
            });
        }

        self.wildcard_exports
            .iter()
            .find(|(_, names)| names.contains(name))
            .map(|(path, _)| Target::project(path, name))
    }

    fn qualified(&self, receiver: &str, name: &str, caller_class: Option<&str>) -> Option<Target> {
        if RECEIVER_SELF.contains(&receiver) {
            let class = caller_class?;
            return self
                .defs
                .method(class, name)
                .map(|local| Target::project(self.file, &local));
        }

        if let Some(local) = self.defs.method(receiver, name) {
            return Some(Target::project(self.file, &local));
        }

        if let Some(binding) = self.imports.binding(receiver) {
            let local = match &binding.symbol {
                Some(class) => format!("{}.{}", class, name),
                None => name.to_string(),
            };
            return Some(Target::from_resolution(&binding.target, &binding.module, &local));
        }

        if receiver.contains("::") {
            return self.rust_path(receiver, name);
        }
        None
    }

    /// `crate::a::b::f()` style calls, or `crate::a::Type::f()`
    fn rust_path(&self, receiver: &str, name: &str) -> Option<Target> {
        let first = receiver.split("::").next()?;
        if !matches!(first, "crate" | "super" | "self") {
            return None;
        }

        let module = RawImport::module(receiver, 0);
        if let Resolution::Resolved(path) = self.resolver.resolve(&module, self.file) {
            return Some(Target::project(&path, name));
        }

        let (parent, ty) = receiver.rsplit_once("::")?;
        match self.resolver.resolve(&RawImport::module(parent, 0), self.file) {
            Resolution::Resolved(path) => Some(Target::project(&path, &format!("{}.{}", ty, name))),
            Resolution::Unresolved => None,
        }
    }
}
