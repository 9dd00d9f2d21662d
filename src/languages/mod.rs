pub mod python;
pub mod rust;
pub mod typescript;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tree_sitter::{Node, Query};

/// Per-language analysis capability.
///
/// An analyzer only describes its grammar; the generic
/// [`SymbolExtractor`](crate::indexer::SymbolExtractor) drives the queries and
/// the ancestor walks, so adding a language means registering one more
/// implementation.
pub trait LanguageAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;
    fn file_extensions(&self) -> &[&'static str];
    fn language(&self) -> tree_sitter::Language;

    /// Query capturing `@name` plus `@function` or `@class` on the definition node
    fn definitions_query(&self) -> &str;

    /// Query capturing `@call` with `@callee` and an optional `@receiver`
    fn calls_query(&self) -> &str;

    /// Get cached definitions query (compiled once)
    fn cached_definitions_query(&self) -> Option<&'static Query> {
        None
    }

    /// Get cached calls query (compiled once)
    fn cached_calls_query(&self) -> Option<&'static Query> {
        None
    }

    /// Name of a function-like node, `None` for anything else (or anonymous functions)
    fn function_name(&self, node: &Node, source: &[u8]) -> Option<String>;

    /// Name of a class-like node whose nested functions are methods
    fn container_name(&self, node: &Node, source: &[u8]) -> Option<String>;

    /// Documentation attached to a definition node
    fn docstring(&self, node: &Node, source: &[u8]) -> Option<String> {
        leading_doc_comment(node, source)
    }

    /// Import statements in source order
    fn extract_imports(&self, root: &Node, source: &[u8]) -> Vec<RawImport>;
}

/// One name brought in by an import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    pub fn new(name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            name: name.into(),
            alias,
        }
    }

    /// The binding visible in the importing file
    pub fn local(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An import statement as written, before resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawImport {
    /// Module reference without relative markers (`pkg.mod`, `./util`, `crate::a`)
    pub module: String,
    /// Number of leading relative markers (Python dots); 0 for absolute imports
    pub level: usize,
    /// Names imported from the module; empty for plain module imports
    pub names: Vec<ImportedName>,
    /// Local alias for a plain module import
    pub alias: Option<String>,
    pub wildcard: bool,
    pub line: u32,
}

impl RawImport {
    pub fn module(module: impl Into<String>, line: u32) -> Self {
        Self {
            module: module.into(),
            level: 0,
            names: Vec::new(),
            alias: None,
            wildcard: false,
            line,
        }
    }

    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_name(mut self, name: ImportedName) -> Self {
        self.names.push(name);
        self
    }

    pub fn with_wildcard(mut self) -> Self {
        self.wildcard = true;
        self
    }

    /// The module reference as it appears in source, e.g. `..pkg.mod`
    pub fn reference(&self) -> String {
        format!("{}{}", ".".repeat(self.level), self.module)
    }
}

/// Availability of one registered language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCapability {
    pub language: String,
    pub extensions: Vec<String>,
    pub available: bool,
    pub reason: String,
}

struct Registered {
    analyzer: Arc<dyn LanguageAnalyzer>,
    available: bool,
    reason: String,
}

/// Extension -> analyzer table, resolved once at startup
pub struct AnalyzerRegistry {
    languages: HashMap<String, Registered>,
    extension_map: HashMap<String, String>,
}

impl AnalyzerRegistry {
    /// Empty registry; see [`AnalyzerRegistry::new`] for the built-in languages
    pub fn empty() -> Self {
        Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(python::PythonAnalyzer));
        registry.register(Arc::new(typescript::TypeScriptAnalyzer::typescript()));
        registry.register(Arc::new(typescript::TypeScriptAnalyzer::tsx()));
        registry.register(Arc::new(rust::RustAnalyzer));

        registry
    }

    /// Registers an analyzer under its own extensions
    pub fn register(&mut self, analyzer: Arc<dyn LanguageAnalyzer>) {
        let extensions: Vec<&str> = analyzer.file_extensions().to_vec();
        self.register_for(&extensions, analyzer);
    }

    /// Registers an analyzer under an explicit extension set.
    ///
    /// The grammar is probed once here; a grammar that cannot be loaded marks
    /// the language degraded instead of failing.
    pub fn register_for(&mut self, extensions: &[&str], analyzer: Arc<dyn LanguageAnalyzer>) {
        let name = analyzer.name().to_string();
        let (available, reason) = probe(analyzer.as_ref());
        if !available {
            tracing::warn!("Analyzer for {} is degraded: {}", name, reason);
        }

        for ext in extensions {
            self.extension_map
                .insert(ext.trim_start_matches('.').to_lowercase(), name.clone());
        }
        self.languages.insert(
            name,
            Registered {
                analyzer,
                available,
                reason,
            },
        );
    }

    /// Analyzer for an extension, `None` when unknown or degraded
    pub fn analyzer_for(&self, extension: &str) -> Option<Arc<dyn LanguageAnalyzer>> {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.extension_map
            .get(&ext)
            .and_then(|name| self.languages.get(name))
            .filter(|r| r.available)
            .map(|r| r.analyzer.clone())
    }

    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn LanguageAnalyzer>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.analyzer_for(ext))
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn LanguageAnalyzer>> {
        self.languages.get(name).map(|r| r.analyzer.clone())
    }

    /// Whether the extension is known but its analyzer could not be loaded
    pub fn is_degraded(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.extension_map
            .get(&ext)
            .and_then(|name| self.languages.get(name))
            .map(|r| !r.available)
            .unwrap_or(false)
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        self.extension_map
            .iter()
            .filter(|(_, name)| self.languages.get(*name).map(|r| r.available).unwrap_or(false))
            .map(|(ext, _)| ext.as_str())
            .collect()
    }

    pub fn supported_languages(&self) -> Vec<&str> {
        self.languages.keys().map(|s| s.as_str()).collect()
    }

    /// Capability listing, sorted by language name
    pub fn capabilities(&self) -> Vec<LanguageCapability> {
        let mut caps: Vec<LanguageCapability> = self
            .languages
            .iter()
            .map(|(name, reg)| {
                let mut extensions: Vec<String> = self
                    .extension_map
                    .iter()
                    .filter(|(_, lang)| *lang == name)
                    .map(|(ext, _)| ext.clone())
                    .collect();
                extensions.sort();
                LanguageCapability {
                    language: name.clone(),
                    extensions,
                    available: reg.available,
                    reason: reg.reason.clone(),
                }
            })
            .collect();
        caps.sort_by(|a, b| a.language.cmp(&b.language));
        caps
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn probe(analyzer: &dyn LanguageAnalyzer) -> (bool, String) {
    let language = analyzer.language();
    let mut parser = tree_sitter::Parser::new();
    if let Err(e) = parser.set_language(&language) {
        return (false, format!("parser unavailable: {}", e));
    }
    if let Err(e) = Query::new(&language, analyzer.definitions_query()) {
        return (false, format!("definitions query rejected: {}", e));
    }
    if let Err(e) = Query::new(&language, analyzer.calls_query()) {
        return (false, format!("calls query rejected: {}", e));
    }
    (true, "ok".to_string())
}

pub(crate) fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn line_of(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Named nodes under `root` (inclusive) in source order
pub(crate) fn preorder<'t>(root: Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Collects `///` or `/** */` comments directly above a definition
pub(crate) fn leading_doc_comment(node: &Node, source: &[u8]) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut prev = node.prev_sibling();

    while let Some(sibling) = prev {
        let kind = sibling.kind();
        if kind == "attribute_item" || kind == "decorator" {
            prev = sibling.prev_sibling();
            continue;
        }
        if !kind.contains("comment") {
            break;
        }

        let text = node_text(&sibling, source).trim();
        if let Some(body) = text.strip_prefix("///") {
            lines.push(body.trim().to_string());
            prev = sibling.prev_sibling();
            continue;
        }
        if text.starts_with("/**") {
            let body = text
                .trim_start_matches("/**")
                .trim_end_matches("*/")
                .lines()
                .map(|l| l.trim().trim_start_matches('*').trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            lines.push(body);
        }
        break;
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let doc = lines.join("\n").trim().to_string();
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

/// Strips the common indentation of a multi-line docstring
pub(crate) fn clean_docstring(raw: &str) -> String {
    let mut lines = raw.lines();
    let first = lines.next().unwrap_or("").trim().to_string();
    let rest: Vec<&str> = lines.collect();

    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = vec![first];
    for line in rest {
        match line.get(indent..) {
            Some(rest) => out.push(rest.trim_end().to_string()),
            None => out.push(line.trim().to_string()),
        }
    }
    out.join("\n").trim().to_string()
}
