use chrono::{DateTime, Utc};
use tree_sitter::{Node, Query, StreamingIterator};

use crate::index::{AnalysisError, FileSummary, Symbol, SymbolKind};
use crate::indexer::parser::ParsedFile;
use crate::languages::{LanguageAnalyzer, RawImport};

/// A call expression found inside a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Called name without receiver (`helper`, `save`)
    pub callee: String,
    /// Receiver or path before the callee (`self`, `os.path`, `Vec`)
    pub receiver: Option<String>,
    pub line: u32,
    /// Local name of the enclosing function or method, `None` at module level
    pub caller: Option<String>,
    /// Class the enclosing method belongs to
    pub caller_class: Option<String>,
}

/// Result of analyzing one parsed file
#[derive(Debug, Default)]
pub struct FileAnalysis {
    pub symbols: Vec<Symbol>,
    pub errors: Vec<AnalysisError>,
    pub imports: Vec<RawImport>,
    pub calls: Vec<CallSite>,
}

impl FileAnalysis {
    /// Analysis that failed before parsing, e.g. an unreadable file
    pub fn failed(error: AnalysisError) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    pub fn into_summary(
        self,
        path: impl Into<String>,
        content_hash: impl Into<String>,
        modified_at: DateTime<Utc>,
    ) -> FileSummary {
        FileSummary {
            path: path.into(),
            content_hash: content_hash.into(),
            modified_at,
            symbols: self.symbols,
            errors: self.errors,
        }
    }
}

/// Where a definition sits relative to classes and functions around it
enum Scope {
    TopLevel,
    Class(String),
    Function(String),
}

pub struct SymbolExtractor {
    extract_docstrings: bool,
}

impl Default for SymbolExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolExtractor {
    pub fn new() -> Self {
        Self {
            extract_docstrings: true,
        }
    }

    pub fn with_docstrings(mut self, enabled: bool) -> Self {
        self.extract_docstrings = enabled;
        self
    }

    /// Extract symbols, the first syntax error, imports and call sites
    pub fn analyze(&self, parsed: &ParsedFile) -> FileAnalysis {
        let root = parsed.root_node();
        let source = parsed.source_bytes();
        let analyzer = parsed.analyzer.as_ref();

        let mut analysis = FileAnalysis::default();

        let mut cutoff = usize::MAX;
        if root.has_error() {
            if let Some(node) = first_error_node(root) {
                cutoff = node.start_byte();
                analysis.errors.push(describe_error(&node, source));
            }
        }

        analysis.symbols = self
            .extract_symbols(parsed, analyzer)
            .into_iter()
            .filter(|(end_byte, _)| *end_byte <= cutoff)
            .map(|(_, symbol)| symbol)
            .collect();
        analysis.imports = analyzer.extract_imports(&root, source);
        analysis.calls = self.extract_calls(parsed, analyzer);

        analysis
    }

    fn extract_symbols(
        &self,
        parsed: &ParsedFile,
        analyzer: &dyn LanguageAnalyzer,
    ) -> Vec<(usize, Symbol)> {
        let owned;
        let query = match analyzer.cached_definitions_query() {
            Some(q) => q,
            None => match Query::new(&analyzer.language(), analyzer.definitions_query()) {
                Ok(q) => {
                    owned = q;
                    &owned
                }
                Err(e) => {
                    tracing::warn!("Invalid definitions query for {}: {}", parsed.language, e);
                    return Vec::new();
                }
            },
        };

        let source = parsed.source_bytes();
        let mut symbols: Vec<(usize, Symbol)> = Vec::new();

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, parsed.root_node(), source);

        while let Some(m) = matches.next() {
            let mut name: Option<&str> = None;
            let mut definition: Option<(Node, bool)> = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "name" => name = Some(parsed.node_text(&capture.node)),
                    "function" => definition = Some((capture.node, false)),
                    "class" => definition = Some((capture.node, true)),
                    _ => {}
                }
            }

            let (Some(name), Some((node, is_class))) = (name, definition) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let line = node.start_position().row as u32 + 1;
            let mut symbol = match (is_class, enclosing_scope(analyzer, &node, source)) {
                (true, Scope::TopLevel) => Symbol::new(name, SymbolKind::Class, line),
                (true, Scope::Class(p)) | (true, Scope::Function(p)) => {
                    Symbol::new(name, SymbolKind::Class, line).with_parent(p)
                }
                (false, Scope::TopLevel) => Symbol::new(name, SymbolKind::Function, line),
                (false, Scope::Class(p)) => Symbol::new(name, SymbolKind::Method, line).with_parent(p),
                (false, Scope::Function(p)) => {
                    Symbol::new(name, SymbolKind::Function, line).with_parent(p)
                }
            };

            if self.extract_docstrings {
                if let Some(doc) = analyzer.docstring(&node, source) {
                    symbol = symbol.with_docstring(doc);
                }
            }

            symbols.push((node.end_byte(), symbol));
        }

        symbols.sort_by(|a, b| {
            a.1.line
                .cmp(&b.1.line)
                .then_with(|| a.1.name.cmp(&b.1.name))
        });
        symbols.dedup_by(|a, b| a.1 == b.1);
        symbols
    }

    fn extract_calls(&self, parsed: &ParsedFile, analyzer: &dyn LanguageAnalyzer) -> Vec<CallSite> {
        let owned;
        let query = match analyzer.cached_calls_query() {
            Some(q) => q,
            None => match Query::new(&analyzer.language(), analyzer.calls_query()) {
                Ok(q) => {
                    owned = q;
                    &owned
                }
                Err(e) => {
                    // Calls are optional; symbols are still indexed
                    tracing::warn!("Invalid calls query for {}: {}", parsed.language, e);
                    return Vec::new();
                }
            },
        };

        let source = parsed.source_bytes();
        let mut calls = Vec::new();

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, parsed.root_node(), source);

        while let Some(m) = matches.next() {
            let mut callee: Option<&str> = None;
            let mut receiver: Option<&str> = None;
            let mut call: Option<Node> = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "callee" => callee = Some(parsed.node_text(&capture.node)),
                    "receiver" => receiver = Some(parsed.node_text(&capture.node)),
                    "call" => call = Some(capture.node),
                    _ => {}
                }
            }

            let (Some(callee), Some(call)) = (callee, call) else {
                continue;
            };
            let (caller, caller_class) = enclosing_caller(analyzer, &call, source);
            calls.push(CallSite {
                callee: callee.to_string(),
                receiver: receiver.map(|r| r.to_string()),
                line: call.start_position().row as u32 + 1,
                caller,
                caller_class,
            });
        }

        calls.sort_by_key(|c| c.line);
        calls
    }
}

/// Nearest class or function around `node`, excluding `node` itself
fn enclosing_scope(analyzer: &dyn LanguageAnalyzer, node: &Node, source: &[u8]) -> Scope {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(class) = analyzer.container_name(&ancestor, source) {
            return Scope::Class(class);
        }
        if let Some(function) = analyzer.function_name(&ancestor, source) {
            return Scope::Function(function);
        }
        current = ancestor.parent();
    }
    Scope::TopLevel
}

/// Local name of the function enclosing a call, plus its class for methods
fn enclosing_caller(
    analyzer: &dyn LanguageAnalyzer,
    node: &Node,
    source: &[u8],
) -> (Option<String>, Option<String>) {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(function) = analyzer.function_name(&ancestor, source) {
            return match enclosing_scope(analyzer, &ancestor, source) {
                Scope::Class(class) => (Some(format!("{}.{}", class, function)), Some(class)),
                _ => (Some(function), None),
            };
        }
        current = ancestor.parent();
    }
    (None, None)
}

/// First `ERROR` or `MISSING` node in document order
fn first_error_node(root: Node) -> Option<Node> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

fn describe_error(node: &Node, source: &[u8]) -> AnalysisError {
    let position = node.start_position();
    let line = position.row as u32 + 1;
    let column = position.column as u32;

    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let snippet: String = node
            .utf8_text(source)
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(40)
            .collect();
        if snippet.is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("invalid syntax near `{}`", snippet)
        }
    };

    AnalysisError::at(message, line, column)
}
