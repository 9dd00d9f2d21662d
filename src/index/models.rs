use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a symbol discovered in a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "function" | "fn" | "func" => Some(SymbolKind::Function),
            "class" | "struct" | "type" => Some(SymbolKind::Class),
            "method" => Some(SymbolKind::Method),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// A function, class or method found in one file.
///
/// Identified within its file by `(name, kind, line)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line of the definition
    pub line: u32,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            line,
            parent: None,
            docstring: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    /// Name local to the file: `Class.method` for methods, plain name otherwise
    pub fn local_name(&self) -> String {
        match (&self.kind, &self.parent) {
            (SymbolKind::Method, Some(parent)) => format!("{}.{}", parent, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Parse failure recorded against a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisError {
    pub message: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
}

impl AnalysisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

/// Everything the index knows about one file.
///
/// Replaced as a whole, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    /// Path relative to the project root, `/`-separated
    pub path: String,
    pub content_hash: String,
    pub modified_at: DateTime<Utc>,
    pub symbols: Vec<Symbol>,
    pub errors: Vec<AnalysisError>,
}

impl FileSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A search match annotated with the file that owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    #[serde(flatten)]
    pub symbol: Symbol,
}

/// Read-only tree view derived from the index on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTreeNode {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ProjectTreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<Symbol>>,
}

impl ProjectTreeNode {
    pub fn dir(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: true,
            children: Vec::new(),
            symbols: None,
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<String>, symbols: Vec<Symbol>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: false,
            children: Vec::new(),
            symbols: Some(symbols),
        }
    }

    /// Finds a descendant node by its project-relative path
    pub fn find(&self, path: &str) -> Option<&ProjectTreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }
}

/// Summary of one scheduler drain.
///
/// A path never appears in both sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub updated: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl ChangeNotification {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Result of an incremental scan over a list of paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Paths whose summary was replaced because the content changed (or was new)
    pub updated: Vec<String>,
    /// Paths removed from the index because the file is gone
    pub deleted: Vec<String>,
    /// Paths whose content hash matched the stored summary
    pub unchanged: Vec<String>,
}

impl ScanOutcome {
    pub fn into_notification(self) -> ChangeNotification {
        let deleted: BTreeSet<String> = self.deleted.into_iter().collect();
        let updated = self
            .updated
            .into_iter()
            .filter(|p| !deleted.contains(p))
            .collect();
        ChangeNotification { updated, deleted }
    }
}

/// Qualified caller name -> ordered qualified callee names
pub type CallGraph = BTreeMap<String, Vec<String>>;

/// Builds the graph node identity `<path>::<local name>`
pub fn qualified_name(path: &str, local_name: &str) -> String {
    format!("{}::{}", path, local_name)
}

/// Splits a qualified name into `(path, local name)`
pub fn split_qualified_name(qualified: &str) -> Option<(&str, &str)> {
    qualified.rsplit_once("::")
}

/// Answer to a cross-file call graph request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphReport {
    pub call_graph: CallGraph,
    pub entry_points: Vec<String>,
    pub analyzed_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_kind_roundtrip_str() {
        for kind in [SymbolKind::Function, SymbolKind::Class, SymbolKind::Method] {
            assert_eq!(SymbolKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::from_str("struct"), Some(SymbolKind::Class));
        assert_eq!(SymbolKind::from_str("variable"), None);
    }

    #[test]
    fn test_local_name_for_method() {
        let method = Symbol::new("run", SymbolKind::Method, 4).with_parent("Worker");
        assert_eq!(method.local_name(), "Worker.run");

        let function = Symbol::new("main", SymbolKind::Function, 1);
        assert_eq!(function.local_name(), "main");
    }

    #[test]
    fn test_split_qualified_name_uses_last_separator() {
        let q = qualified_name("pkg/a.py", "Cls.method");
        assert_eq!(q, "pkg/a.py::Cls.method");
        assert_eq!(split_qualified_name(&q), Some(("pkg/a.py", "Cls.method")));
        assert_eq!(split_qualified_name("no-separator"), None);
    }

    #[test]
    fn test_outcome_notification_never_overlaps() {
        let outcome = ScanOutcome {
            updated: vec!["a.py".into(), "b.py".into()],
            deleted: vec!["b.py".into()],
            unchanged: vec!["c.py".into()],
        };
        let note = outcome.into_notification();
        assert!(note.updated.contains("a.py"));
        assert!(!note.updated.contains("b.py"));
        assert!(note.deleted.contains("b.py"));
        assert!(!note.updated.contains("c.py"));
    }

    #[test]
    fn test_search_hit_serializes_flat() {
        let hit = SearchHit {
            path: "a.py".into(),
            symbol: Symbol::new("foo", SymbolKind::Function, 1),
        };
        let value = serde_json::to_value(&hit).unwrap();
        assert_eq!(value["path"], "a.py");
        assert_eq!(value["name"], "foo");
        assert_eq!(value["kind"], "function");
    }
}
