//! In-memory symbol index
//!
//! Maps project-relative paths to their [`FileSummary`]. Summaries are stored
//! behind `Arc` so a `put` swaps the whole value in one step and readers
//! always see either the previous or the new summary, never a mix.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::index::models::{FileSummary, ProjectTreeNode, SearchHit};

#[derive(Debug, Default)]
pub struct SymbolIndex {
    files: RwLock<HashMap<String, Arc<FileSummary>>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, path: &str) -> Option<Arc<FileSummary>> {
        self.files.read().get(path).cloned()
    }

    /// Replaces the summary stored for `path`
    pub fn put(&self, path: &str, summary: FileSummary) {
        self.files.write().insert(path.to_string(), Arc::new(summary));
    }

    /// Removes `path`, returning whether it was present
    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Replaces the whole contents in one write
    pub fn replace_all(&self, summaries: Vec<FileSummary>) {
        let map = summaries
            .into_iter()
            .map(|s| (s.path.clone(), Arc::new(s)))
            .collect();
        *self.files.write() = map;
    }

    /// All summaries in lexicographic path order
    pub fn all(&self) -> Vec<Arc<FileSummary>> {
        let files = self.files.read();
        let mut all: Vec<Arc<FileSummary>> = files.values().cloned().collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        all
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.files.read().values().map(|s| s.symbols.len()).sum()
    }

    /// Case-insensitive substring search over symbol names.
    ///
    /// An empty term matches nothing.
    pub fn search(&self, term: &str) -> Vec<SearchHit> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .all()
            .iter()
            .flat_map(|summary| {
                summary
                    .symbols
                    .iter()
                    .filter(|s| s.name.to_lowercase().contains(&needle))
                    .map(|s| SearchHit {
                        path: summary.path.clone(),
                        symbol: s.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        hits.sort_by(|a, b| a.path.cmp(&b.path).then(a.symbol.line.cmp(&b.symbol.line)));
        hits
    }

    /// Builds the directory tree over all indexed files.
    ///
    /// Children are ordered directories first, then files, each alphabetically.
    pub fn tree(&self, root_name: &str) -> ProjectTreeNode {
        let mut root = DirBuilder::default();
        for summary in self.all() {
            let parts: Vec<&str> = summary.path.split('/').filter(|p| !p.is_empty()).collect();
            if parts.is_empty() {
                continue;
            }
            let mut node = &mut root;
            for dir in &parts[..parts.len() - 1] {
                node = node.dirs.entry((*dir).to_string()).or_default();
            }
            node.files
                .insert(parts[parts.len() - 1].to_string(), summary.clone());
        }
        root.build(root_name, "")
    }
}

#[derive(Default)]
struct DirBuilder {
    dirs: BTreeMap<String, DirBuilder>,
    files: BTreeMap<String, Arc<FileSummary>>,
}

impl DirBuilder {
    fn build(self, name: &str, path: &str) -> ProjectTreeNode {
        let mut node = ProjectTreeNode::dir(name, path);
        for (dir_name, dir) in self.dirs {
            let child_path = join_rel(path, &dir_name);
            node.children.push(dir.build(&dir_name, &child_path));
        }
        for (file_name, summary) in self.files {
            node.children.push(ProjectTreeNode::file(
                file_name,
                summary.path.clone(),
                summary.symbols.clone(),
            ));
        }
        node
    }
}

fn join_rel(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}
