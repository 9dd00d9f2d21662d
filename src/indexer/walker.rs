use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::error::{IndexerError, Result};
use crate::languages::AnalyzerRegistry;

pub struct FileWalker {
    registry: Arc<AnalyzerRegistry>,
    exclude_dirs: HashSet<String>,
    respect_gitignore: bool,
}

impl FileWalker {
    pub fn new(registry: Arc<AnalyzerRegistry>) -> Self {
        Self {
            registry,
            exclude_dirs: HashSet::new(),
            respect_gitignore: true,
        }
    }

    pub fn with_exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = enabled;
        self
    }

    /// Eligible files under `root`, sorted, as absolute paths
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(IndexerError::ProjectRootMissing(root.display().to_string()));
        }

        let mut files = Vec::new();
        let exclude_dirs = self.exclude_dirs.clone();

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                !(is_dir
                    && entry.depth() > 0
                    && exclude_dirs.contains(entry.file_name().to_string_lossy().as_ref()))
            })
            .build();

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && self.is_supported(path) {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => tracing::debug!("Skipping unreadable entry: {}", e),
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.registry.get_for_file(path).is_some()
    }

    /// Whether any component of `relative` is an excluded directory or hidden
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            let name = component.as_os_str().to_string_lossy();
            let is_last = components.peek().is_none();
            if !is_last && self.exclude_dirs.contains(name.as_ref()) {
                return true;
            }
            if name.starts_with('.') && name != "." && name != ".." {
                return true;
            }
        }
        false
    }
}

/// Project-relative, `/`-separated form of `path`
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_walker() -> FileWalker {
        FileWalker::new(Arc::new(AnalyzerRegistry::new()))
            .with_exclude_dirs(["node_modules", "__pycache__", "target"])
    }

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_walk_finds_supported_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "main.py", "def main(): pass");
        create_file(temp_dir.path(), "app.ts", "const x = 1;");
        create_file(temp_dir.path(), "lib.rs", "pub fn lib() {}");
        create_file(temp_dir.path(), "README.md", "# Readme");
        create_file(temp_dir.path(), "data.json", "{}");

        let files = create_walker().walk(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_walk_recursive_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "z.py", "");
        create_file(temp_dir.path(), "pkg/a.py", "");
        create_file(temp_dir.path(), "pkg/deep/b.py", "");

        let files = create_walker().walk(temp_dir.path()).unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|f| relative_path(temp_dir.path(), f).unwrap())
            .collect();
        assert_eq!(rel, vec!["pkg/a.py", "pkg/deep/b.py", "z.py"]);
    }

    #[test]
    fn test_walk_skips_excluded_dirs() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/app.py", "");
        create_file(temp_dir.path(), "node_modules/lib/index.js", "");
        create_file(temp_dir.path(), "pkg/__pycache__/cached.py", "");
        create_file(temp_dir.path(), "target/debug/build.rs", "");

        let files = create_walker().walk(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/app.py"));
    }

    #[test]
    fn test_walk_respects_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), ".gitignore", "generated/\n");
        create_file(temp_dir.path(), "src/main.py", "");
        create_file(temp_dir.path(), "generated/out.py", "");

        let files = create_walker().walk(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 1);

        let all = create_walker()
            .with_gitignore(false)
            .walk(temp_dir.path())
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_walk_hidden_files_ignored() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "visible.py", "");
        create_file(temp_dir.path(), ".hidden.py", "");
        create_file(temp_dir.path(), ".venv/lib/site.py", "");

        let files = create_walker().walk(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("visible.py"));
    }

    #[test]
    fn test_walk_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = create_walker().walk(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(IndexerError::ProjectRootMissing(_))));
    }

    #[test]
    fn test_walk_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(create_walker().walk(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_is_excluded() {
        let walker = create_walker();
        assert!(walker.is_excluded(Path::new("node_modules/x/index.js")));
        assert!(walker.is_excluded(Path::new(".git/HEAD")));
        assert!(walker.is_excluded(Path::new("pkg/.hidden.py")));
        assert!(!walker.is_excluded(Path::new("src/app.py")));
        // A file named like an excluded dir is still eligible
        assert!(!walker.is_excluded(Path::new("src/target")));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/proj");
        assert_eq!(
            relative_path(root, Path::new("/proj/pkg/a.py")).as_deref(),
            Some("pkg/a.py")
        );
        assert_eq!(relative_path(root, Path::new("/other/a.py")), None);
        assert_eq!(relative_path(root, root), None);
    }
}
