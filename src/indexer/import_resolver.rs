//! Import resolution
//!
//! Maps import statements to files inside the project. Everything here works
//! on project-relative `/`-separated paths; a reference that leaves the root
//! or names a third-party package resolves to [`Resolution::Unresolved`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{IndexerError, Result};
use crate::indexer::parser::{ParsedFile, Parser};
use crate::indexer::walker::relative_path;
use crate::languages::{AnalyzerRegistry, RawImport};

/// Where an import points
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "lowercase")]
pub enum Resolution {
    Resolved(String),
    Unresolved,
}

impl Resolution {
    pub fn path(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(p) => Some(p),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl From<Option<String>> for Resolution {
    fn from(path: Option<String>) -> Self {
        match path {
            Some(p) => Resolution::Resolved(p),
            None => Resolution::Unresolved,
        }
    }
}

/// What a local name in a file refers to after import resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportBinding {
    /// Module reference as written in the import
    pub module: String,
    pub target: Resolution,
    /// Imported name inside `target`; `None` when the binding is the module itself
    pub symbol: Option<String>,
}

/// Resolved imports of one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportMap {
    /// Raw module reference -> resolved file
    pub entries: BTreeMap<String, Resolution>,
    /// Local binding name -> what it refers to
    pub bindings: BTreeMap<String, ImportBinding>,
    /// Modules imported with `*`
    pub wildcards: Vec<ImportBinding>,
}

impl ImportMap {
    pub fn binding(&self, local: &str) -> Option<&ImportBinding> {
        self.bindings.get(local)
    }

    /// Files this map resolves into, without duplicates
    pub fn resolved_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .entries
            .values()
            .chain(self.bindings.values().map(|b| &b.target))
            .filter_map(|r| r.path().map(|p| p.to_string()))
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// Project layout used to probe candidate files
#[derive(Debug, Clone)]
pub struct ProjectFiles {
    root: PathBuf,
    source_roots: Vec<String>,
}

impl ProjectFiles {
    pub fn new(root: impl Into<PathBuf>, source_roots: Vec<String>) -> Self {
        Self {
            root: root.into(),
            source_roots,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_roots(&self) -> &[String] {
        &self.source_roots
    }

    pub fn exists(&self, rel: &str) -> bool {
        !rel.is_empty() && self.root.join(rel).is_file()
    }

    fn first_existing<I>(&self, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = String>,
    {
        candidates
            .into_iter()
            .filter_map(|c| normalize_rel(&c))
            .find(|c| self.exists(c))
    }
}

/// Trait for language-specific import resolution
pub trait ImportResolver: Send + Sync {
    /// Returns the language this resolver handles
    fn language(&self) -> &'static str;

    /// File backing the module an import names
    fn resolve_module(&self, import: &RawImport, from_file: &str, files: &ProjectFiles)
        -> Option<String>;

    /// File backing `name` when it is itself a submodule of the imported module
    fn resolve_submodule(
        &self,
        _import: &RawImport,
        _name: &str,
        _from_file: &str,
        _files: &ProjectFiles,
    ) -> Option<String> {
        None
    }

    /// Local name bound by a plain module import, if any
    fn module_binding(&self, import: &RawImport) -> Option<String> {
        import.alias.clone()
    }
}

/// Python imports
///
/// - `import pkg.mod` / `from pkg.mod import name` against the source roots
/// - `from ..pkg import name`, one directory up per extra leading dot
/// - packages through `__init__.py`
pub struct PythonImportResolver;

impl PythonImportResolver {
    fn relative_bases(&self, import: &RawImport, from_file: &str) -> Vec<String> {
        let mut dir = Some(parent_dir(from_file));
        for _ in 1..import.level {
            dir = dir.and_then(|d| parent_of_dir(&d));
        }
        // Above the project root
        let Some(dir) = dir else {
            return Vec::new();
        };
        vec![join_rel(&dir, &import.module.replace('.', "/"))]
    }

    fn candidates(base: &str) -> Vec<String> {
        if base.is_empty() {
            return vec!["__init__.py".to_string()];
        }
        vec![
            format!("{}.py", base),
            format!("{}.pyi", base),
            format!("{}/__init__.py", base),
        ]
    }

    fn absolute_bases(&self, import: &RawImport, from_file: &str, files: &ProjectFiles) -> Vec<String> {
        let module_path = import.module.replace('.', "/");
        let mut bases: Vec<String> = files
            .source_roots()
            .iter()
            .map(|root| join_rel(root.trim_matches('/'), &module_path))
            .collect();
        // Script-style imports of a sibling module
        bases.push(join_rel(&parent_dir(from_file), &module_path));
        bases
    }

    fn bases(&self, import: &RawImport, from_file: &str, files: &ProjectFiles) -> Vec<String> {
        if import.level > 0 {
            self.relative_bases(import, from_file)
        } else if import.module.is_empty() {
            Vec::new()
        } else {
            self.absolute_bases(import, from_file, files)
        }
    }
}

impl ImportResolver for PythonImportResolver {
    fn language(&self) -> &'static str {
        "python"
    }

    fn resolve_module(&self, import: &RawImport, from_file: &str, files: &ProjectFiles) -> Option<String> {
        self.bases(import, from_file, files)
            .iter()
            .find_map(|base| files.first_existing(Self::candidates(base)))
    }

    fn resolve_submodule(
        &self,
        import: &RawImport,
        name: &str,
        from_file: &str,
        files: &ProjectFiles,
    ) -> Option<String> {
        self.bases(import, from_file, files).iter().find_map(|base| {
            let sub = join_rel(base, name);
            files.first_existing(vec![format!("{}.py", sub), format!("{}/__init__.py", sub)])
        })
    }

    fn module_binding(&self, import: &RawImport) -> Option<String> {
        if import.level > 0 || import.module.is_empty() {
            return None;
        }
        Some(import.alias.clone().unwrap_or_else(|| import.module.clone()))
    }
}

const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// TypeScript / JavaScript module specifiers
///
/// Only `./` and `../` specifiers can resolve; bare specifiers are packages.
pub struct TypeScriptImportResolver;

impl ImportResolver for TypeScriptImportResolver {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn resolve_module(&self, import: &RawImport, from_file: &str, files: &ProjectFiles) -> Option<String> {
        let specifier = import.module.as_str();
        let relative = specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../");
        if !relative {
            return None;
        }

        let base = normalize_rel(&join_rel(&parent_dir(from_file), specifier))?;

        let mut candidates = vec![base.clone()];
        // `./util.js` commonly names `util.ts` in TypeScript sources
        if let Some(stem) = base.strip_suffix(".js") {
            candidates.push(format!("{}.ts", stem));
            candidates.push(format!("{}.tsx", stem));
        }
        candidates.extend(TS_EXTENSIONS.iter().map(|ext| format!("{}.{}", base, ext)));
        candidates.push(format!("{}.d.ts", base));
        candidates.extend(TS_EXTENSIONS.iter().map(|ext| join_rel(&base, &format!("index.{}", ext))));

        files.first_existing(candidates)
    }
}

/// Rust `use` paths rooted at `crate::`, `super::` or `self::`
pub struct RustImportResolver;

impl RustImportResolver {
    /// Directory holding the child modules of the module defined in `file`
    fn children_dir(file: &str) -> String {
        let dir = parent_dir(file);
        match file_stem(file) {
            "mod" | "lib" | "main" => dir,
            stem => join_rel(&dir, stem),
        }
    }

    /// Children directory of the module containing the module defined in `file`
    fn parent_children_dir(file: &str) -> Option<String> {
        match file_stem(file) {
            "lib" | "main" => None,
            "mod" => parent_of_dir(&parent_dir(file)),
            _ => Some(parent_dir(file)),
        }
    }

    /// File defining the module whose children live in `dir`
    fn module_file(dir: &str, files: &ProjectFiles) -> Option<String> {
        let mut candidates = vec![
            join_rel(dir, "mod.rs"),
            join_rel(dir, "lib.rs"),
            join_rel(dir, "main.rs"),
        ];
        if let Some((parent, name)) = dir.rsplit_once('/') {
            candidates.push(join_rel(parent, &format!("{}.rs", name)));
        } else if !dir.is_empty() {
            candidates.push(format!("{}.rs", dir));
        }
        files.first_existing(candidates)
    }

    /// Source directory of the crate `from_file` belongs to
    fn crate_src_dir(from_file: &str, files: &ProjectFiles) -> Option<String> {
        let mut dir = Some(parent_dir(from_file));
        while let Some(d) = dir {
            if d == "src" || d.ends_with("/src") {
                return Some(d);
            }
            dir = parent_of_dir(&d);
        }
        files
            .source_roots()
            .iter()
            .map(|r| r.trim_matches('/').to_string())
            .find(|r| {
                files.exists(&join_rel(r, "lib.rs")) || files.exists(&join_rel(r, "main.rs"))
            })
    }

    fn resolve_path(&self, path: &str, from_file: &str, files: &ProjectFiles) -> Option<String> {
        let mut segments = path.split("::").filter(|s| !s.is_empty());
        let first = segments.next()?;

        let (mut dir, mut file) = match first {
            "crate" => {
                let src = Self::crate_src_dir(from_file, files)?;
                let file = files.first_existing(vec![join_rel(&src, "lib.rs"), join_rel(&src, "main.rs")])?;
                (src, file)
            }
            "self" => (Self::children_dir(from_file), from_file.to_string()),
            "super" => {
                let dir = Self::parent_children_dir(from_file)?;
                let file = Self::module_file(&dir, files)?;
                (dir, file)
            }
            _ => return None,
        };

        for segment in segments {
            match segment {
                "super" => {
                    let parent = Self::parent_children_dir(&file)?;
                    file = Self::module_file(&parent, files)?;
                    dir = parent;
                }
                "self" => {}
                name => {
                    let child_dir = join_rel(&dir, name);
                    file = files.first_existing(vec![
                        format!("{}.rs", child_dir),
                        join_rel(&child_dir, "mod.rs"),
                    ])?;
                    dir = child_dir;
                }
            }
        }
        Some(file)
    }
}

impl ImportResolver for RustImportResolver {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn resolve_module(&self, import: &RawImport, from_file: &str, files: &ProjectFiles) -> Option<String> {
        self.resolve_path(&import.module, from_file, files)
    }

    fn resolve_submodule(
        &self,
        import: &RawImport,
        name: &str,
        from_file: &str,
        files: &ProjectFiles,
    ) -> Option<String> {
        self.resolve_path(&format!("{}::{}", import.module, name), from_file, files)
    }

    fn module_binding(&self, import: &RawImport) -> Option<String> {
        import.alias.clone().or_else(|| {
            let last = import.module.rsplit("::").next()?;
            match last {
                "" | "crate" | "super" | "self" => None,
                name => Some(name.to_string()),
            }
        })
    }
}

/// Resolvers keyed by analyzer name
pub struct ImportResolverRegistry {
    resolvers: HashMap<&'static str, Arc<dyn ImportResolver>>,
}

impl Default for ImportResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportResolverRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            resolvers: HashMap::new(),
        };
        registry.register(Arc::new(PythonImportResolver));
        registry.register(Arc::new(RustImportResolver));
        let typescript: Arc<dyn ImportResolver> = Arc::new(TypeScriptImportResolver);
        registry.register(typescript.clone());
        registry.resolvers.insert("tsx", typescript);
        registry
    }

    pub fn register(&mut self, resolver: Arc<dyn ImportResolver>) {
        self.resolvers.insert(resolver.language(), resolver);
    }

    pub fn get(&self, language: &str) -> Option<&dyn ImportResolver> {
        self.resolvers.get(language).map(|r| r.as_ref())
    }
}

/// Import resolution for one project
pub struct ProjectImportResolver {
    files: ProjectFiles,
    parser: Parser,
    resolvers: ImportResolverRegistry,
}

impl ProjectImportResolver {
    pub fn new(files: ProjectFiles, registry: Arc<AnalyzerRegistry>) -> Self {
        Self {
            files,
            parser: Parser::new(registry),
            resolvers: ImportResolverRegistry::new(),
        }
    }

    pub fn files(&self) -> &ProjectFiles {
        &self.files
    }

    /// Import statements of a project file, in source order
    pub fn extract_imports(&self, file: &str) -> Result<Vec<RawImport>> {
        let parsed = self.parse(file)?;
        Ok(self.extract_imports_from(&parsed))
    }

    pub fn extract_imports_from(&self, parsed: &ParsedFile) -> Vec<RawImport> {
        parsed
            .analyzer
            .extract_imports(&parsed.root_node(), parsed.source_bytes())
    }

    /// Resolves the module an import names, relative to the importing file
    pub fn resolve(&self, import: &RawImport, from_file: &str) -> Resolution {
        let Some(resolver) = self.resolver_for(from_file) else {
            return Resolution::Unresolved;
        };
        resolver.resolve_module(import, from_file, &self.files).into()
    }

    pub fn build_import_map(&self, file: &str) -> Result<ImportMap> {
        let parsed = self.parse(file)?;
        let imports = self.extract_imports_from(&parsed);
        Ok(self.import_map(&parsed.language, file, &imports))
    }

    /// Builds the map from already extracted imports
    pub fn import_map(&self, language: &str, from_file: &str, imports: &[RawImport]) -> ImportMap {
        let mut map = ImportMap::default();
        let Some(resolver) = self.resolvers.get(language) else {
            return map;
        };

        for import in imports {
            let reference = import.reference();
            let target: Resolution = resolver.resolve_module(import, from_file, &self.files).into();
            map.entries.insert(reference.clone(), target.clone());

            if import.wildcard {
                map.wildcards.push(ImportBinding {
                    module: reference.clone(),
                    target: target.clone(),
                    symbol: None,
                });
            }

            if import.names.is_empty() {
                if import.wildcard {
                    continue;
                }
                if let Some(local) = resolver.module_binding(import) {
                    map.bindings.insert(
                        local,
                        ImportBinding {
                            module: reference.clone(),
                            target: target.clone(),
                            symbol: None,
                        },
                    );
                }
                continue;
            }

            for name in &import.names {
                let binding = match resolver.resolve_submodule(import, &name.name, from_file, &self.files) {
                    Some(sub) => {
                        map.entries
                            .insert(join_reference(&reference, &name.name, language), Resolution::Resolved(sub.clone()));
                        ImportBinding {
                            module: reference.clone(),
                            target: Resolution::Resolved(sub),
                            symbol: None,
                        }
                    }
                    None => ImportBinding {
                        module: reference.clone(),
                        target: target.clone(),
                        symbol: Some(name.name.clone()),
                    },
                };
                map.bindings.insert(name.local().to_string(), binding);
            }
        }

        map
    }

    fn resolver_for(&self, file: &str) -> Option<&dyn ImportResolver> {
        let analyzer = self.parser.analyzer_for(Path::new(file))?;
        self.resolvers.get(analyzer.name())
    }

    fn parse(&self, file: &str) -> Result<ParsedFile> {
        let abs = self.files.root().join(file);
        if !abs.is_file() {
            return Err(IndexerError::FileNotFound(file.to_string()));
        }
        self.parser.parse_file(&abs)
    }

    /// Project-relative form of an absolute or relative path
    pub fn relative(&self, path: &Path) -> Option<String> {
        if path.is_absolute() {
            relative_path(self.files.root(), path).or_else(|| {
                let canonical = path.canonicalize().ok()?;
                relative_path(self.files.root(), &canonical)
            })
        } else {
            normalize_rel(&path.to_string_lossy().replace('\\', "/"))
        }
    }
}

fn join_reference(module: &str, name: &str, language: &str) -> String {
    let separator = match language {
        "rust" => "::",
        "python" if module.ends_with('.') || module.is_empty() => "",
        "python" => ".",
        _ => "/",
    };
    format!("{}{}{}", module, separator, name)
}

/// Collapses `.` and `..`; `None` if the path climbs above the root
pub fn normalize_rel(path: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            _ => stack.push(part),
        }
    }
    Some(stack.join("/"))
}

fn parent_dir(file: &str) -> String {
    file.rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

fn parent_of_dir(dir: &str) -> Option<String> {
    if dir.is_empty() {
        return None;
    }
    Some(parent_dir(dir))
}

fn file_stem(file: &str) -> &str {
    let name = file.rsplit('/').next().unwrap_or(file);
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

fn join_rel(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{}/{}", dir, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::ImportedName;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[&str]) -> (TempDir, ProjectImportResolver) {
        let dir = TempDir::new().unwrap();
        for f in files {
            let path = dir.path().join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "").unwrap();
        }
        let resolver = ProjectImportResolver::new(
            ProjectFiles::new(
                dir.path(),
                vec!["".to_string(), "src".to_string(), "lib".to_string()],
            ),
            Arc::new(AnalyzerRegistry::new()),
        );
        (dir, resolver)
    }

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolved(path: &str) -> Resolution {
        Resolution::Resolved(path.to_string())
    }

    #[test]
    fn test_normalize_rel() {
        assert_eq!(normalize_rel("a/./b/../c.py").as_deref(), Some("a/c.py"));
        assert_eq!(normalize_rel("../outside.py"), None);
        assert_eq!(normalize_rel("a/../../x"), None);
    }

    #[test]
    fn test_python_absolute_and_package() {
        let (_dir, resolver) = project(&["app.py", "pkg/__init__.py", "pkg/util.py", "src/core/base.py"]);

        let import = RawImport::module("pkg.util", 1);
        assert_eq!(resolver.resolve(&import, "app.py"), resolved("pkg/util.py"));

        let package = RawImport::module("pkg", 1);
        assert_eq!(resolver.resolve(&package, "app.py"), resolved("pkg/__init__.py"));

        // Found through the `src` source root
        let nested = RawImport::module("core.base", 1);
        assert_eq!(resolver.resolve(&nested, "app.py"), resolved("src/core/base.py"));

        let third_party = RawImport::module("numpy", 1);
        assert_eq!(resolver.resolve(&third_party, "app.py"), Resolution::Unresolved);
    }

    #[test]
    fn test_python_relative_levels() {
        let (_dir, resolver) = project(&["pkg/a/mod.py", "pkg/a/sibling.py", "pkg/shared.py", "pkg/__init__.py"]);

        let one = RawImport::module("sibling", 1).with_level(1);
        assert_eq!(resolver.resolve(&one, "pkg/a/mod.py"), resolved("pkg/a/sibling.py"));

        let two = RawImport::module("shared", 1).with_level(2);
        assert_eq!(resolver.resolve(&two, "pkg/a/mod.py"), resolved("pkg/shared.py"));

        let package = RawImport::module("", 1).with_level(2);
        assert_eq!(resolver.resolve(&package, "pkg/a/mod.py"), resolved("pkg/__init__.py"));

        let escape = RawImport::module("x", 1).with_level(5);
        assert_eq!(resolver.resolve(&escape, "pkg/a/mod.py"), Resolution::Unresolved);
    }

    #[test]
    fn test_typescript_probing() {
        let (_dir, resolver) = project(&[
            "src/app.ts",
            "src/util.ts",
            "src/components/index.tsx",
            "lib/helpers.js",
        ]);

        let util = RawImport::module("./util", 1);
        assert_eq!(resolver.resolve(&util, "src/app.ts"), resolved("src/util.ts"));

        let esm = RawImport::module("./util.js", 1);
        assert_eq!(resolver.resolve(&esm, "src/app.ts"), resolved("src/util.ts"));

        let index = RawImport::module("./components", 1);
        assert_eq!(resolver.resolve(&index, "src/app.ts"), resolved("src/components/index.tsx"));

        let up = RawImport::module("../lib/helpers", 1);
        assert_eq!(resolver.resolve(&up, "src/app.ts"), resolved("lib/helpers.js"));

        let package = RawImport::module("react", 1);
        assert_eq!(resolver.resolve(&package, "src/app.ts"), Resolution::Unresolved);

        let outside = RawImport::module("../../elsewhere", 1);
        assert_eq!(resolver.resolve(&outside, "src/app.ts"), Resolution::Unresolved);
    }

    #[test]
    fn test_rust_paths() {
        let (_dir, resolver) = project(&[
            "src/lib.rs",
            "src/index/mod.rs",
            "src/index/models.rs",
            "src/indexer.rs",
            "src/indexer/scanner.rs",
        ]);

        let crate_path = RawImport::module("crate::index::models", 1);
        assert_eq!(
            resolver.resolve(&crate_path, "src/indexer/scanner.rs"),
            resolved("src/index/models.rs")
        );

        let sup = RawImport::module("super", 1);
        assert_eq!(resolver.resolve(&sup, "src/indexer/scanner.rs"), resolved("src/indexer.rs"));

        let sibling = RawImport::module("super::models", 1);
        assert_eq!(
            resolver.resolve(&sibling, "src/index/mod.rs"),
            Resolution::Unresolved,
            "mod.rs's parent is the crate root, which has no `models`"
        );

        let child = RawImport::module("self::models", 1);
        assert_eq!(resolver.resolve(&child, "src/index/mod.rs"), resolved("src/index/models.rs"));

        let external = RawImport::module("std::collections", 1);
        assert_eq!(resolver.resolve(&external, "src/lib.rs"), Resolution::Unresolved);
    }

    #[test]
    fn test_import_map_bindings_python() {
        let (dir, resolver) = project(&["c.py", "pkg/__init__.py", "pkg/mod.py"]);
        write(
            &dir,
            "a.py",
            "from c import helper as h\nfrom pkg import mod\nimport pkg.mod as pm\nimport os\nfrom c import *\n",
        );

        let map = resolver.build_import_map("a.py").unwrap();

        let h = map.binding("h").unwrap();
        assert_eq!(h.target, resolved("c.py"));
        assert_eq!(h.symbol.as_deref(), Some("helper"));

        // `from pkg import mod` binds the submodule
        let m = map.binding("mod").unwrap();
        assert_eq!(m.target, resolved("pkg/mod.py"));
        assert!(m.symbol.is_none());

        assert_eq!(map.binding("pm").unwrap().target, resolved("pkg/mod.py"));
        assert_eq!(map.binding("os").unwrap().target, Resolution::Unresolved);
        assert_eq!(map.entries.get("os"), Some(&Resolution::Unresolved));
        assert_eq!(map.wildcards.len(), 1);
        assert_eq!(map.resolved_files(), vec!["c.py", "pkg/__init__.py", "pkg/mod.py"]);
    }

    #[test]
    fn test_import_map_bindings_rust() {
        let (dir, resolver) = project(&["src/util.rs", "src/util/deep.rs"]);
        write(
            &dir,
            "src/lib.rs",
            "mod util;\nuse crate::util::helper;\nuse crate::util::deep;\nuse std::fmt;\n",
        );

        let map = resolver.build_import_map("src/lib.rs").unwrap();
        assert_eq!(map.binding("helper").unwrap().target, resolved("src/util.rs"));
        assert_eq!(map.binding("helper").unwrap().symbol.as_deref(), Some("helper"));
        assert_eq!(map.binding("deep").unwrap().target, resolved("src/util/deep.rs"));
        assert!(map.binding("deep").unwrap().symbol.is_none());
        assert_eq!(map.binding("fmt").unwrap().target, Resolution::Unresolved);
    }

    #[test]
    fn test_extract_imports_missing_file() {
        let (_dir, resolver) = project(&[]);
        assert!(matches!(
            resolver.extract_imports("nope.py"),
            Err(IndexerError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_extract_imports_reads_file() {
        let (dir, resolver) = project(&[]);
        write(&dir, "a.ts", "import { x } from './b';\n");
        let imports = resolver.extract_imports("a.ts").unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].names, vec![ImportedName::new("x", None)]);
    }
}
