//! Engine configuration
//!
//! Read from an optional TOML file and then overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, Result};

/// File looked up in the project root when no explicit config is given
pub const CONFIG_FILENAME: &str = ".code-intel.toml";

const SNAPSHOT_DIR: &str = ".code-intel";
const SNAPSHOT_FILE: &str = "index.json";

pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    "dist",
    "build",
    ".mypy_cache",
    ".pytest_cache",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Project root
    pub root: PathBuf,
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
    /// Also honor `.gitignore` / `.ignore` files during full scans
    pub respect_gitignore: bool,
    pub extract_docstrings: bool,
    pub watch_enabled: bool,
    /// Seconds between scheduler drains
    pub debounce_secs: f64,
    /// Call graph traversal ceiling
    pub max_files: usize,
    /// Snapshot file; relative paths are taken from the root
    pub snapshot_path: Option<PathBuf>,
    /// Directories absolute imports are resolved against, relative to the root
    pub source_roots: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|d| d.to_string()).collect(),
            respect_gitignore: true,
            extract_docstrings: true,
            watch_enabled: true,
            debounce_secs: 1.0,
            max_files: 50,
            snapshot_path: None,
            source_roots: vec!["".to_string(), "src".to_string(), "lib".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Loads `path`, keeping defaults for every field the file omits
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| IndexerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Explicit file if given, else `<root>/.code-intel.toml` if present, else defaults.
    ///
    /// A file without a `root` keeps the root it was discovered from.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let discovered = root.join(CONFIG_FILENAME);
        let file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None if discovered.is_file() => Some(discovered),
            None => None,
        };

        let Some(file) = file else {
            return Ok(Self::new(root));
        };

        tracing::debug!("Loading config from {}", file.display());
        let content = fs::read_to_string(&file)?;
        let has_root = content
            .parse::<toml::Table>()
            .map(|table| table.contains_key("root"))
            .unwrap_or(false);
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| IndexerError::Config(format!("{}: {}", file.display(), e)))?;
        if !has_root {
            config.root = root.to_path_buf();
        }
        Ok(config)
    }

    /// Checks the root and the debounce window
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(IndexerError::ProjectRootMissing(self.root.display().to_string()));
        }
        self.debounce()?;
        Ok(())
    }

    /// Drain interval; anything not representable as a positive duration is a config error
    pub fn debounce(&self) -> Result<Duration> {
        let invalid = || {
            IndexerError::Config(format!(
                "debounce_secs must be a positive number of seconds, got {}",
                self.debounce_secs
            ))
        };
        if !self.debounce_secs.is_finite() || self.debounce_secs <= 0.0 {
            return Err(invalid());
        }
        Duration::try_from_secs_f64(self.debounce_secs).map_err(|_| invalid())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        match &self.snapshot_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.join(path),
            None => self.root.join(SNAPSHOT_DIR).join(SNAPSHOT_FILE),
        }
    }

    /// Root made absolute, so relative paths computed against it are stable
    pub fn canonical_root(&self) -> Result<PathBuf> {
        self.root
            .canonicalize()
            .map_err(|_| IndexerError::ProjectRootMissing(self.root.display().to_string()))
    }
}
