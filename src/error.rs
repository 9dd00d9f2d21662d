use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Project root does not exist or is not a directory: {0}")]
    ProjectRootMissing(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;
