use std::path::Path;
use std::sync::Arc;

use crate::error::{IndexerError, Result};
use crate::languages::{AnalyzerRegistry, LanguageAnalyzer};

pub struct Parser {
    registry: Arc<AnalyzerRegistry>,
}

impl Parser {
    pub fn new(registry: Arc<AnalyzerRegistry>) -> Self {
        Self { registry }
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile> {
        let analyzer = self
            .registry
            .get_for_file(path)
            .ok_or_else(|| IndexerError::UnsupportedLanguage(path.display().to_string()))?;

        let source = std::fs::read_to_string(path)?;
        self.parse_source(&source, analyzer)
    }

    pub fn parse_source(
        &self,
        source: &str,
        analyzer: Arc<dyn LanguageAnalyzer>,
    ) -> Result<ParsedFile> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&analyzer.language())
            .map_err(|e| IndexerError::Parse(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| IndexerError::Parse("Failed to parse source".to_string()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_string(),
            language: analyzer.name().to_string(),
            analyzer,
        })
    }

    pub fn analyzer_for(&self, path: &Path) -> Option<Arc<dyn LanguageAnalyzer>> {
        self.registry.get_for_file(path)
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }
}

pub struct ParsedFile {
    pub tree: tree_sitter::Tree,
    pub source: String,
    pub language: String,
    pub analyzer: Arc<dyn LanguageAnalyzer>,
}

impl ParsedFile {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn node_text(&self, node: &tree_sitter::Node) -> &str {
        node.utf8_text(self.source_bytes()).unwrap_or("")
    }
}
