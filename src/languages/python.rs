use once_cell::sync::OnceCell;
use tree_sitter::{Node, Query};

use super::{clean_docstring, line_of, node_text, preorder, ImportedName, LanguageAnalyzer, RawImport};

pub struct PythonAnalyzer;

// Static query caches for Python
static PYTHON_DEFINITIONS_QUERY: OnceCell<Query> = OnceCell::new();
static PYTHON_CALLS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageAnalyzer for PythonAnalyzer {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["py", "pyi"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn definitions_query(&self) -> &str {
        r#"
        (function_definition
            name: (identifier) @name
        ) @function

        (class_definition
            name: (identifier) @name
        ) @class
        "#
    }

    fn calls_query(&self) -> &str {
        r#"
        (call
            function: (identifier) @callee
        ) @call

        (call
            function: (attribute
                object: (_) @receiver
                attribute: (identifier) @callee
            )
        ) @call
        "#
    }

    fn cached_definitions_query(&self) -> Option<&'static Query> {
        PYTHON_DEFINITIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.definitions_query()))
            .ok()
    }

    fn cached_calls_query(&self) -> Option<&'static Query> {
        PYTHON_CALLS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.calls_query()))
            .ok()
    }

    fn function_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        if node.kind() != "function_definition" {
            return None;
        }
        node.child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string())
    }

    fn container_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        if node.kind() != "class_definition" {
            return None;
        }
        node.child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string())
    }

    /// The string literal opening a function or class body
    fn docstring(&self, node: &Node, source: &[u8]) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let mut cursor = body.walk();
        let first = body.named_children(&mut cursor).next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let mut inner = first.walk();
        let literal = first.named_children(&mut inner).next()?;
        if literal.kind() != "string" {
            return None;
        }

        let doc = clean_docstring(&string_literal_value(node_text(&literal, source)));
        if doc.is_empty() {
            None
        } else {
            Some(doc)
        }
    }

    fn extract_imports(&self, root: &Node, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();

        for node in preorder(*root) {
            match node.kind() {
                "import_statement" => {
                    let mut cursor = node.walk();
                    for child in node.children_by_field_name("name", &mut cursor) {
                        let (name, alias) = dotted_with_alias(&child, source);
                        if !name.is_empty() {
                            imports.push(RawImport::module(name, line_of(&node)).with_alias(alias));
                        }
                    }
                }
                "import_from_statement" => {
                    let (module, level) = match node.child_by_field_name("module_name") {
                        Some(m) if m.kind() == "relative_import" => relative_module(&m, source),
                        Some(m) => (node_text(&m, source).to_string(), 0),
                        None => continue,
                    };

                    let mut import = RawImport::module(module, line_of(&node)).with_level(level);
                    let mut cursor = node.walk();
                    for child in node.children_by_field_name("name", &mut cursor) {
                        let (name, alias) = dotted_with_alias(&child, source);
                        if !name.is_empty() {
                            import = import.with_name(ImportedName::new(name, alias));
                        }
                    }

                    let mut cursor = node.walk();
                    let wildcard = node
                        .named_children(&mut cursor)
                        .any(|c| c.kind() == "wildcard_import");
                    if wildcard {
                        import = import.with_wildcard();
                    }
                    imports.push(import);
                }
                _ => {}
            }
        }

        imports
    }
}

/// `a.b` or `a.b as c`
fn dotted_with_alias(node: &Node, source: &[u8]) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string())
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|n| node_text(&n, source).to_string());
        (name, alias)
    } else {
        (node_text(node, source).to_string(), None)
    }
}

/// `..pkg.mod` -> (`pkg.mod`, 2)
fn relative_module(node: &Node, source: &[u8]) -> (String, usize) {
    let text = node_text(node, source);
    let level = text.chars().take_while(|&c| c == '.').count();
    let module = text[level..].trim().to_string();
    (module, level)
}

fn string_literal_value(text: &str) -> String {
    let body = text.trim_start_matches(|c: char| matches!(c, 'r' | 'R' | 'u' | 'U' | 'b' | 'B' | 'f' | 'F'));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= quote.len() * 2 && body.starts_with(quote) && body.ends_with(quote) {
            return body[quote.len()..body.len() - quote.len()].to_string();
        }
    }
    body.to_string()
}
