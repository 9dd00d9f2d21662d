use once_cell::sync::OnceCell;
use tree_sitter::{Node, Query};

use super::{line_of, node_text, preorder, ImportedName, LanguageAnalyzer, RawImport};

pub struct RustAnalyzer;

// Static query caches for Rust
static RUST_DEFINITIONS_QUERY: OnceCell<Query> = OnceCell::new();
static RUST_CALLS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageAnalyzer for RustAnalyzer {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["rs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn definitions_query(&self) -> &str {
        r#"
        (function_item
            name: (identifier) @name
        ) @function

        (function_signature_item
            name: (identifier) @name
        ) @function

        (struct_item
            name: (type_identifier) @name
        ) @class

        (enum_item
            name: (type_identifier) @name
        ) @class

        (trait_item
            name: (type_identifier) @name
        ) @class
        "#
    }

    fn calls_query(&self) -> &str {
        r#"
        (call_expression
            function: (identifier) @callee
        ) @call

        (call_expression
            function: (scoped_identifier
                path: (_) @receiver
                name: (identifier) @callee
            )
        ) @call

        (call_expression
            function: (field_expression
                value: (_) @receiver
                field: (field_identifier) @callee
            )
        ) @call
        "#
    }

    fn cached_definitions_query(&self) -> Option<&'static Query> {
        RUST_DEFINITIONS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.definitions_query()))
            .ok()
    }

    fn cached_calls_query(&self) -> Option<&'static Query> {
        RUST_CALLS_QUERY
            .get_or_try_init(|| Query::new(&self.language(), self.calls_query()))
            .ok()
    }

    fn function_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "function_item" | "function_signature_item" => node
                .child_by_field_name("name")
                .map(|n| node_text(&n, source).to_string()),
            _ => None,
        }
    }

    /// `impl Foo<T>` and `impl Trait for Foo` both attach methods to `Foo`
    fn container_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "impl_item" => {
                let ty = node.child_by_field_name("type")?;
                let text = node_text(&ty, source);
                let base = text.split('<').next().unwrap_or(text);
                let name = base.rsplit("::").next().unwrap_or(base).trim();
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                }
            }
            "trait_item" => node
                .child_by_field_name("name")
                .map(|n| node_text(&n, source).to_string()),
            _ => None,
        }
    }

    fn extract_imports(&self, root: &Node, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        for node in preorder(*root) {
            if node.kind() != "use_declaration" {
                continue;
            }
            if let Some(argument) = node.child_by_field_name("argument") {
                flatten_use(&argument, source, "", line_of(&node), &mut imports);
            }
        }
        imports
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}::{}", prefix, path),
    }
}

/// Turns one `use` tree into a flat list of imports, one per leaf
fn flatten_use(node: &Node, source: &[u8], prefix: &str, line: u32, out: &mut Vec<RawImport>) {
    match node.kind() {
        "use_as_clause" => {
            let Some(path) = node.child_by_field_name("path") else {
                return;
            };
            let alias = node
                .child_by_field_name("alias")
                .map(|a| node_text(&a, source).to_string());
            push_leaf(&join_path(prefix, node_text(&path, source)), alias, line, out);
        }
        "scoped_use_list" => {
            let path = node
                .child_by_field_name("path")
                .map(|p| node_text(&p, source))
                .unwrap_or("");
            let nested = join_path(prefix, path);
            if let Some(list) = node.child_by_field_name("list") {
                flatten_use(&list, source, &nested, line, out);
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                flatten_use(&child, source, prefix, line, out);
            }
        }
        "use_wildcard" => {
            let text = node_text(node, source);
            let module = join_path(prefix, text.trim_end_matches('*').trim_end_matches("::"));
            out.push(RawImport::module(module, line).with_wildcard());
        }
        // `use a::{self}` names the module itself
        "self" if !prefix.is_empty() => {
            out.push(RawImport::module(prefix, line));
        }
        "identifier" | "scoped_identifier" | "crate" | "super" | "self" => {
            push_leaf(&join_path(prefix, node_text(node, source)), None, line, out);
        }
        _ => {}
    }
}

fn push_leaf(path: &str, alias: Option<String>, line: u32, out: &mut Vec<RawImport>) {
    match path.rsplit_once("::") {
        Some((module, name)) if name == "self" => {
            out.push(RawImport::module(module, line).with_alias(alias));
        }
        Some((module, name)) => {
            out.push(RawImport::module(module, line).with_name(ImportedName::new(name, alias)));
        }
        None => out.push(RawImport::module(path, line).with_alias(alias)),
    }
}
