use once_cell::sync::OnceCell;
use tree_sitter::{Node, Query};

use super::{line_of, node_text, preorder, ImportedName, LanguageAnalyzer, RawImport};

/// TypeScript and JavaScript share one analyzer; the TSX grammar is a
/// separate dialect because it parses JSX elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    TypeScript,
    Tsx,
}

pub struct TypeScriptAnalyzer {
    dialect: Dialect,
}

// Static query caches, one pair per grammar
static TS_DEFINITIONS_QUERY: OnceCell<Query> = OnceCell::new();
static TS_CALLS_QUERY: OnceCell<Query> = OnceCell::new();
static TSX_DEFINITIONS_QUERY: OnceCell<Query> = OnceCell::new();
static TSX_CALLS_QUERY: OnceCell<Query> = OnceCell::new();

impl TypeScriptAnalyzer {
    /// `.ts`, `.js` and the module variants of `.js`
    pub fn typescript() -> Self {
        Self {
            dialect: Dialect::TypeScript,
        }
    }

    /// `.tsx` and `.jsx`
    pub fn tsx() -> Self {
        Self {
            dialect: Dialect::Tsx,
        }
    }

    fn caches(&self) -> (&'static OnceCell<Query>, &'static OnceCell<Query>) {
        match self.dialect {
            Dialect::TypeScript => (&TS_DEFINITIONS_QUERY, &TS_CALLS_QUERY),
            Dialect::Tsx => (&TSX_DEFINITIONS_QUERY, &TSX_CALLS_QUERY),
        }
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn name(&self) -> &'static str {
        match self.dialect {
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
        }
    }

    fn file_extensions(&self) -> &[&'static str] {
        match self.dialect {
            Dialect::TypeScript => &["ts", "js", "mjs", "cjs"],
            Dialect::Tsx => &["tsx", "jsx"],
        }
    }

    fn language(&self) -> tree_sitter::Language {
        match self.dialect {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn definitions_query(&self) -> &str {
        r#"
        (function_declaration
            name: (identifier) @name
        ) @function

        (generator_function_declaration
            name: (identifier) @name
        ) @function

        (method_definition
            name: (property_identifier) @name
        ) @function

        (variable_declarator
            name: (identifier) @name
            value: [(arrow_function) (function_expression)] @function
        )

        (class_declaration
            name: (type_identifier) @name
        ) @class

        (abstract_class_declaration
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
            function: (member_expression
                object: (_) @receiver
                property: (property_identifier) @callee
            )
        ) @call

        (new_expression
            constructor: (identifier) @callee
        ) @call
        "#
    }

    fn cached_definitions_query(&self) -> Option<&'static Query> {
        let (definitions, _) = self.caches();
        definitions
            .get_or_try_init(|| Query::new(&self.language(), self.definitions_query()))
            .ok()
    }

    fn cached_calls_query(&self) -> Option<&'static Query> {
        let (_, calls) = self.caches();
        calls
            .get_or_try_init(|| Query::new(&self.language(), self.calls_query()))
            .ok()
    }

    fn function_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "method_definition" => node
                .child_by_field_name("name")
                .map(|n| node_text(&n, source).to_string()),
            // Anonymous unless bound directly by `const name = ...`
            "arrow_function" | "function_expression" => {
                let parent = node.parent()?;
                if parent.kind() != "variable_declarator" {
                    return None;
                }
                let name = parent.child_by_field_name("name")?;
                if name.kind() != "identifier" {
                    return None;
                }
                Some(node_text(&name, source).to_string())
            }
            _ => None,
        }
    }

    fn container_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => node
                .child_by_field_name("name")
                .map(|n| node_text(&n, source).to_string()),
            _ => None,
        }
    }

    /// JSDoc block directly above the declaration (or its `export`/`const` wrapper)
    fn docstring(&self, node: &Node, source: &[u8]) -> Option<String> {
        let mut anchor = *node;
        while let Some(parent) = anchor.parent() {
            match parent.kind() {
                "variable_declarator" | "lexical_declaration" | "variable_declaration"
                | "export_statement" => anchor = parent,
                _ => break,
            }
        }

        let comment = anchor.prev_named_sibling()?;
        if comment.kind() != "comment" {
            return None;
        }
        let text = node_text(&comment, source).trim();
        if !text.starts_with("/**") {
            return None;
        }

        let doc = text
            .trim_start_matches("/**")
            .trim_end_matches("*/")
            .lines()
            .map(|l| l.trim().trim_start_matches('*').trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
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
                    let Some(module) = source_module(&node, source) else {
                        continue;
                    };
                    let mut import = RawImport::module(module, line_of(&node));

                    let mut cursor = node.walk();
                    for clause in node.named_children(&mut cursor) {
                        if clause.kind() == "import_clause" {
                            import = collect_import_clause(&clause, source, import);
                        }
                    }
                    imports.push(import);
                }
                // `export { a as b } from './mod'` re-exports behave like imports
                "export_statement" => {
                    let Some(module) = source_module(&node, source) else {
                        continue;
                    };
                    let mut import = RawImport::module(module, line_of(&node));

                    let mut cursor = node.walk();
                    let mut has_clause = false;
                    for child in node.named_children(&mut cursor) {
                        if child.kind() == "export_clause" {
                            has_clause = true;
                            let mut inner = child.walk();
                            for spec in child.named_children(&mut inner) {
                                if spec.kind() != "export_specifier" {
                                    continue;
                                }
                                if let Some(name) = spec.child_by_field_name("name") {
                                    let alias = spec
                                        .child_by_field_name("alias")
                                        .map(|a| node_text(&a, source).to_string());
                                    import = import.with_name(ImportedName::new(
                                        node_text(&name, source),
                                        alias,
                                    ));
                                }
                            }
                        }
                    }
                    if !has_clause {
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

fn source_module(node: &Node, source: &[u8]) -> Option<String> {
    let source_node = node.child_by_field_name("source")?;
    let module = unquote(node_text(&source_node, source));
    if module.is_empty() {
        None
    } else {
        Some(module.to_string())
    }
}

fn collect_import_clause(clause: &Node, source: &[u8], mut import: RawImport) -> RawImport {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                import = import.with_name(ImportedName::new(
                    "default",
                    Some(node_text(&child, source).to_string()),
                ));
            }
            "namespace_import" => {
                let mut inner = child.walk();
                let alias = child
                    .named_children(&mut inner)
                    .find(|n| n.kind() == "identifier")
                    .map(|n| node_text(&n, source).to_string());
                import = import.with_alias(alias);
            }
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    if let Some(name) = spec.child_by_field_name("name") {
                        let alias = spec
                            .child_by_field_name("alias")
                            .map(|a| node_text(&a, source).to_string());
                        import =
                            import.with_name(ImportedName::new(node_text(&name, source), alias));
                    }
                }
            }
            _ => {}
        }
    }
    import
}

fn unquote(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}
