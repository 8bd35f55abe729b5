//! JavaScript, TypeScript and TSX share one extractor; the grammars agree on
//! the node kinds used here.

use anyhow::Result;
use tree_sitter::{Node, Tree};

use super::{
    field_text, leading_comments, node_text, walk_nodes, Declaration, Descend,
    LanguageExtractor, Scope,
};
use crate::symbol::SymbolType;

pub struct TypeScriptExtractor {
    language: &'static str,
}

impl TypeScriptExtractor {
    /// `language` is one of `javascript`, `typescript` or `tsx`.
    pub fn new(language: &'static str) -> Self {
        Self { language }
    }
}

impl LanguageExtractor for TypeScriptExtractor {
    fn language_id(&self) -> &'static str {
        self.language
    }

    fn extract(&self, tree: &Tree, source: &[u8]) -> Result<Vec<Declaration>> {
        let mut found = Vec::new();

        walk_nodes(tree.root_node(), Scope::default(), |node, scope| {
            match node.kind() {
                "function_declaration" | "generator_function_declaration" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        found.push(
                            Declaration::new(SymbolType::Function, "function", name, &node)
                                .with_signature(field_text(&node, "parameters", source))
                                .with_docstring(docs(&node, source))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(scope.body())
                }
                "method_definition" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        found.push(
                            Declaration::new(SymbolType::Method, "method", name, &node)
                                .with_signature(field_text(&node, "parameters", source))
                                .with_docstring(docs(&node, source))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(scope.body())
                }
                "class_declaration" | "abstract_class_declaration" | "class" => {
                    let name = field_text(&node, "name", source);
                    if let Some(name) = &name {
                        found.push(
                            Declaration::new(SymbolType::Class, "class", name.clone(), &node)
                                .with_docstring(docs(&node, source))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(Scope {
                        container: name,
                        in_body: false,
                    })
                }
                "interface_declaration" | "enum_declaration" => {
                    let kind = if node.kind() == "enum_declaration" {
                        "enum"
                    } else {
                        "interface"
                    };
                    if let Some(name) = field_text(&node, "name", source) {
                        found.push(
                            Declaration::new(SymbolType::Class, kind, name, &node)
                                .with_docstring(docs(&node, source)),
                        );
                    }
                    Descend::Skip
                }
                "lexical_declaration" | "variable_declaration"
                    if !scope.in_body && scope.container.is_none() =>
                {
                    found.extend(top_level_bindings(&node, source));
                    Descend::Into(scope.body())
                }
                _ => Descend::Into(scope.clone()),
            }
        });

        Ok(found)
    }
}

/// `const f = () => ...` becomes a function, any other named binding a variable.
fn top_level_bindings(declaration: &Node, source: &[u8]) -> Vec<Declaration> {
    let mut cursor = declaration.walk();
    let declarators: Vec<Node> = declaration
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "variable_declarator")
        .collect();
    let single = declarators.len() == 1;

    declarators
        .iter()
        .filter_map(|declarator| {
            let name_node = declarator.child_by_field_name("name")?;
            if name_node.kind() != "identifier" {
                return None;
            }
            let name = node_text(&name_node, source).to_string();
            let span_node = if single { declaration } else { declarator };

            let value = declarator.child_by_field_name("value");
            let decl = match value {
                Some(v) if is_function_value(&v) => {
                    let params = field_text(&v, "parameters", source)
                        .or_else(|| field_text(&v, "parameter", source));
                    Declaration::new(SymbolType::Function, "function", name, span_node)
                        .with_signature(params)
                }
                _ => Declaration::new(SymbolType::Variable, "variable", name, span_node),
            };
            Some(decl.with_docstring(docs(declaration, source)))
        })
        .collect()
}

fn is_function_value(node: &Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

fn docs(node: &Node, source: &[u8]) -> Option<String> {
    match node.parent().filter(|p| p.kind() == "export_statement") {
        Some(export) => leading_comments(&export, source, &["decorator"]),
        None => leading_comments(node, source, &["decorator"]),
    }
}
