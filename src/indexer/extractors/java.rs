//! Java: classes, interfaces, enums, records, methods, constructors and
//! `static final` constants.

use anyhow::Result;
use tree_sitter::{Node, Tree};

use super::{
    field_text, leading_comments, node_text, walk_nodes, Declaration, Descend,
    LanguageExtractor, Scope,
};
use crate::symbol::SymbolType;

pub struct JavaExtractor;

impl LanguageExtractor for JavaExtractor {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn extract(&self, tree: &Tree, source: &[u8]) -> Result<Vec<Declaration>> {
        let mut found = Vec::new();

        walk_nodes(tree.root_node(), Scope::default(), |node, scope| {
            match node.kind() {
                "class_declaration" | "interface_declaration" | "enum_declaration"
                | "record_declaration" => {
                    let name = field_text(&node, "name", source);
                    if let Some(name) = &name {
                        let kind = node.kind().trim_end_matches("_declaration");
                        found.push(
                            Declaration::new(SymbolType::Class, type_kind(kind), name.clone(), &node)
                                .with_docstring(leading_comments(&node, source, &[]))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(Scope {
                        container: name,
                        in_body: false,
                    })
                }
                "method_declaration" | "constructor_declaration" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        let kind = if node.kind() == "constructor_declaration" {
                            "constructor"
                        } else {
                            "method"
                        };
                        found.push(
                            Declaration::new(SymbolType::Method, kind, name, &node)
                                .with_signature(field_text(&node, "parameters", source))
                                .with_docstring(leading_comments(&node, source, &[]))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(scope.body())
                }
                "field_declaration" => {
                    if is_static_final(&node) {
                        found.extend(constants(&node, source, scope.container()));
                    }
                    Descend::Skip
                }
                _ => Descend::Into(scope.clone()),
            }
        });

        Ok(found)
    }
}

fn type_kind(kind: &str) -> &'static str {
    match kind {
        "interface" => "interface",
        "enum" => "enum",
        "record" => "record",
        _ => "class",
    }
}

fn is_static_final(field: &Node) -> bool {
    let mut cursor = field.walk();
    let Some(modifiers) = field
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
    else {
        return false;
    };

    let mut cursor = modifiers.walk();
    let kinds: Vec<&str> = modifiers.children(&mut cursor).map(|c| c.kind()).collect();
    kinds.contains(&"static") && kinds.contains(&"final")
}

fn constants(field: &Node, source: &[u8], parent: Option<&str>) -> Vec<Declaration> {
    let docs = leading_comments(field, source, &[]);
    let mut cursor = field.walk();
    field
        .children_by_field_name("declarator", &mut cursor)
        .filter_map(|declarator| {
            let name = declarator.child_by_field_name("name")?;
            Some(
                Declaration::new(
                    SymbolType::Constant,
                    "constant",
                    node_text(&name, source).to_string(),
                    field,
                )
                .with_docstring(docs.clone())
                .with_parent(parent),
            )
        })
        .collect()
}
