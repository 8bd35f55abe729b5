//! Rust: functions, methods inside `impl`/`trait` blocks, structs, enums,
//! unions, traits, modules and `const`/`static` items.

use anyhow::Result;
use tree_sitter::{Node, Tree};

use super::{
    field_text, leading_comments, node_text, walk_nodes, Declaration, Descend,
    LanguageExtractor, Scope,
};
use crate::symbol::SymbolType;

const ATTRIBUTES: &[&str] = &["attribute_item"];

pub struct RustExtractor;

impl LanguageExtractor for RustExtractor {
    fn language_id(&self) -> &'static str {
        "rust"
    }

    fn extract(&self, tree: &Tree, source: &[u8]) -> Result<Vec<Declaration>> {
        let mut found = Vec::new();

        walk_nodes(tree.root_node(), Scope::default(), |node, scope| {
            match node.kind() {
                "function_item" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        let symbol_type = if scope.container.is_some() {
                            SymbolType::Method
                        } else {
                            SymbolType::Function
                        };
                        found.push(
                            Declaration::new(symbol_type, "fn", name, &node)
                                .with_signature(field_text(&node, "parameters", source))
                                .with_docstring(leading_comments(&node, source, ATTRIBUTES))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(scope.body())
                }
                "impl_item" => Descend::Into(Scope {
                    container: impl_target(&node, source),
                    in_body: false,
                }),
                "struct_item" | "enum_item" | "union_item" | "trait_item" => {
                    let name = field_text(&node, "name", source);
                    if let Some(name) = &name {
                        let kind = match node.kind() {
                            "struct_item" => "struct",
                            "enum_item" => "enum",
                            "union_item" => "union",
                            _ => "trait",
                        };
                        found.push(
                            Declaration::new(SymbolType::Class, kind, name.clone(), &node)
                                .with_docstring(leading_comments(&node, source, ATTRIBUTES)),
                        );
                    }
                    if node.kind() == "trait_item" {
                        Descend::Into(Scope {
                            container: name,
                            in_body: false,
                        })
                    } else {
                        Descend::Skip
                    }
                }
                "mod_item" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        found.push(
                            Declaration::new(SymbolType::Module, "mod", name, &node)
                                .with_docstring(leading_comments(&node, source, ATTRIBUTES)),
                        );
                    }
                    Descend::Into(Scope::default())
                }
                "const_item" | "static_item" if !scope.in_body => {
                    if let Some(name) = field_text(&node, "name", source) {
                        let kind = if node.kind() == "const_item" { "const" } else { "static" };
                        found.push(
                            Declaration::new(SymbolType::Constant, kind, name, &node)
                                .with_docstring(leading_comments(&node, source, ATTRIBUTES))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Skip
                }
                _ => Descend::Into(scope.clone()),
            }
        });

        Ok(found)
    }
}

/// Bare type name an `impl` block attaches to, without generic arguments.
fn impl_target(node: &Node, source: &[u8]) -> Option<String> {
    let ty = node.child_by_field_name("type")?;
    let base = match ty.kind() {
        "generic_type" => ty.child_by_field_name("type").unwrap_or(ty),
        _ => ty,
    };
    Some(node_text(&base, source).to_string())
}
