//! C++: free functions, member functions (inline or `Type::name`
//! out-of-line definitions), classes, structs, enums and namespaces.

use anyhow::Result;
use tree_sitter::{Node, Tree};

use super::{
    field_text, leading_comments, node_text, walk_nodes, Declaration, Descend,
    LanguageExtractor, Scope,
};
use crate::symbol::SymbolType;

pub struct CppExtractor;

impl LanguageExtractor for CppExtractor {
    fn language_id(&self) -> &'static str {
        "cpp"
    }

    fn extract(&self, tree: &Tree, source: &[u8]) -> Result<Vec<Declaration>> {
        let mut found = Vec::new();

        walk_nodes(tree.root_node(), Scope::default(), |node, scope| {
            match node.kind() {
                "function_definition" => {
                    if let Some(decl) = function(&node, source, scope) {
                        found.push(decl);
                    }
                    Descend::Into(scope.body())
                }
                "class_specifier" | "struct_specifier" | "enum_specifier" => {
                    let name = field_text(&node, "name", source);
                    // Forward declarations and elaborated type uses have no body.
                    if node.child_by_field_name("body").is_none() {
                        return Descend::Skip;
                    }
                    if let Some(name) = &name {
                        let kind = node.kind().trim_end_matches("_specifier");
                        let kind = match kind {
                            "struct" => "struct",
                            "enum" => "enum",
                            _ => "class",
                        };
                        found.push(
                            Declaration::new(SymbolType::Class, kind, name.clone(), &node)
                                .with_docstring(docs(&node, source))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(Scope {
                        container: name,
                        in_body: false,
                    })
                }
                "namespace_definition" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        found.push(
                            Declaration::new(SymbolType::Module, "namespace", name, &node)
                                .with_docstring(docs(&node, source)),
                        );
                    }
                    Descend::Into(scope.clone())
                }
                _ => Descend::Into(scope.clone()),
            }
        });

        Ok(found)
    }
}

fn function(node: &Node, source: &[u8], scope: &Scope) -> Option<Declaration> {
    let declarator = function_declarator(node)?;
    let name_node = declarator.child_by_field_name("declarator")?;
    let full_name = node_text(&name_node, source).trim();
    if full_name.is_empty() {
        return None;
    }

    let (parent, name) = match full_name.rsplit_once("::") {
        Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
        None => (scope.container.clone(), full_name.to_string()),
    };
    let symbol_type = if parent.is_some() {
        SymbolType::Method
    } else {
        SymbolType::Function
    };

    Some(
        Declaration::new(symbol_type, "function", name, node)
            .with_signature(field_text(&declarator, "parameters", source))
            .with_docstring(docs(node, source))
            .with_parent(parent.as_deref()),
    )
}

/// Follow pointer/reference wrappers down to the `function_declarator`.
fn function_declarator<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if current.kind() == "function_declarator" {
            return Some(current);
        }
        current = match current.child_by_field_name("declarator") {
            Some(inner) => inner,
            None if current.kind() == "parenthesized_declarator" => current.named_child(0)?,
            None => return None,
        };
    }
}

fn docs(node: &Node, source: &[u8]) -> Option<String> {
    match node.parent().filter(|p| p.kind() == "template_declaration") {
        Some(template) => leading_comments(&template, source, &[]),
        None => leading_comments(node, source, &[]),
    }
}
