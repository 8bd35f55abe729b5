//! Go: functions, methods (parented by receiver type), type declarations,
//! and package-level `const`/`var` specs.

use anyhow::Result;
use tree_sitter::{Node, Tree};

use super::{
    field_text, first_descendant, leading_comments, node_text, walk_nodes, Declaration,
    Descend, LanguageExtractor, Scope,
};
use crate::symbol::SymbolType;

pub struct GoExtractor;

impl LanguageExtractor for GoExtractor {
    fn language_id(&self) -> &'static str {
        "go"
    }

    fn extract(&self, tree: &Tree, source: &[u8]) -> Result<Vec<Declaration>> {
        let mut found = Vec::new();

        walk_nodes(tree.root_node(), Scope::default(), |node, scope| {
            match node.kind() {
                "function_declaration" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        found.push(
                            Declaration::new(SymbolType::Function, "function", name, &node)
                                .with_signature(field_text(&node, "parameters", source))
                                .with_docstring(leading_comments(&node, source, &[])),
                        );
                    }
                    Descend::Into(scope.body())
                }
                "method_declaration" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        let receiver = node
                            .child_by_field_name("receiver")
                            .and_then(|r| first_descendant(r, "type_identifier"))
                            .map(|t| node_text(&t, source).to_string());
                        found.push(
                            Declaration::new(SymbolType::Method, "method", name, &node)
                                .with_signature(field_text(&node, "parameters", source))
                                .with_docstring(leading_comments(&node, source, &[]))
                                .with_parent(receiver.as_deref()),
                        );
                    }
                    Descend::Into(scope.body())
                }
                "type_spec" | "type_alias" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        let kind = match node.child_by_field_name("type").map(|t| t.kind()) {
                            Some("struct_type") => "struct",
                            Some("interface_type") => "interface",
                            _ => "type",
                        };
                        found.push(
                            Declaration::new(SymbolType::Class, kind, name, &node)
                                .with_docstring(group_docs(&node, source)),
                        );
                    }
                    Descend::Skip
                }
                "const_spec" | "var_spec" if !scope.in_body => {
                    let (symbol_type, kind) = if node.kind() == "const_spec" {
                        (SymbolType::Constant, "constant")
                    } else {
                        (SymbolType::Variable, "variable")
                    };
                    let docs = group_docs(&node, source);
                    let mut cursor = node.walk();
                    for name in node.children_by_field_name("name", &mut cursor) {
                        found.push(
                            Declaration::new(
                                symbol_type,
                                kind,
                                node_text(&name, source).to_string(),
                                &node,
                            )
                            .with_docstring(docs.clone()),
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

/// Comments above a spec, or above its `type`/`const`/`var` keyword when the
/// declaration is not parenthesized.
fn group_docs(spec: &Node, source: &[u8]) -> Option<String> {
    leading_comments(spec, source, &[]).or_else(|| {
        spec.parent()
            .filter(|p| p.kind().ends_with("_declaration"))
            .and_then(|p| leading_comments(&p, source, &[]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::extractors::ExtractorRegistry;

    #[test]
    fn test_package_level_declarations() {
        let src = r#"package store

// MaxItems bounds the cache.
const MaxItems = 64

// Cache holds items.
type Cache struct {
	items map[string]int
}

func New() *Cache {
	var local = 1
	_ = local
	return &Cache{}
}

// Get looks up a key.
func (c *Cache) Get(key string) (int, bool) {
	v, ok := c.items[key]
	return v, ok
}
"#;
        let drafts = ExtractorRegistry::new().extract("go", src, "store/cache.go");
        let summary: Vec<_> = drafts
            .iter()
            .map(|d| (d.name.as_str(), d.symbol_type, d.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("MaxItems", SymbolType::Constant, "constant"),
                ("Cache", SymbolType::Class, "struct"),
                ("New", SymbolType::Function, "function"),
                ("Get", SymbolType::Method, "method"),
            ]
        );
        assert_eq!(drafts[0].docstring.as_deref(), Some("MaxItems bounds the cache."));
        assert_eq!(drafts[1].docstring.as_deref(), Some("Cache holds items."));
        assert_eq!(drafts[3].parent.as_deref(), Some("Cache"));
        assert_eq!(drafts[3].docstring.as_deref(), Some("Get looks up a key."));
        assert_eq!(drafts[3].signature.as_deref(), Some("(key string)"));
    }
}
