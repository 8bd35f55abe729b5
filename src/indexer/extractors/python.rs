//! Python: functions, methods, classes and module-level UPPER_CASE constants.

use anyhow::Result;
use tree_sitter::{Node, Tree};

use super::{
    field_text, first_descendant, node_text, walk_nodes, Declaration, Descend,
    LanguageExtractor, Scope,
};
use crate::symbol::SymbolType;

pub struct PythonExtractor;

impl LanguageExtractor for PythonExtractor {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn extract(&self, tree: &Tree, source: &[u8]) -> Result<Vec<Declaration>> {
        let mut found = Vec::new();

        walk_nodes(tree.root_node(), Scope::default(), |node, scope| {
            match node.kind() {
                "function_definition" => {
                    if let Some(name) = field_text(&node, "name", source) {
                        let symbol_type = if scope.container.is_some() {
                            SymbolType::Method
                        } else {
                            SymbolType::Function
                        };
                        found.push(
                            Declaration::new(symbol_type, "function", name, &node)
                                .with_signature(field_text(&node, "parameters", source))
                                .with_docstring(docstring(&node, source))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(scope.body())
                }
                "class_definition" => {
                    let name = field_text(&node, "name", source);
                    if let Some(name) = &name {
                        found.push(
                            Declaration::new(SymbolType::Class, "class", name.clone(), &node)
                                .with_signature(field_text(&node, "superclasses", source))
                                .with_docstring(docstring(&node, source))
                                .with_parent(scope.container()),
                        );
                    }
                    Descend::Into(Scope {
                        container: name,
                        in_body: false,
                    })
                }
                "assignment" if scope.container.is_none() && !scope.in_body => {
                    if let Some(decl) = module_constant(&node, source) {
                        found.push(decl);
                    }
                    Descend::Skip
                }
                _ => Descend::Into(scope.clone()),
            }
        });

        Ok(found)
    }
}

/// String literal opening a function or class body.
fn docstring(node: &Node, source: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0).filter(|n| n.kind() == "string")?;

    let raw = match first_descendant(literal, "string_content") {
        Some(content) => node_text(&content, source),
        None => node_text(&literal, source).trim_matches(|c| c == '"' || c == '\''),
    };

    let text = raw
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn module_constant(node: &Node, source: &[u8]) -> Option<Declaration> {
    let left = node.child_by_field_name("left")?;
    if left.kind() != "identifier" {
        return None;
    }
    let name = node_text(&left, source);
    let is_constant = name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if !is_constant {
        return None;
    }
    Some(Declaration::new(
        SymbolType::Constant,
        "constant",
        name.to_string(),
        node,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::extractors::ExtractorRegistry;

    fn extract(src: &str) -> Vec<crate::indexer::DraftSymbol> {
        ExtractorRegistry::new().extract("python", src, "mod.py")
    }

    #[test]
    fn test_add_function() {
        let drafts = extract("def add(a,b):\n    return a+b\n");
        assert_eq!(drafts.len(), 1);
        let add = &drafts[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.symbol_type, SymbolType::Function);
        assert_eq!((add.start_line, add.end_line), (1, 2));
        assert_eq!(add.signature.as_deref(), Some("(a,b)"));
    }

    #[test]
    fn test_class_with_methods_and_docstring() {
        let src = r#"class Greeter(Base):
    """Says hello."""

    def greet(self, name):
        """Greet someone."""
        def inner():
            return name
        return inner()
"#;
        let drafts = extract(src);
        let names: Vec<_> = drafts.iter().map(|d| (d.name.as_str(), d.symbol_type)).collect();
        assert_eq!(
            names,
            vec![
                ("Greeter", SymbolType::Class),
                ("greet", SymbolType::Method),
                ("inner", SymbolType::Function),
            ]
        );
        assert_eq!(drafts[0].docstring.as_deref(), Some("Says hello."));
        assert_eq!(drafts[1].docstring.as_deref(), Some("Greet someone."));
        assert_eq!(drafts[1].parent.as_deref(), Some("Greeter"));
        assert_eq!((drafts[0].start_line, drafts[0].end_line), (1, 8));
    }

    #[test]
    fn test_decorated_function_span_excludes_decorator() {
        let src = "@cache\ndef load(path):\n    return open(path).read()\n";
        let drafts = extract(src);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].start_line, 2);
    }

    #[test]
    fn test_module_constants() {
        let src = "MAX_RETRIES = 3\nlimit = 4\n\ndef f():\n    LOCAL = 1\n";
        let drafts = extract(src);
        let names: Vec<_> = drafts.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["MAX_RETRIES", "f"]);
        assert_eq!(drafts[0].symbol_type, SymbolType::Constant);
    }

    #[test]
    fn test_lambda_is_not_a_symbol() {
        let drafts = extract("square = lambda x: x * x\n");
        assert!(drafts.is_empty());
    }
}
