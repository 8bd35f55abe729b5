//! Lazily constructed tree-sitter parsers, one per language tag.

use std::collections::HashMap;

use tracing::debug;
use tree_sitter::{Language, Parser};

/// Grammar table plus the parsers built from it so far.
pub struct ParserPool {
    parsers: HashMap<&'static str, Parser>,
    grammars: HashMap<&'static str, Language>,
}

impl ParserPool {
    pub fn new() -> Self {
        let mut grammars = HashMap::new();
        grammars.insert("python", tree_sitter_python::LANGUAGE.into());
        grammars.insert("javascript", tree_sitter_javascript::LANGUAGE.into());
        grammars.insert(
            "typescript",
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        );
        grammars.insert("tsx", tree_sitter_typescript::LANGUAGE_TSX.into());
        grammars.insert("java", tree_sitter_java::LANGUAGE.into());
        grammars.insert("cpp", tree_sitter_cpp::LANGUAGE.into());
        grammars.insert("go", tree_sitter_go::LANGUAGE.into());
        grammars.insert("rust", tree_sitter_rust::LANGUAGE.into());

        Self {
            parsers: HashMap::new(),
            grammars,
        }
    }

    /// Parser for `language`, built on first use.
    pub fn get_parser(&mut self, language: &str) -> Option<&mut Parser> {
        let (&tag, grammar) = self.grammars.get_key_value(language)?;

        if !self.parsers.contains_key(tag) {
            let mut parser = Parser::new();
            if let Err(e) = parser.set_language(grammar) {
                debug!("Grammar for '{}' rejected by parser: {:?}", tag, e);
                return None;
            }
            self.parsers.insert(tag, parser);
        }

        self.parsers.get_mut(tag)
    }

    pub fn supports(&self, language: &str) -> bool {
        self.grammars.contains_key(language)
    }

    /// Language tag for a lowercase file extension without the dot.
    pub fn detect_language_from_extension(ext: &str) -> Option<&'static str> {
        match ext {
            "py" => Some("python"),
            "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
            "ts" => Some("typescript"),
            "tsx" => Some("tsx"),
            "java" => Some("java"),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" | "h" => Some("cpp"),
            "go" => Some("go"),
            "rs" => Some("rust"),
            _ => None,
        }
    }
}

impl Default for ParserPool {
    fn default() -> Self {
        Self::new()
    }
}
