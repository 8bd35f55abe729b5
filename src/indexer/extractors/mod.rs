//! Language-specific symbol extractors.
//!
//! Each extractor walks a tree-sitter syntax tree and reports the
//! declarations it recognizes. [`ExtractorRegistry`] owns the parsers and
//! turns declarations into [`DraftSymbol`]s carrying their source text.

pub mod cpp;
pub mod go;
pub mod java;
pub mod python;
pub mod rust;
pub mod typescript;

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use tree_sitter::{Node, Tree};

use super::chunker::estimate_tokens;
use super::parser_pool::ParserPool;
use crate::symbol::SymbolType;

pub use cpp::CppExtractor;
pub use go::GoExtractor;
pub use java::JavaExtractor;
pub use python::PythonExtractor;
pub use rust::RustExtractor;
pub use typescript::TypeScriptExtractor;

/// Per-file extraction failure. Counted by the pipeline, never fatal.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to parse {file_path} as {language}")]
    Parse { language: String, file_path: String },

    #[error("no grammar available for {0}")]
    Grammar(String),

    #[error("{language} extractor failed on {file_path}: {reason}")]
    Extractor {
        language: String,
        file_path: String,
        reason: String,
    },
}

/// A declaration found in a syntax tree, before it is tied to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub symbol_type: SymbolType,
    /// Raw construct name such as `struct`, `interface` or `function`
    pub kind: &'static str,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    /// Enclosing class, impl target or namespace
    pub parent: Option<String>,
}

impl Declaration {
    pub fn new(symbol_type: SymbolType, kind: &'static str, name: String, node: &Node) -> Self {
        let (start_line, end_line) = line_span(node);
        Self {
            symbol_type,
            kind,
            name,
            start_line,
            end_line,
            start_byte: node.start_byte(),
            signature: None,
            docstring: None,
            parent: None,
        }
    }

    pub fn with_signature(mut self, signature: Option<String>) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_docstring(mut self, docstring: Option<String>) -> Self {
        self.docstring = docstring;
        self
    }

    pub fn with_parent(mut self, parent: Option<&str>) -> Self {
        self.parent = parent.map(str::to_string);
        self
    }
}

/// An extracted symbol that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSymbol {
    pub name: String,
    pub symbol_type: SymbolType,
    pub kind: &'static str,
    pub language: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub parent: Option<String>,
    /// Source lines `start_line..=end_line`
    pub content: String,
}

impl DraftSymbol {
    fn from_declaration(decl: Declaration, language: &str, file_path: &str, lines: &[&str]) -> Self {
        let from = decl.start_line.saturating_sub(1).min(lines.len());
        let to = decl.end_line.min(lines.len()).max(from);
        Self {
            content: lines[from..to].join("\n"),
            name: decl.name,
            symbol_type: decl.symbol_type,
            kind: decl.kind,
            language: language.to_string(),
            file_path: file_path.to_string(),
            start_line: decl.start_line,
            end_line: decl.end_line,
            signature: decl.signature,
            docstring: decl.docstring,
            parent: decl.parent,
        }
    }

    pub fn encloses(&self, start: usize, end: usize) -> bool {
        self.start_line <= start && end <= self.end_line
    }

    pub fn token_count(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// Capability implemented once per supported grammar.
pub trait LanguageExtractor: Send + Sync {
    /// Language tag this extractor answers to.
    fn language_id(&self) -> &'static str;

    /// Collect declarations from a parsed tree, in source order.
    fn extract(&self, tree: &Tree, source: &[u8]) -> anyhow::Result<Vec<Declaration>>;
}

/// Maps language tags to extractors and parses files on their behalf.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn LanguageExtractor>>,
    parsers: Mutex<ParserPool>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            extractors: HashMap::new(),
            parsers: Mutex::new(ParserPool::new()),
        };

        registry.register(Box::new(PythonExtractor));
        registry.register(Box::new(TypeScriptExtractor::new("javascript")));
        registry.register(Box::new(TypeScriptExtractor::new("typescript")));
        registry.register(Box::new(TypeScriptExtractor::new("tsx")));
        registry.register(Box::new(JavaExtractor));
        registry.register(Box::new(CppExtractor));
        registry.register(Box::new(GoExtractor));
        registry.register(Box::new(RustExtractor));

        registry
    }

    pub fn register(&mut self, extractor: Box<dyn LanguageExtractor>) {
        self.extractors
            .insert(extractor.language_id().to_string(), extractor);
    }

    pub fn get(&self, language: &str) -> Option<&dyn LanguageExtractor> {
        self.extractors.get(language).map(|e| e.as_ref())
    }

    pub fn supports(&self, language: &str) -> bool {
        self.extractors.contains_key(language)
    }

    pub fn supported_languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.extractors.keys().map(|s| s.as_str()).collect();
        languages.sort_unstable();
        languages
    }

    /// Extract draft symbols, surfacing parse failures.
    ///
    /// An unregistered language is not a failure: it yields no symbols.
    pub fn try_extract(
        &self,
        language: &str,
        content: &str,
        file_path: &str,
    ) -> Result<Vec<DraftSymbol>, ExtractionError> {
        let Some(extractor) = self.get(language) else {
            debug!("No extractor registered for '{}', skipping {}", language, file_path);
            return Ok(Vec::new());
        };

        let tree = {
            let mut pool = self
                .parsers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let parser = pool
                .get_parser(language)
                .ok_or_else(|| ExtractionError::Grammar(language.to_string()))?;
            parser.parse(content, None).ok_or_else(|| ExtractionError::Parse {
                language: language.to_string(),
                file_path: file_path.to_string(),
            })?
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut declarations =
            extractor
                .extract(&tree, content.as_bytes())
                .map_err(|e| ExtractionError::Extractor {
                    language: language.to_string(),
                    file_path: file_path.to_string(),
                    reason: format!("{:#}", e),
                })?;
        declarations.sort_by_key(|d| (d.start_line, d.start_byte));

        Ok(declarations
            .into_iter()
            .map(|decl| DraftSymbol::from_declaration(decl, language, file_path, &lines))
            .collect())
    }

    /// Extract draft symbols, degrading to an empty list on failure.
    pub fn extract(&self, language: &str, content: &str, file_path: &str) -> Vec<DraftSymbol> {
        match self.try_extract(language, content, file_path) {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk state threaded through [`walk_nodes`].
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Name of the enclosing class, impl target or namespace
    pub container: Option<String>,
    /// Inside a function or method body
    pub in_body: bool,
}

impl Scope {
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn within(&self, container: Option<String>) -> Self {
        Self {
            container,
            in_body: self.in_body,
        }
    }

    pub fn body(&self) -> Self {
        Self {
            container: None,
            in_body: true,
        }
    }
}

/// What [`walk_nodes`] should do with a visited node's children.
pub enum Descend<C> {
    Into(C),
    Skip,
}

/// Pre-order walk over `root` using an explicit stack.
///
/// `visit` decides per node whether its children are walked and with which
/// context value.
pub fn walk_nodes<'t, C, F>(root: Node<'t>, ctx: C, mut visit: F)
where
    C: Clone,
    F: FnMut(Node<'t>, &C) -> Descend<C>,
{
    let mut stack = vec![(root, ctx)];
    while let Some((node, ctx)) = stack.pop() {
        if let Descend::Into(child_ctx) = visit(node, &ctx) {
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
            for child in children.into_iter().rev() {
                stack.push((child, child_ctx.clone()));
            }
        }
    }
}

/// 1-indexed inclusive line span of a node.
pub fn line_span(node: &Node) -> (usize, usize) {
    let start = node.start_position().row + 1;
    let end_pos = node.end_position();
    // A node ending at column 0 stops at the preceding line break.
    let end = if end_pos.column == 0 && end_pos.row + 1 > start {
        end_pos.row
    } else {
        end_pos.row + 1
    };
    (start, end.max(start))
}

pub fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    source
        .get(node.start_byte()..node.end_byte())
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .unwrap_or("")
}

/// Text of a named field, if present and non-empty.
pub fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(&n, source).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First descendant (including `node` itself) of the given kind.
pub fn first_descendant<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == kind {
            return Some(current);
        }
        let mut cursor = current.walk();
        let children: Vec<Node<'t>> = current.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Comments directly above a declaration, cleaned of comment markers.
///
/// Sibling nodes of a kind listed in `skip` (attributes, annotations) may sit
/// between the comments and the declaration.
pub fn leading_comments(node: &Node, source: &[u8], skip: &[&str]) -> Option<String> {
    let mut blocks = Vec::new();
    let mut next_row = node.start_position().row;
    let mut sibling = node.prev_sibling();

    while let Some(prev) = sibling {
        if skip.contains(&prev.kind()) {
            next_row = prev.start_position().row;
        } else if prev.kind().contains("comment") {
            if prev.end_position().row + 1 < next_row {
                break;
            }
            blocks.push(node_text(&prev, source));
            next_row = prev.start_position().row;
        } else {
            break;
        }
        sibling = prev.prev_sibling();
    }

    if blocks.is_empty() {
        return None;
    }
    blocks.reverse();

    let cleaned: Vec<String> = blocks
        .iter()
        .flat_map(|block| block.lines())
        .map(clean_comment_line)
        .filter(|line| !line.is_empty())
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

fn clean_comment_line(line: &str) -> String {
    let mut line = line.trim();
    for marker in ["///", "//!", "//", "/**", "/*", "#"] {
        if let Some(rest) = line.strip_prefix(marker) {
            line = rest;
            break;
        }
    }
    line = line.strip_suffix("*/").unwrap_or(line);
    line = line.trim_start();
    line = line.strip_prefix('*').unwrap_or(line);
    line.trim().to_string()
}

/// Map a file path to a registered language tag.
pub fn detect_language(file_path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(file_path).extension()?.to_str()?;
    ParserPool::detect_language_from_extension(&ext.to_ascii_lowercase())
}
