//! Intra-file reference extraction.
//!
//! Every line that mentions a symbol's name as a whole identifier, other than
//! a declaration header, becomes a usage edge from the symbol to itself. The
//! self edge stands in for cross-symbol resolution, which is not done.

use std::collections::HashSet;

use crate::symbol::{NewReference, ReferenceType, SymbolId};

/// A line mentioning a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSite {
    /// 1-indexed
    pub line: usize,
    pub snippet: String,
}

/// Lines of `content` that mention `name`, skipping `header_lines`.
pub fn find_usages(name: &str, content: &str, header_lines: &HashSet<usize>) -> Vec<UsageSite> {
    if name.is_empty() {
        return Vec::new();
    }

    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(line_no, _)| !header_lines.contains(line_no))
        .filter(|(_, line)| mentions(line, name))
        .map(|(line, text)| UsageSite {
            line,
            snippet: text.trim().to_string(),
        })
        .collect()
}

/// Usage edges for `symbol_id`, pointing back at itself.
pub fn self_references(symbol_id: SymbolId, file_path: &str, sites: &[UsageSite]) -> Vec<NewReference> {
    sites
        .iter()
        .map(|site| NewReference {
            from_symbol_id: symbol_id,
            to_symbol_id: symbol_id,
            reference_type: ReferenceType::Usage,
            file_path: file_path.to_string(),
            line: site.line,
            context_snippet: Some(site.snippet.clone()),
        })
        .collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Whether `name` occurs in `line` with identifier boundaries on both sides.
fn mentions(line: &str, name: &str) -> bool {
    line.match_indices(name).any(|(at, _)| {
        let before = line[..at].chars().next_back();
        let after = line[at + name.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}
