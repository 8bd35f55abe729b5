//! Splitting text into embedding units and estimating their size.

use serde_json::json;

use super::DraftSymbol;
use crate::symbol::{ChunkId, Metadata, NewSymbolChunk, Symbol, SymbolId};

/// Whitespace-delimited word count, used everywhere a token count is needed.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The single chunk a symbol currently owns: its whole source text.
pub fn symbol_chunk(symbol_id: SymbolId, draft: &DraftSymbol) -> NewSymbolChunk {
    NewSymbolChunk {
        symbol_id,
        chunk_index: 0,
        content: draft.content.clone(),
        start_line: draft.start_line,
        end_line: draft.end_line,
        token_count: draft.token_count(),
    }
}

/// Vector-index metadata stored next to a symbol chunk's embedding.
pub fn chunk_metadata(symbol: &Symbol, chunk_id: ChunkId) -> Metadata {
    let value = json!({
        "symbol_id": symbol.id,
        "chunk_id": chunk_id,
        "file_path": symbol.file_path,
        "language": symbol.language,
        "start_line": symbol.start_line,
        "end_line": symbol.end_line,
        "symbol_type": symbol.symbol_type.as_str(),
        "symbol_name": symbol.name,
        "commit_hash": symbol.commit_hash,
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

/// Vector id for a chunk; stable so re-indexing overwrites the entry.
pub fn chunk_vector_id(chunk_id: ChunkId) -> String {
    format!("chunk-{}", chunk_id)
}

/// Split `text` into pieces of at most `max_chars`, breaking on line
/// boundaries. A single line longer than `max_chars` becomes its own piece.
pub fn split_on_lines(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if !current.is_empty() && current.len() + 1 + line.len() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
