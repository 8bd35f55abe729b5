//! Mapping a file location or a free-text snippet to a symbol.
//!
//! Exact structural lookups always run before semantic search: a persisted
//! symbol enclosing the line range wins, then a fresh parse of the file, and
//! only then the vector index.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::types::{symbols_namespace, Metadata, ProjectId, Symbol, SymbolId, SymbolKey};
use crate::config::ResolverConfig;
use crate::embeddings::EmbeddingProvider;
use crate::engine::EngineError;
use crate::indexer::{detect_language, DraftSymbol, ExtractorRegistry};
use crate::metrics::{RESOLUTIONS, SEMANTIC_FALLBACKS};
use crate::search::VectorIndex;
use crate::storage::Store;
use crate::vcs::{normalize_path, SnapshotProvider};

/// Symbol found around a line range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "symbol", rename_all = "lowercase")]
pub enum EnclosingSymbol {
    /// A persisted symbol
    Stored(Symbol),
    /// Found by parsing the file; not in the store yet
    Parsed(DraftSymbol),
}

impl EnclosingSymbol {
    pub fn id(&self) -> Option<SymbolId> {
        match self {
            EnclosingSymbol::Stored(symbol) => Some(symbol.id),
            EnclosingSymbol::Parsed(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EnclosingSymbol::Stored(symbol) => &symbol.name,
            EnclosingSymbol::Parsed(draft) => &draft.name,
        }
    }
}

/// A semantic search hit mapped back to its symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolMatch {
    pub symbol: Symbol,
    /// `1 - distance` reported by the vector index
    pub similarity: f32,
    pub metadata: Metadata,
}

pub struct SymbolResolver {
    store: Arc<dyn Store>,
    snapshot: Arc<dyn SnapshotProvider>,
    extractors: Arc<ExtractorRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: ResolverConfig,
}

impl SymbolResolver {
    pub fn new(
        store: Arc<dyn Store>,
        snapshot: Arc<dyn SnapshotProvider>,
        extractors: Arc<ExtractorRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            snapshot,
            extractors,
            embedder,
            index,
            config,
        }
    }

    /// The innermost symbol of `file_path` containing the line range.
    ///
    /// Without a start line, `snippet` is resolved by semantic search within
    /// the file instead. `end_line` defaults to `start_line`.
    pub async fn find_enclosing_symbol(
        &self,
        project_id: ProjectId,
        file_path: &str,
        start_line: Option<usize>,
        end_line: Option<usize>,
        snippet: Option<&str>,
    ) -> Result<Option<EnclosingSymbol>, EngineError> {
        let Some(file_path) = normalize_path(file_path) else {
            return Ok(None);
        };
        let file_path = file_path.as_str();
        let Some(start) = start_line else {
            let Some(snippet) = snippet.filter(|s| !s.trim().is_empty()) else {
                return Ok(None);
            };
            let mut matches = self
                .semantic_find_symbols(project_id, snippet, Some(file_path), 1)
                .await?;
            return Ok(matches.pop().map(|m| EnclosingSymbol::Stored(m.symbol)));
        };
        let end = end_line.unwrap_or(start).max(start);

        let stored = self
            .store
            .symbols_enclosing(project_id, file_path, start, end)
            .await?;
        if let Some(symbol) = innermost(stored, |s| (s.start_line, s.end_line)) {
            return Ok(Some(EnclosingSymbol::Stored(symbol)));
        }

        let Some(draft) = self.parse_enclosing(file_path, start, end).await? else {
            return Ok(None);
        };
        let key = SymbolKey {
            project_id,
            file_path: draft.file_path.clone(),
            name: draft.name.clone(),
            start_line: draft.start_line,
        };
        match self.store.get_by_unique(&key).await? {
            Some(symbol) => Ok(Some(EnclosingSymbol::Stored(symbol))),
            None => Ok(Some(EnclosingSymbol::Parsed(draft))),
        }
    }

    /// Symbols whose indexed chunks are closest to `query`, best first.
    pub async fn semantic_find_symbols(
        &self,
        project_id: ProjectId,
        query: &str,
        file_path: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SymbolMatch>, EngineError> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let file_path = match file_path {
            Some(path) => match normalize_path(path) {
                Some(normalized) => Some(normalized),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let file_path = file_path.as_deref();

        let fetch = match file_path {
            Some(_) => top_k.saturating_mul(self.config.file_filter_overfetch.max(1)),
            None => top_k,
        };
        let vector = self.embedder.embed_query(query).await?;
        let hits = self
            .index
            .query(&symbols_namespace(project_id), &vector, fetch)
            .await?;

        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for hit in hits {
            let Some(symbol_id) = hit.metadata_i64("symbol_id") else {
                continue;
            };
            if !seen.insert(symbol_id) {
                continue;
            }
            let Some(symbol) = self.store.get_symbol(symbol_id).await? else {
                continue;
            };
            if symbol.project_id != project_id {
                continue;
            }
            if file_path.is_some_and(|path| symbol.file_path != path) {
                continue;
            }
            matches.push(SymbolMatch {
                symbol,
                similarity: hit.similarity(),
                metadata: hit.metadata,
            });
        }

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(top_k);
        Ok(matches)
    }

    /// Id of the symbol a snippet belongs to. The line range is tried first;
    /// semantic search within the file is the fallback.
    pub async fn resolve_snippet_to_symbol(
        &self,
        project_id: ProjectId,
        file_path: &str,
        snippet: &str,
        line_range: Option<(usize, usize)>,
    ) -> Result<Option<SymbolId>, EngineError> {
        RESOLUTIONS.inc();

        if let Some((start, end)) = line_range {
            let found = self
                .find_enclosing_symbol(project_id, file_path, Some(start), Some(end), None)
                .await?;
            if let Some(id) = found.as_ref().and_then(EnclosingSymbol::id) {
                debug!("Resolved {}:{}-{} to symbol {}", file_path, start, end, id);
                return Ok(Some(id));
            }
        }

        SEMANTIC_FALLBACKS.inc();
        let matches = self
            .semantic_find_symbols(project_id, snippet, Some(file_path), 1)
            .await?;
        Ok(matches.first().map(|m| m.symbol.id))
    }

    async fn parse_enclosing(
        &self,
        file_path: &str,
        start: usize,
        end: usize,
    ) -> Result<Option<DraftSymbol>, EngineError> {
        let Some(language) = detect_language(file_path) else {
            return Ok(None);
        };
        let Some(content) = self.snapshot.read_file(file_path, None).await? else {
            return Ok(None);
        };

        let drafts = self
            .extractors
            .extract(language, &content, file_path)
            .into_iter()
            .filter(|d| d.encloses(start, end))
            .collect();
        Ok(innermost(drafts, |d| (d.start_line, d.end_line)))
    }
}

/// Narrowest span; among equal spans the one starting last.
fn innermost<T>(candidates: Vec<T>, span: impl Fn(&T) -> (usize, usize)) -> Option<T> {
    candidates.into_iter().min_by_key(|c| {
        let (start, end) = span(c);
        (end.saturating_sub(start), std::cmp::Reverse(start))
    })
}
