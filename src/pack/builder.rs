use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Definition, PackedFix, PackedReference, ReferencePack};
use crate::config::{PackConfig, PackSelection};
use crate::embeddings::EmbeddingProvider;
use crate::engine::EngineError;
use crate::graph::{ReferenceEntry, ReferenceGraph};
use crate::history::{CommitHistory, HistoricalFix};
use crate::indexer::estimate_tokens;
use crate::metrics::{PACKS_BUILT, PACK_TOKENS};
use crate::ranking::{is_test_path, RankingEngine, RankingFeatures, Scored};
use crate::storage::Store;
use crate::symbol::{ReferenceType, Symbol, SymbolId};
use crate::vcs::SnapshotProvider;

/// Something that may be admitted after the definition.
enum Candidate {
    Reference(PackedReference),
    Fix(HistoricalFix),
}

impl Candidate {
    fn content(&self) -> &str {
        match self {
            Candidate::Reference(r) => &r.content,
            Candidate::Fix(f) => &f.message,
        }
    }
}

pub struct ReferencePackBuilder {
    store: Arc<dyn Store>,
    snapshot: Arc<dyn SnapshotProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    graph: Arc<ReferenceGraph>,
    history: Arc<CommitHistory>,
    ranking: RankingEngine,
    config: PackConfig,
}

impl ReferencePackBuilder {
    pub fn new(
        store: Arc<dyn Store>,
        snapshot: Arc<dyn SnapshotProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        graph: Arc<ReferenceGraph>,
        history: Arc<CommitHistory>,
        ranking: RankingEngine,
        config: PackConfig,
    ) -> Self {
        Self {
            store,
            snapshot,
            embedder,
            graph,
            history,
            ranking,
            config,
        }
    }

    /// Build a pack for `symbol_id`, or `None` if the symbol is unknown.
    ///
    /// The definition is always included, even when it alone exceeds
    /// `token_budget`. Candidates are then offered in the configured order
    /// and admitted while the running total stays within the budget; one that
    /// does not fit is skipped and the next is tried.
    pub async fn build_reference_pack(
        &self,
        symbol_id: SymbolId,
        token_budget: usize,
        ranking_params: Option<&HashMap<String, f64>>,
    ) -> Result<Option<ReferencePack>, EngineError> {
        let Some(symbol) = self.store.get_symbol(symbol_id).await? else {
            return Ok(None);
        };

        let mut files = FileCache::default();
        let definition = self.definition(&symbol, &mut files).await?;

        let entries = self
            .graph
            .get_symbol_references(symbol.id, self.config.reference_depth, self.config.max_references)
            .await?;
        let fixes = self.historical_fixes(&symbol).await;

        let mut candidates = Vec::with_capacity(entries.len() + fixes.len());
        for entry in &entries {
            let content = files
                .context(&*self.snapshot, &entry.reference.file_path, entry.reference.line, self.config.context_radius)
                .await?;
            candidates.push(Candidate::Reference(packed_reference(entry, content)));
        }
        candidates.extend(fixes.into_iter().map(Candidate::Fix));

        let ranking = self.ranking.with_params(ranking_params);
        let features = self.features(&entries, &candidates).await?;
        let query = self.embed_query(&definition.content).await;
        let scored: Vec<Scored<Candidate>> = match self.config.selection {
            PackSelection::Traversal => {
                let now = chrono::Utc::now();
                candidates
                    .into_iter()
                    .zip(features)
                    .map(|(item, features)| {
                        let factors = ranking.factors(query.as_deref(), &features, now);
                        Scored {
                            item,
                            score: ranking.composite(&factors),
                            factors,
                        }
                    })
                    .collect()
            }
            PackSelection::Ranked => {
                ranking.rank(query.as_deref(), candidates.into_iter().zip(features).collect())
            }
        };

        let offered = scored.len();
        let mut pack = ReferencePack {
            token_count: definition.token_count,
            symbol,
            definition,
            references: Vec::new(),
            callers: Vec::new(),
            callees: Vec::new(),
            imports: Vec::new(),
            tests: Vec::new(),
            historical_fixes: Vec::new(),
            reasoning: String::new(),
        };

        let mut skipped = 0;
        for Scored { item, score, .. } in scored {
            let content = item.content();
            if content.trim().is_empty() {
                continue;
            }
            let tokens = estimate_tokens(content);
            if pack.token_count + tokens > token_budget {
                skipped += 1;
                continue;
            }
            pack.token_count += tokens;
            admit(&mut pack, item, tokens, score);
        }

        pack.reasoning = reasoning(&pack, offered, skipped, token_budget, &self.config);
        PACKS_BUILT.inc();
        PACK_TOKENS.observe(pack.token_count as f64);
        info!(
            "Built reference pack for {} ({}): {} references, {} fixes, {} tokens",
            pack.symbol.name,
            pack.symbol.id,
            pack.reference_count(),
            pack.historical_fixes.len(),
            pack.token_count
        );
        Ok(Some(pack))
    }

    async fn definition(&self, symbol: &Symbol, files: &mut FileCache) -> Result<Definition, EngineError> {
        let content = match files.lines(&*self.snapshot, &symbol.file_path).await? {
            Some(lines) => {
                let from = symbol.start_line.saturating_sub(1).min(lines.len());
                let to = symbol.end_line.min(lines.len()).max(from);
                lines[from..to].join("\n")
            }
            None => {
                warn!("Definition file {} is missing", symbol.file_path);
                String::new()
            }
        };

        Ok(Definition {
            token_count: estimate_tokens(&content),
            content,
            file_path: symbol.file_path.clone(),
            start_line: symbol.start_line,
            end_line: symbol.end_line,
        })
    }

    async fn historical_fixes(&self, symbol: &Symbol) -> Vec<HistoricalFix> {
        match self
            .history
            .find_historical_fixes(symbol.project_id, &symbol.name, self.config.historical_fix_limit)
            .await
        {
            Ok(fixes) => fixes,
            Err(e) => {
                warn!("Historical fix lookup failed for {}: {:#}", symbol.name, e);
                Vec::new()
            }
        }
    }

    /// Ranking inputs for each candidate, in candidate order.
    async fn features(
        &self,
        entries: &[ReferenceEntry],
        candidates: &[Candidate],
    ) -> Result<Vec<RankingFeatures>, EngineError> {
        let texts: Vec<String> = candidates.iter().map(|c| c.content().to_string()).collect();
        let mut embeddings = self.embed_all(&texts).await.into_iter();

        let mut modified = HashMap::new();
        let mut features = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            let embedding = embeddings.next().flatten();
            let f = match candidate {
                Candidate::Reference(reference) => {
                    let path = reference.file_path.clone();
                    let last_modified = match modified.get(&path) {
                        Some(at) => *at,
                        None => {
                            let at = self.snapshot.last_modified(&path).await?;
                            modified.insert(path.clone(), at);
                            at
                        }
                    };
                    RankingFeatures {
                        embedding,
                        call_distance: Some(entries[i].depth as u32 + 1),
                        last_modified,
                        usage_count: entries[i].symbol.as_ref().map_or(0, |s| s.usage_count),
                        file_path: path,
                    }
                }
                Candidate::Fix(_) => RankingFeatures {
                    embedding,
                    ..Default::default()
                },
            };
            features.push(f);
        }
        Ok(features)
    }

    /// Embeddings for `texts`, `None` where unavailable. Failures only cost
    /// the semantic factor.
    async fn embed_all(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        let batch_size = self.embedder.max_batch_size().max(1);
        for batch in texts.chunks(batch_size) {
            match self.embedder.embed(batch).await {
                Ok(vectors) if vectors.len() == batch.len() => out.extend(vectors.into_iter().map(Some)),
                Ok(_) | Err(_) => {
                    debug!("Candidate embedding unavailable; using neutral similarity");
                    out.extend(batch.iter().map(|_| None));
                }
            }
        }
        out
    }

    async fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }
        match self.embedder.embed_query(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                debug!("Query embedding unavailable: {:#}", e);
                None
            }
        }
    }
}

/// Live file contents, read at most once per pack.
#[derive(Default)]
struct FileCache {
    files: HashMap<String, Option<Vec<String>>>,
}

impl FileCache {
    async fn lines(
        &mut self,
        snapshot: &dyn SnapshotProvider,
        path: &str,
    ) -> Result<Option<&[String]>, EngineError> {
        if !self.files.contains_key(path) {
            let lines = snapshot
                .read_file(path, None)
                .await?
                .map(|content| content.lines().map(str::to_string).collect());
            self.files.insert(path.to_string(), lines);
        }
        Ok(self.files.get(path).and_then(|l| l.as_deref()))
    }

    /// Lines `line - radius ..= line + radius` of `path`, clipped to the file.
    async fn context(
        &mut self,
        snapshot: &dyn SnapshotProvider,
        path: &str,
        line: usize,
        radius: usize,
    ) -> Result<String, EngineError> {
        let Some(lines) = self.lines(snapshot, path).await? else {
            return Ok(String::new());
        };
        let from = line.saturating_sub(radius).max(1) - 1;
        let to = line.saturating_add(radius).min(lines.len());
        if from >= to {
            return Ok(String::new());
        }
        Ok(lines[from..to].join("\n"))
    }
}

fn packed_reference(entry: &ReferenceEntry, content: String) -> PackedReference {
    PackedReference {
        token_count: estimate_tokens(&content),
        content,
        reference_type: entry.reference.reference_type,
        file_path: entry.reference.file_path.clone(),
        line: entry.reference.line,
        depth: entry.depth,
        symbol_id: entry.symbol.as_ref().map(|s| s.id),
        symbol_name: entry.symbol.as_ref().map(|s| s.name.clone()),
        score: 0.0,
    }
}

fn admit(pack: &mut ReferencePack, candidate: Candidate, tokens: usize, score: f64) {
    let reference = match candidate {
        Candidate::Fix(fix) => {
            pack.historical_fixes.push(PackedFix {
                fix,
                token_count: tokens,
                score,
            });
            return;
        }
        Candidate::Reference(reference) => PackedReference { score, ..reference },
    };

    let anchor = pack.symbol.id;
    let into_anchor = reference.symbol_id == Some(anchor) && reference.depth > 0;
    let bucket = match reference.reference_type {
        ReferenceType::Import => &mut pack.imports,
        ReferenceType::Call if into_anchor => &mut pack.callers,
        ReferenceType::Call => &mut pack.callees,
        _ if is_test_path(&reference.file_path) => &mut pack.tests,
        _ if into_anchor => &mut pack.callers,
        _ => &mut pack.references,
    };
    bucket.push(reference);
}

fn reasoning(
    pack: &ReferencePack,
    offered: usize,
    skipped: usize,
    token_budget: usize,
    config: &PackConfig,
) -> String {
    let admitted = pack.reference_count() + pack.historical_fixes.len();
    let order = match config.selection {
        PackSelection::Traversal => "reference graph traversal order",
        PackSelection::Ranked => "descending ranking score",
    };
    let mut text = format!(
        "Included the definition of {} first ({} tokens). Offered {} candidates from a depth-{} reference traversal and historical fixes in {}; admitted {} within the {}-token budget",
        pack.symbol.name,
        pack.definition.token_count,
        offered,
        config.reference_depth,
        order,
        admitted,
        token_budget,
    );
    if skipped > 0 {
        text.push_str(&format!(", skipped {} that would exceed it", skipped));
    }
    if pack.definition.token_count > token_budget {
        text.push_str(". The definition alone exceeds the budget");
    }
    text.push('.');
    text
}
