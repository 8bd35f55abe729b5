//! Commit history embedding and historical-fix lookup.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embeddings::EmbeddingProvider;
use crate::indexer::split_on_lines;
use crate::search::{VectorIndex, VectorRecord};
use crate::symbol::{commits_namespace, Metadata, ProjectId};
use crate::vcs::{CommitInfo, SnapshotProvider};

/// Commit text longer than this is split on line boundaries before embedding.
const MAX_COMMIT_TEXT: usize = 1000;

const FIX_KEYWORDS: [&str; 4] = ["fix", "error", "bug", "issue"];

/// A prior commit that looks like a fix involving a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalFix {
    pub commit_hash: String,
    pub message: String,
    pub similarity: f32,
}

/// Embeds commits into a project's commit namespace and searches them.
pub struct CommitHistory {
    snapshot: Arc<dyn SnapshotProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl CommitHistory {
    pub fn new(
        snapshot: Arc<dyn SnapshotProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            snapshot,
            embedder,
            index,
        }
    }

    /// Embed up to `limit` recent commits. Returns the number of commits indexed.
    pub async fn index_commit_history(&self, project_id: ProjectId, limit: usize) -> Result<usize> {
        let commits = self
            .snapshot
            .commit_history(limit)
            .await
            .context("Failed to read commit history")?;
        if commits.is_empty() {
            debug!("No commits to index for project {}", project_id);
            return Ok(0);
        }

        let mut texts = Vec::new();
        let mut metadata = Vec::new();
        let mut ids = Vec::new();
        for commit in &commits {
            let pieces = split_on_lines(&commit_text(commit), MAX_COMMIT_TEXT);
            let part_count = pieces.len();
            for (part, text) in pieces.into_iter().enumerate() {
                ids.push(format!("commit-{}-{}", commit.hash, part));
                metadata.push(commit_metadata(commit, part, part_count, &text));
                texts.push(text);
            }
        }

        let namespace = commits_namespace(project_id);
        let batch_size = self.embedder.max_batch_size().max(1);
        let mut offset = 0;
        for batch in texts.chunks(batch_size) {
            let vectors = self
                .embedder
                .embed(batch)
                .await
                .context("Failed to embed commit history")?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedder returned {} vectors for {} commit texts",
                    vectors.len(),
                    batch.len()
                );
            }

            let records: Vec<VectorRecord> = vectors
                .into_iter()
                .enumerate()
                .map(|(i, vector)| VectorRecord {
                    id: ids[offset + i].clone(),
                    vector,
                    metadata: metadata[offset + i].clone(),
                })
                .collect();
            offset += batch.len();

            self.index
                .upsert(&namespace, records)
                .await
                .context("Failed to store commit embeddings")?;
        }

        info!(
            "Indexed {} commits ({} pieces) for project {}",
            commits.len(),
            texts.len(),
            project_id
        );
        Ok(commits.len())
    }

    /// Commits whose text mentions a fix keyword, closest to
    /// `fix <symbol_name> error bug` first.
    pub async fn find_historical_fixes(
        &self,
        project_id: ProjectId,
        symbol_name: &str,
        limit: usize,
    ) -> Result<Vec<HistoricalFix>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = format!("fix {} error bug", symbol_name);
        let vector = self.embedder.embed_query(&query).await?;
        let hits = self
            .index
            .query(&commits_namespace(project_id), &vector, limit)
            .await?;

        let mut fixes: Vec<HistoricalFix> = Vec::new();
        for hit in hits {
            let text = hit.metadata_str("text").unwrap_or_default().to_lowercase();
            if !FIX_KEYWORDS.iter().any(|k| text.contains(k)) {
                continue;
            }
            let Some(hash) = hit.metadata_str("commit_hash") else {
                continue;
            };
            // Split commits match once per piece; keep the best.
            if fixes.iter().any(|f| f.commit_hash == hash) {
                continue;
            }
            fixes.push(HistoricalFix {
                commit_hash: hash.to_string(),
                message: hit.metadata_str("message").unwrap_or_default().to_string(),
                similarity: hit.similarity(),
            });
        }
        Ok(fixes)
    }
}

fn commit_text(commit: &CommitInfo) -> String {
    format!(
        "Commit: {}\nAuthor: {} <{}>\nMessage: {}\nFiles: {}",
        commit.hash,
        commit.author,
        commit.email,
        commit.message,
        commit.files_changed.join(", ")
    )
}

fn commit_metadata(commit: &CommitInfo, part: usize, part_count: usize, text: &str) -> Metadata {
    let value = json!({
        "commit_hash": commit.hash,
        "author": commit.author,
        "date": commit.date,
        "message": commit.message,
        "files_changed": commit.files_changed,
        "part": part,
        "part_count": part_count,
        "text": text,
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}
