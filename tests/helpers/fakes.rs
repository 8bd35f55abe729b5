use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tree_sitter::Tree;

use refpack::embeddings::EmbeddingProvider;
use refpack::indexer::extractors::{Declaration, LanguageExtractor, PythonExtractor};
use refpack::storage::MemoryStore;
use refpack::vcs::{CommitInfo, SnapshotProvider};

/// Embedder whose every call fails, like an unreachable service.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service unreachable")
    }

    async fn embed_query(&self, _query: &str) -> Result<Vec<f32>> {
        bail!("embedding service unreachable")
    }

    fn embedding_dimension(&self) -> usize {
        64
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }

    fn max_batch_size(&self) -> usize {
        8
    }
}

/// Snapshot that takes the store down when `trip_on` is read.
pub struct TrippingSnapshot {
    pub inner: Arc<dyn SnapshotProvider>,
    pub store: Arc<MemoryStore>,
    pub trip_on: String,
}

#[async_trait]
impl SnapshotProvider for TrippingSnapshot {
    async fn list_code_files(&self) -> Result<Vec<String>> {
        self.inner.list_code_files().await
    }

    fn is_code_file(&self, path: &str) -> bool {
        self.inner.is_code_file(path)
    }

    async fn read_file(&self, path: &str, revision: Option<&str>) -> Result<Option<String>> {
        if path == self.trip_on {
            self.store.set_unavailable(Some("disk detached")).await;
        }
        self.inner.read_file(path, revision).await
    }

    async fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_modified(path).await
    }

    async fn commit_history(&self, limit: usize) -> Result<Vec<CommitInfo>> {
        self.inner.commit_history(limit).await
    }
}

/// Python extractor that fails on any source containing `marker`.
pub struct RefusingExtractor {
    pub marker: &'static str,
}

impl LanguageExtractor for RefusingExtractor {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn extract(&self, tree: &Tree, source: &[u8]) -> Result<Vec<Declaration>> {
        if String::from_utf8_lossy(source).contains(self.marker) {
            bail!("cannot walk this tree");
        }
        PythonExtractor.extract(tree, source)
    }
}
