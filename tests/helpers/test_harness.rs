use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use refpack::embeddings::{EmbeddingProvider, MockEmbedder};
use refpack::indexer::ExtractorRegistry;
use refpack::indexing::IndexingJob;
use refpack::search::MemoryVectorIndex;
use refpack::storage::{MemoryStore, Store};
use refpack::symbol::{Project, Symbol};
use refpack::vcs::{GitSnapshot, SnapshotProvider};
use refpack::{Config, EngineContext, ReferenceEngine};

pub const CALC_PY: &str = r#"def add(a, b):
    return a + b


def multiply(a, b):
    result = 0
    for _ in range(b):
        result = add(result, a)
    return result


class Calculator:
    def total(self, values):
        return sum(values)


print(add(1, 2), multiply(3, 4))
"#;

/// Temp project directory wired to an in-memory store, a deterministic
/// embedder and an in-memory vector index.
pub struct TestHarness {
    pub temp_dir: TempDir,
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub index: Arc<MemoryVectorIndex>,
    pub engine: ReferenceEngine,
    pub project: Project,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.logging.enabled = false;
    config.embeddings.dimension = 64;
    config.indexer.index_commit_history = false;
    config
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        Self::build(config, |snapshot, _| snapshot, None).await
    }

    /// Harness with a wrapped snapshot provider and an optional embedder.
    pub async fn build<F>(
        config: Config,
        wrap_snapshot: F,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self>
    where
        F: FnOnce(Arc<dyn SnapshotProvider>, Arc<MemoryStore>) -> Arc<dyn SnapshotProvider>,
    {
        Self::assemble(config, wrap_snapshot, embedder, ExtractorRegistry::new()).await
    }

    /// Harness with a custom extractor registry.
    pub async fn with_extractors(config: Config, extractors: ExtractorRegistry) -> Result<Self> {
        Self::assemble(config, |snapshot, _| snapshot, None, extractors).await
    }

    async fn assemble<F>(
        config: Config,
        wrap_snapshot: F,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        extractors: ExtractorRegistry,
    ) -> Result<Self>
    where
        F: FnOnce(Arc<dyn SnapshotProvider>, Arc<MemoryStore>) -> Arc<dyn SnapshotProvider>,
    {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(MemoryStore::new());
        let index = Arc::new(MemoryVectorIndex::new());

        let git: Arc<dyn SnapshotProvider> = Arc::new(GitSnapshot::new(temp_dir.path(), &config.indexer));
        let snapshot = wrap_snapshot(git, store.clone());
        let embedder: Arc<dyn EmbeddingProvider> = match embedder {
            Some(embedder) => embedder,
            None => Arc::new(MockEmbedder::new(config.embeddings.dimension)),
        };

        let context = EngineContext {
            store: store.clone(),
            snapshot,
            embedder,
            index: index.clone(),
            extractors: Arc::new(extractors),
            config: Arc::new(config.clone()),
        };
        let engine = ReferenceEngine::new(context);
        let project = store.create_project("fixture", temp_dir.path()).await?;

        Ok(Self {
            temp_dir,
            config,
            store,
            index,
            engine,
            project,
        })
    }

    pub fn create_test_file(&self, path: &str, content: &str) -> Result<PathBuf> {
        let file_path = self.temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, content)?;
        Ok(file_path)
    }

    pub fn remove_test_file(&self, path: &str) -> Result<()> {
        std::fs::remove_file(self.temp_dir.path().join(path))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Full reindex, waiting for the job to finish.
    pub async fn index_all(&self) -> Result<IndexingJob> {
        let ticket = self
            .engine
            .index_project_symbols(self.project.id, None, None, true)
            .await?;
        Ok(ticket.wait().await?)
    }

    /// Incremental index of `files`, waiting for the job to finish.
    pub async fn index_files(&self, files: &[&str]) -> Result<IndexingJob> {
        let changed = files.iter().map(|f| f.to_string()).collect();
        let ticket = self
            .engine
            .index_project_symbols(self.project.id, Some(changed), None, false)
            .await?;
        Ok(ticket.wait().await?)
    }

    pub async fn symbols(&self) -> Vec<Symbol> {
        self.store
            .symbols_in_project(self.project.id)
            .await
            .expect("store available")
    }

    pub async fn symbol_named(&self, name: &str) -> Option<Symbol> {
        self.symbols().await.into_iter().find(|s| s.name == name)
    }
}
