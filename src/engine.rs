//! Component wiring and the operations exposed to callers.
//!
//! [`EngineContext`] carries the shared handles; [`ReferenceEngine`] builds
//! every component from it exactly once.

use anyhow::Context as _;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::graph::{ReferenceEntry, ReferenceGraph};
use crate::history::CommitHistory;
use crate::indexer::ExtractorRegistry;
use crate::indexing::{IndexScope, IndexingError, IndexingJob, IndexingPipeline, JobId};
use crate::pack::{ReferencePack, ReferencePackBuilder};
use crate::ranking::RankingEngine;
use crate::search::{MemoryVectorIndex, VectorIndex};
use crate::storage::{MemoryStore, Store, StoreError};
use crate::symbol::{EnclosingSymbol, ProjectId, SymbolId, SymbolMatch, SymbolResolver};
use crate::vcs::{GitSnapshot, SnapshotProvider};

/// Failure on a read path. Absent rows are not errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("external service failure: {0:#}")]
    ExternalService(#[from] anyhow::Error),
}

/// Shared handles every component is built from.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn Store>,
    pub snapshot: Arc<dyn SnapshotProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub extractors: Arc<ExtractorRegistry>,
    pub config: Arc<Config>,
}

impl EngineContext {
    /// In-process store and vector index over a local checkout.
    pub fn local(root: &Path, config: Config) -> anyhow::Result<Self> {
        let embedder = create_provider(&config.embeddings).context("Failed to initialize embedder")?;
        Ok(Self {
            store: Arc::new(MemoryStore::new()),
            snapshot: Arc::new(GitSnapshot::new(root, &config.indexer)),
            embedder,
            index: Arc::new(MemoryVectorIndex::new()),
            extractors: Arc::new(ExtractorRegistry::new()),
            config: Arc::new(config),
        })
    }
}

/// A started indexing job.
pub struct IndexingTicket {
    pub job_id: JobId,
    pub handle: JoinHandle<Result<IndexingJob, IndexingError>>,
}

impl IndexingTicket {
    /// Wait for the job to reach a terminal state.
    pub async fn wait(self) -> Result<IndexingJob, IndexingError> {
        self.handle
            .await
            .map_err(|e| IndexingError::ExternalService(anyhow::Error::new(e).context("indexing task aborted")))?
    }
}

pub struct ReferenceEngine {
    context: EngineContext,
    pipeline: Arc<IndexingPipeline>,
    graph: Arc<ReferenceGraph>,
    resolver: SymbolResolver,
    packs: ReferencePackBuilder,
}

impl ReferenceEngine {
    pub fn new(context: EngineContext) -> Self {
        let config = context.config.clone();
        let history = Arc::new(CommitHistory::new(
            context.snapshot.clone(),
            context.embedder.clone(),
            context.index.clone(),
        ));
        let graph = Arc::new(ReferenceGraph::new(context.store.clone()));

        let pipeline = Arc::new(IndexingPipeline::new(
            context.store.clone(),
            context.snapshot.clone(),
            context.extractors.clone(),
            context.embedder.clone(),
            context.index.clone(),
            history.clone(),
            config.indexer.clone(),
        ));
        let resolver = SymbolResolver::new(
            context.store.clone(),
            context.snapshot.clone(),
            context.extractors.clone(),
            context.embedder.clone(),
            context.index.clone(),
            config.resolver.clone(),
        );
        let packs = ReferencePackBuilder::new(
            context.store.clone(),
            context.snapshot.clone(),
            context.embedder.clone(),
            graph.clone(),
            history,
            RankingEngine::new(config.ranking.clone()),
            config.pack.clone(),
        );

        Self {
            context,
            pipeline,
            graph,
            resolver,
            packs,
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.context.store
    }

    /// Create a `Pending` job and run it in the background.
    ///
    /// Returns as soon as the job row exists. A full reindex runs when
    /// `force_full_reindex` is set or no changed files are given.
    pub async fn index_project_symbols(
        &self,
        project_id: ProjectId,
        changed_files: Option<Vec<String>>,
        commit_hash: Option<String>,
        force_full_reindex: bool,
    ) -> Result<IndexingTicket, EngineError> {
        let scope = IndexScope::from_request(changed_files, force_full_reindex);
        let job = self.pipeline.create_job(project_id, scope, commit_hash).await?;
        let job_id = job.id;
        info!("Queued indexing job {} for project {}", job_id, project_id);

        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn(async move { pipeline.run(job).await });
        Ok(IndexingTicket { job_id, handle })
    }

    pub async fn get_symbol_references(
        &self,
        symbol_id: SymbolId,
        max_depth: usize,
        max_references: usize,
    ) -> Result<Vec<ReferenceEntry>, EngineError> {
        Ok(self
            .graph
            .get_symbol_references(symbol_id, max_depth, max_references)
            .await?)
    }

    pub async fn find_enclosing_symbol(
        &self,
        project_id: ProjectId,
        file_path: &str,
        start_line: Option<usize>,
        end_line: Option<usize>,
        snippet: Option<&str>,
    ) -> Result<Option<EnclosingSymbol>, EngineError> {
        self.resolver
            .find_enclosing_symbol(project_id, file_path, start_line, end_line, snippet)
            .await
    }

    pub async fn semantic_find_symbols(
        &self,
        project_id: ProjectId,
        query: &str,
        file_path: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SymbolMatch>, EngineError> {
        self.resolver
            .semantic_find_symbols(project_id, query, file_path, top_k)
            .await
    }

    pub async fn resolve_snippet_to_symbol(
        &self,
        project_id: ProjectId,
        file_path: &str,
        snippet: &str,
        line_range: Option<(usize, usize)>,
    ) -> Result<Option<SymbolId>, EngineError> {
        self.resolver
            .resolve_snippet_to_symbol(project_id, file_path, snippet, line_range)
            .await
    }

    pub async fn build_reference_pack(
        &self,
        symbol_id: SymbolId,
        token_budget: usize,
        ranking_params: Option<&HashMap<String, f64>>,
    ) -> Result<Option<ReferencePack>, EngineError> {
        self.packs
            .build_reference_pack(symbol_id, token_budget, ranking_params)
            .await
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Option<IndexingJob>, EngineError> {
        Ok(self.context.store.get_job(job_id).await?)
    }

    /// Fail processing jobs whose lease outlived `jobs.lease_ttl_secs`.
    pub async fn reap_orphaned_jobs(&self) -> Result<Vec<IndexingJob>, EngineError> {
        let ttl = chrono::Duration::seconds(self.context.config.jobs.lease_ttl_secs as i64);
        Ok(self.pipeline.reap_orphaned_jobs(ttl).await?)
    }
}
