//! Batch indexing: extraction, symbol upsert, chunk embedding, reference
//! extraction and stale-symbol pruning, with job state tracked in the store.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::errors::{FileError, FileFault, IndexingError, ProcessingStage};
use super::job::{IndexScope, IndexingJob, IndexingStats, JobStatus, LEASE_EXPIRED};
use crate::config::IndexerConfig;
use crate::embeddings::EmbeddingProvider;
use crate::history::CommitHistory;
use crate::indexer::chunker::{chunk_metadata, chunk_vector_id, symbol_chunk};
use crate::indexer::{detect_language, find_usages, self_references, DraftSymbol, ExtractorRegistry};
use crate::metrics::{
    EXTRACTION_ERRORS, FILES_INDEXED, INDEX_LATENCY, JOBS_COMPLETED, JOBS_FAILED, JOBS_STARTED,
    REFERENCES_INDEXED, SYMBOLS_INDEXED,
};
use crate::search::{VectorIndex, VectorRecord};
use crate::storage::{Store, StoreError, StoreResult};
use crate::symbol::{
    symbols_namespace, NewSymbol, Project, ProjectId, Symbol, SymbolChunk, SymbolEmbeddingMetadata,
    SymbolId,
};
use crate::vcs::{normalize_path, SnapshotProvider};

/// A stored chunk waiting for its embedding.
#[derive(Debug, Clone)]
struct PendingChunk {
    symbol: Symbol,
    chunk: SymbolChunk,
}

/// What indexing one file produced.
#[derive(Debug, Default)]
struct FileOutcome {
    symbols: usize,
    references: usize,
    pruned: usize,
    chunks: Vec<PendingChunk>,
}

/// Drives indexing jobs through `Pending -> Processing -> Completed|Failed`.
///
/// Batches run strictly one after another; nothing inside a job runs
/// concurrently.
pub struct IndexingPipeline {
    store: Arc<dyn Store>,
    snapshot: Arc<dyn SnapshotProvider>,
    extractors: Arc<ExtractorRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    history: Arc<CommitHistory>,
    config: IndexerConfig,
    worker_id: String,
}

impl IndexingPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        snapshot: Arc<dyn SnapshotProvider>,
        extractors: Arc<ExtractorRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        history: Arc<CommitHistory>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            snapshot,
            extractors,
            embedder,
            index,
            history,
            config,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }

    /// Lease owner recorded on jobs this pipeline runs.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Persist a new `Pending` job.
    pub async fn create_job(
        &self,
        project_id: ProjectId,
        scope: IndexScope,
        commit_hash: Option<String>,
    ) -> StoreResult<IndexingJob> {
        self.store
            .create_job(IndexingJob::new(project_id, scope, commit_hash))
            .await
    }

    /// Run `job` to a terminal state.
    ///
    /// Any job-level fault marks the job `Failed` with `last_error` and
    /// `finished_at` set, then is returned to the caller.
    pub async fn run(&self, mut job: IndexingJob) -> Result<IndexingJob, IndexingError> {
        let start = Instant::now();
        JOBS_STARTED.inc();
        info!("Starting indexing job {} for project {}", job.id, job.project_id);

        let result = match self.execute(&mut job).await {
            Ok(()) => self.finish(&job).await,
            Err(e) => Err(e),
        };
        INDEX_LATENCY.observe(start.elapsed().as_secs_f64());

        match result {
            Ok(job) => {
                JOBS_COMPLETED.inc();
                info!(
                    "Indexing job {} completed in {:.2}s: {} files, {} symbols, {} references, {} errors",
                    job.id,
                    start.elapsed().as_secs_f64(),
                    job.stats.files_processed,
                    job.stats.symbols_found,
                    job.stats.references_found,
                    job.stats.errors
                );
                Ok(job)
            }
            Err(e) => {
                JOBS_FAILED.inc();
                error!("Indexing job {} failed: {}", job.id, e);
                self.record_failure(&mut job, &e).await;
                Err(e)
            }
        }
    }

    /// Fail every processing job whose lease heartbeat is older than `ttl`.
    pub async fn reap_orphaned_jobs(&self, ttl: chrono::Duration) -> StoreResult<Vec<IndexingJob>> {
        let now = Utc::now();
        let mut reaped = Vec::new();

        for mut job in self.store.jobs_with_status(JobStatus::Processing).await? {
            if !job.is_orphaned(now, ttl) {
                continue;
            }
            if job.fail(LEASE_EXPIRED, now).is_err() {
                continue;
            }
            match self.store.update_job(&job).await {
                Ok(job) => {
                    warn!("Reaped orphaned indexing job {} of project {}", job.id, job.project_id);
                    JOBS_FAILED.inc();
                    reaped.push(job);
                }
                Err(e) if !matches!(e, StoreError::Unavailable(_)) => {
                    debug!("Job {} changed while reaping: {}", job.id, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reaped)
    }

    async fn execute(&self, job: &mut IndexingJob) -> Result<(), IndexingError> {
        let project = self
            .store
            .get_project(job.project_id)
            .await?
            .ok_or(IndexingError::ProjectNotFound(job.project_id))?;

        job.start(&self.worker_id, Utc::now())?;
        *job = self.store.update_job(job).await?;

        let files = self.select_files(&job.scope).await?;
        job.stats = IndexingStats {
            total_files: files.len(),
            ..Default::default()
        };
        info!(
            "Indexing {} files for project {} ({})",
            files.len(),
            project.name,
            if job.scope.is_full() { "full" } else { "incremental" }
        );

        let batch_size = self.config.batch_size.max(1);
        for (n, batch) in files.chunks(batch_size).enumerate() {
            self.process_batch(&project, batch, job.commit_hash.as_deref(), &mut job.stats)
                .await?;

            job.heartbeat(Utc::now());
            *job = self.store.update_job(job).await?;
            debug!(
                "Job {} batch {}: {}/{} files",
                job.id,
                n + 1,
                job.stats.files_processed + job.stats.errors,
                job.stats.total_files
            );
        }

        if job.scope.is_full() && self.config.index_commit_history {
            match self
                .history
                .index_commit_history(project.id, self.config.max_commit_history)
                .await
            {
                Ok(count) => job.stats.commits_indexed = count,
                Err(e) => warn!("Commit history indexing skipped for project {}: {:#}", project.id, e),
            }
        }
        Ok(())
    }

    async fn select_files(&self, scope: &IndexScope) -> Result<Vec<String>, IndexingError> {
        match scope {
            IndexScope::Full => Ok(self.snapshot.list_code_files().await?),
            IndexScope::Changed(files) => {
                let mut seen = HashSet::new();
                Ok(files
                    .iter()
                    .filter_map(|f| {
                        let normalized = normalize_path(f);
                        if normalized.is_none() {
                            warn!("Ignoring changed path {} outside the repository", f);
                        }
                        normalized
                    })
                    .filter(|f| self.snapshot.is_code_file(f))
                    .filter(|f| seen.insert(f.clone()))
                    .collect())
            }
        }
    }

    async fn process_batch(
        &self,
        project: &Project,
        files: &[String],
        commit_hash: Option<&str>,
        stats: &mut IndexingStats,
    ) -> Result<(), IndexingError> {
        let mut pending = Vec::new();

        for path in files {
            match self.index_file(project.id, path, commit_hash).await {
                Ok(outcome) => {
                    stats.files_processed += 1;
                    stats.symbols_found += outcome.symbols;
                    stats.references_found += outcome.references;
                    stats.symbols_pruned += outcome.pruned;
                    FILES_INDEXED.inc();
                    SYMBOLS_INDEXED.inc_by(outcome.symbols as f64);
                    REFERENCES_INDEXED.inc_by(outcome.references as f64);
                    pending.extend(outcome.chunks);
                }
                Err(FileFault::Isolated(err)) => {
                    stats.errors += 1;
                    EXTRACTION_ERRORS.inc();
                    warn!("Skipping {}", err);
                }
                Err(FileFault::Fatal(err)) => return Err(err),
            }
        }

        self.embed_chunks(project.id, pending).await
    }

    async fn index_file(
        &self,
        project_id: ProjectId,
        path: &str,
        commit_hash: Option<&str>,
    ) -> Result<FileOutcome, FileFault> {
        let content = match self.snapshot.read_file(path, None).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("{} no longer exists; pruning its symbols", path);
                let pruned = self.prune_stale(project_id, path, &HashSet::new()).await?;
                return Ok(FileOutcome {
                    pruned,
                    ..Default::default()
                });
            }
            Err(e) => {
                return Err(FileFault::Isolated(FileError {
                    path: path.to_string(),
                    error: format!("{:#}", e),
                    stage: ProcessingStage::FileRead,
                }))
            }
        };

        let Some(language) = detect_language(path) else {
            return Ok(FileOutcome::default());
        };
        let drafts = self
            .extractors
            .try_extract(language, &content, path)
            .map_err(|e| FileFault::from_extraction(path, e))?;

        let headers: HashSet<usize> = drafts.iter().map(|d| d.start_line).collect();
        let mut outcome = FileOutcome::default();
        let mut kept: HashSet<SymbolId> = HashSet::new();

        for draft in unique_drafts(drafts) {
            let usages = find_usages(&draft.name, &content, &headers);
            let mut new = NewSymbol::from_draft(project_id, &draft, commit_hash);
            new.usage_count = usages.len() as u64;

            let symbol = self
                .upsert_symbol(new)
                .await
                .map_err(|e| FileFault::from_store(path, e))?;
            kept.insert(symbol.id);
            outcome.symbols += 1;

            let chunk = self
                .store
                .upsert_chunk(symbol_chunk(symbol.id, &draft))
                .await
                .map_err(|e| FileFault::from_store(path, e))?;

            let references = self
                .store
                .replace_references(symbol.id, self_references(symbol.id, path, &usages))
                .await
                .map_err(|e| FileFault::from_store(path, e))?;
            outcome.references += references.len();

            outcome.chunks.push(PendingChunk { symbol, chunk });
        }

        outcome.pruned = self.prune_stale(project_id, path, &kept).await?;
        debug!(
            "{}: {} symbols, {} references, {} pruned",
            path, outcome.symbols, outcome.references, outcome.pruned
        );
        Ok(outcome)
    }

    /// Update the row with the same unique key in place, or insert.
    async fn upsert_symbol(&self, new: NewSymbol) -> StoreResult<Symbol> {
        if let Some(existing) = self.store.get_by_unique(&new.key()).await? {
            if let Some(updated) = self.store.update_symbol(existing.id, new.clone()).await? {
                return Ok(updated);
            }
        }
        self.store.create_symbol(new).await
    }

    /// Remove symbols of `path` not in `kept`, with their vectors.
    async fn prune_stale(
        &self,
        project_id: ProjectId,
        path: &str,
        kept: &HashSet<SymbolId>,
    ) -> Result<usize, FileFault> {
        let stale: Vec<Symbol> = self
            .store
            .symbols_in_file(project_id, path)
            .await
            .map_err(|e| FileFault::from_store(path, e))?
            .into_iter()
            .filter(|s| !kept.contains(&s.id))
            .collect();

        let mut vectors: HashMap<String, Vec<String>> = HashMap::new();
        for symbol in &stale {
            let metadata = self
                .store
                .embedding_metadata(symbol.id)
                .await
                .map_err(|e| FileFault::from_store(path, e))?;
            for meta in metadata {
                vectors.entry(meta.namespace).or_default().push(meta.external_vector_id);
            }
            self.store
                .remove_symbol(symbol.id)
                .await
                .map_err(|e| FileFault::from_store(path, e))?;
        }

        for (namespace, ids) in vectors {
            self.index
                .delete(&namespace, &ids)
                .await
                .map_err(|e| FileFault::Fatal(e.into()))?;
        }
        Ok(stale.len())
    }

    /// Embed chunks in provider-sized batches and record where each vector went.
    async fn embed_chunks(&self, project_id: ProjectId, pending: Vec<PendingChunk>) -> Result<(), IndexingError> {
        if pending.is_empty() {
            return Ok(());
        }

        let namespace = symbols_namespace(project_id);
        let batch_size = self.embedder.max_batch_size().max(1);
        for batch in pending.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|p| p.chunk.content.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(anyhow::anyhow!(
                    "embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )
                .into());
            }

            let dim = vectors.first().map_or(0, Vec::len);
            let records = batch
                .iter()
                .zip(vectors)
                .map(|(p, vector)| VectorRecord {
                    id: chunk_vector_id(p.chunk.id),
                    vector,
                    metadata: chunk_metadata(&p.symbol, p.chunk.id),
                })
                .collect();
            self.index.upsert(&namespace, records).await?;

            let now = Utc::now();
            for p in batch {
                let vector_id = chunk_vector_id(p.chunk.id);
                self.store.attach_chunk_vector(p.chunk.id, &vector_id).await?;
                self.store
                    .upsert_embedding_metadata(SymbolEmbeddingMetadata {
                        symbol_id: p.symbol.id,
                        external_vector_id: vector_id,
                        namespace: namespace.clone(),
                        dim,
                        last_upserted_at: now,
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn finish(&self, job: &IndexingJob) -> Result<IndexingJob, IndexingError> {
        let mut done = job.clone();
        done.complete(Utc::now())?;
        Ok(self.store.update_job(&done).await?)
    }

    async fn record_failure(&self, job: &mut IndexingJob, err: &IndexingError) {
        if let Err(e) = job.fail(err.to_string(), Utc::now()) {
            warn!("Job {} not marked failed: {}", job.id, e);
            return;
        }
        match self.store.update_job(job).await {
            Ok(saved) => *job = saved,
            Err(e) => warn!("Could not persist failure of job {}: {}", job.id, e),
        }
    }
}

/// Drafts with distinct unique keys, first occurrence wins.
fn unique_drafts(drafts: Vec<DraftSymbol>) -> Vec<DraftSymbol> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter(|d| seen.insert((d.name.clone(), d.start_line)))
        .collect()
}
