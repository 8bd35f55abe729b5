//! Persistence seam for projects, symbols, chunks, references, embedding
//! back-references and indexing jobs.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::indexing::{IndexingJob, JobId, JobStatus};
use crate::symbol::{
    ChunkId, NewReference, NewSymbol, NewSymbolChunk, Project, ProjectId, Reference, Symbol,
    SymbolChunk, SymbolEmbeddingMetadata, SymbolId, SymbolKey,
};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot serve requests; fails the whole job.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A single record was refused; counted against the file being indexed.
    #[error("store rejected record: {0}")]
    Rejected(String),

    /// Optimistic version check on a job row failed.
    #[error("job {job_id} is stale: expected version {expected}, store has {found}")]
    StaleJob {
        job_id: Uuid,
        expected: u64,
        found: u64,
    },
}

impl StoreError {
    /// Whether the fault is confined to one record rather than the store.
    pub fn is_per_record(&self) -> bool {
        matches!(self, StoreError::Rejected(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row counts, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub symbols: usize,
    pub chunks: usize,
    pub references: usize,
    pub embeddings: usize,
    pub jobs: usize,
}

/// Storage operations the engine consumes.
///
/// Lookups return `None`/empty when a row is absent; errors are reserved for
/// store faults.
#[async_trait]
pub trait Store: Send + Sync {
    // Projects

    async fn create_project(&self, name: &str, root: &std::path::Path) -> StoreResult<Project>;

    async fn get_project(&self, id: ProjectId) -> StoreResult<Option<Project>>;

    // Symbols

    async fn get_symbol(&self, id: SymbolId) -> StoreResult<Option<Symbol>>;

    /// Symbols for the ids that exist, in the order requested.
    async fn get_symbols(&self, ids: &[SymbolId]) -> StoreResult<Vec<Symbol>>;

    async fn create_symbol(&self, symbol: NewSymbol) -> StoreResult<Symbol>;

    /// Overwrite a symbol's fields, keeping its id and `created_at`.
    async fn update_symbol(&self, id: SymbolId, symbol: NewSymbol) -> StoreResult<Option<Symbol>>;

    /// Delete a symbol with its chunks, outgoing references and embedding rows.
    async fn remove_symbol(&self, id: SymbolId) -> StoreResult<bool>;

    async fn get_by_unique(&self, key: &SymbolKey) -> StoreResult<Option<Symbol>>;

    async fn symbols_in_file(&self, project: ProjectId, file_path: &str) -> StoreResult<Vec<Symbol>>;

    async fn symbols_in_project(&self, project: ProjectId) -> StoreResult<Vec<Symbol>>;

    /// Symbols of `file_path` whose span contains `start..=end`.
    async fn symbols_enclosing(
        &self,
        project: ProjectId,
        file_path: &str,
        start: usize,
        end: usize,
    ) -> StoreResult<Vec<Symbol>>;

    // Chunks

    /// Insert or replace the chunk keyed by `(symbol_id, chunk_index)`.
    async fn upsert_chunk(&self, chunk: NewSymbolChunk) -> StoreResult<SymbolChunk>;

    async fn get_chunk(&self, id: ChunkId) -> StoreResult<Option<SymbolChunk>>;

    async fn chunks_for_symbol(&self, symbol_id: SymbolId) -> StoreResult<Vec<SymbolChunk>>;

    async fn attach_chunk_vector(&self, chunk_id: ChunkId, vector_id: &str) -> StoreResult<()>;

    // Embedding back-references

    /// Insert or replace the row keyed by `(symbol_id, external_vector_id)`.
    async fn upsert_embedding_metadata(&self, meta: SymbolEmbeddingMetadata) -> StoreResult<()>;

    async fn embedding_metadata(&self, symbol_id: SymbolId) -> StoreResult<Vec<SymbolEmbeddingMetadata>>;

    // References

    /// Replace every outgoing reference of `from` with `references`.
    async fn replace_references(
        &self,
        from: SymbolId,
        references: Vec<NewReference>,
    ) -> StoreResult<Vec<Reference>>;

    /// Outgoing references of a symbol, ordered by line then id.
    async fn references_from(&self, symbol_id: SymbolId) -> StoreResult<Vec<Reference>>;

    // Jobs

    async fn create_job(&self, job: IndexingJob) -> StoreResult<IndexingJob>;

    /// Persist `job` if its version matches the stored row; returns the row
    /// with the version bumped.
    async fn update_job(&self, job: &IndexingJob) -> StoreResult<IndexingJob>;

    async fn get_job(&self, id: JobId) -> StoreResult<Option<IndexingJob>>;

    async fn jobs_for_project(&self, project: ProjectId) -> StoreResult<Vec<IndexingJob>>;

    async fn jobs_with_status(&self, status: JobStatus) -> StoreResult<Vec<IndexingJob>>;

    async fn counts(&self, project: ProjectId) -> StoreResult<StoreCounts>;
}
