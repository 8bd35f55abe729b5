use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;

use super::{Store, StoreCounts, StoreError, StoreResult};
use crate::indexing::{IndexingJob, JobId, JobStatus};
use crate::symbol::{
    ChunkId, NewReference, NewSymbol, NewSymbolChunk, Project, ProjectId, Reference, ReferenceId,
    Symbol, SymbolChunk, SymbolEmbeddingMetadata, SymbolId, SymbolKey,
};

#[derive(Default)]
struct Tables {
    projects: BTreeMap<ProjectId, Project>,
    symbols: BTreeMap<SymbolId, Symbol>,
    unique: HashMap<SymbolKey, SymbolId>,
    chunks: BTreeMap<ChunkId, SymbolChunk>,
    chunk_keys: HashMap<(SymbolId, usize), ChunkId>,
    embeddings: BTreeMap<(SymbolId, String), SymbolEmbeddingMetadata>,
    references: BTreeMap<ReferenceId, Reference>,
    jobs: HashMap<JobId, IndexingJob>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process [`Store`] backed by ordered maps behind a tokio `RwLock`.
///
/// Supports fault injection so callers can exercise store failure handling.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: RwLock<Option<String>>,
    rejected_files: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub async fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.write().await = reason.map(str::to_string);
    }

    /// Refuse symbol writes for `file_path` with [`StoreError::Rejected`].
    pub async fn reject_writes_for(&self, file_path: &str) {
        self.rejected_files.write().await.insert(file_path.to_string());
    }

    async fn check_available(&self) -> StoreResult<()> {
        match self.unavailable.read().await.as_ref() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn check_writable(&self, symbol: &NewSymbol) -> StoreResult<()> {
        self.check_available().await?;
        if symbol.start_line == 0 || symbol.end_line < symbol.start_line {
            return Err(StoreError::Rejected(format!(
                "symbol {} has invalid span {}..{}",
                symbol.name, symbol.start_line, symbol.end_line
            )));
        }
        if self.rejected_files.read().await.contains(&symbol.file_path) {
            return Err(StoreError::Rejected(format!(
                "writes refused for {}",
                symbol.file_path
            )));
        }
        Ok(())
    }
}

fn build_symbol(id: SymbolId, new: NewSymbol, created_at: chrono::DateTime<Utc>) -> Symbol {
    Symbol {
        id,
        project_id: new.project_id,
        name: new.name,
        symbol_type: new.symbol_type,
        language: new.language,
        file_path: new.file_path,
        start_line: new.start_line,
        end_line: new.end_line,
        signature: new.signature,
        docstring: new.docstring,
        commit_hash: new.commit_hash,
        token_count_estimate: new.token_count_estimate,
        usage_count: new.usage_count,
        centrality_score: 0.0,
        metadata: new.metadata,
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_project(&self, name: &str, root: &Path) -> StoreResult<Project> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        let project = Project {
            id: tables.next_id(),
            name: name.to_string(),
            root: root.to_path_buf(),
        };
        tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        self.check_available().await?;
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn get_symbol(&self, id: SymbolId) -> StoreResult<Option<Symbol>> {
        self.check_available().await?;
        Ok(self.tables.read().await.symbols.get(&id).cloned())
    }

    async fn get_symbols(&self, ids: &[SymbolId]) -> StoreResult<Vec<Symbol>> {
        self.check_available().await?;
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.symbols.get(id).cloned())
            .collect())
    }

    async fn create_symbol(&self, symbol: NewSymbol) -> StoreResult<Symbol> {
        self.check_writable(&symbol).await?;
        let mut tables = self.tables.write().await;

        let key = symbol.key();
        if tables.unique.contains_key(&key) {
            return Err(StoreError::Rejected(format!(
                "symbol {} already exists at {}:{}",
                key.name, key.file_path, key.start_line
            )));
        }

        let id = tables.next_id();
        let created = build_symbol(id, symbol, Utc::now());
        tables.unique.insert(key, id);
        tables.symbols.insert(id, created.clone());
        Ok(created)
    }

    async fn update_symbol(&self, id: SymbolId, symbol: NewSymbol) -> StoreResult<Option<Symbol>> {
        self.check_writable(&symbol).await?;
        let mut tables = self.tables.write().await;

        let Some(existing) = tables.symbols.get(&id).cloned() else {
            return Ok(None);
        };

        let new_key = symbol.key();
        if let Some(&owner) = tables.unique.get(&new_key) {
            if owner != id {
                return Err(StoreError::Rejected(format!(
                    "symbol key {}:{}:{} belongs to symbol {}",
                    new_key.file_path, new_key.name, new_key.start_line, owner
                )));
            }
        }

        let mut updated = build_symbol(id, symbol, existing.created_at);
        updated.centrality_score = existing.centrality_score;
        tables.unique.remove(&existing.key());
        tables.unique.insert(new_key, id);
        tables.symbols.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn remove_symbol(&self, id: SymbolId) -> StoreResult<bool> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;

        let Some(symbol) = tables.symbols.remove(&id) else {
            return Ok(false);
        };
        tables.unique.remove(&symbol.key());
        tables.chunks.retain(|_, c| c.symbol_id != id);
        tables.chunk_keys.retain(|(symbol_id, _), _| *symbol_id != id);
        tables.embeddings.retain(|(symbol_id, _), _| *symbol_id != id);
        tables.references.retain(|_, r| r.from_symbol_id != id);
        Ok(true)
    }

    async fn get_by_unique(&self, key: &SymbolKey) -> StoreResult<Option<Symbol>> {
        self.check_available().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .unique
            .get(key)
            .and_then(|id| tables.symbols.get(id))
            .cloned())
    }

    async fn symbols_in_file(&self, project: ProjectId, file_path: &str) -> StoreResult<Vec<Symbol>> {
        self.check_available().await?;
        let mut symbols: Vec<Symbol> = self
            .tables
            .read()
            .await
            .symbols
            .values()
            .filter(|s| s.project_id == project && s.file_path == file_path)
            .cloned()
            .collect();
        symbols.sort_by_key(|s| (s.start_line, s.id));
        Ok(symbols)
    }

    async fn symbols_in_project(&self, project: ProjectId) -> StoreResult<Vec<Symbol>> {
        self.check_available().await?;
        Ok(self
            .tables
            .read()
            .await
            .symbols
            .values()
            .filter(|s| s.project_id == project)
            .cloned()
            .collect())
    }

    async fn symbols_enclosing(
        &self,
        project: ProjectId,
        file_path: &str,
        start: usize,
        end: usize,
    ) -> StoreResult<Vec<Symbol>> {
        let in_file = self.symbols_in_file(project, file_path).await?;
        Ok(in_file.into_iter().filter(|s| s.encloses(start, end)).collect())
    }

    async fn upsert_chunk(&self, chunk: NewSymbolChunk) -> StoreResult<SymbolChunk> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;

        if !tables.symbols.contains_key(&chunk.symbol_id) {
            return Err(StoreError::Rejected(format!(
                "chunk refers to unknown symbol {}",
                chunk.symbol_id
            )));
        }

        let key = (chunk.symbol_id, chunk.chunk_index);
        let (id, vector_id) = match tables.chunk_keys.get(&key).copied() {
            Some(id) => {
                let vector_id = tables
                    .chunks
                    .get(&id)
                    .and_then(|c| c.embedding_vector_id.clone());
                (id, vector_id)
            }
            None => (tables.next_id(), None),
        };

        let stored = SymbolChunk {
            id,
            symbol_id: chunk.symbol_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            embedding_vector_id: vector_id,
            token_count: chunk.token_count,
        };
        tables.chunk_keys.insert(key, id);
        tables.chunks.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_chunk(&self, id: ChunkId) -> StoreResult<Option<SymbolChunk>> {
        self.check_available().await?;
        Ok(self.tables.read().await.chunks.get(&id).cloned())
    }

    async fn chunks_for_symbol(&self, symbol_id: SymbolId) -> StoreResult<Vec<SymbolChunk>> {
        self.check_available().await?;
        Ok(self
            .tables
            .read()
            .await
            .chunks
            .values()
            .filter(|c| c.symbol_id == symbol_id)
            .cloned()
            .collect())
    }

    async fn attach_chunk_vector(&self, chunk_id: ChunkId, vector_id: &str) -> StoreResult<()> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        match tables.chunks.get_mut(&chunk_id) {
            Some(chunk) => {
                chunk.embedding_vector_id = Some(vector_id.to_string());
                Ok(())
            }
            None => Err(StoreError::Rejected(format!("unknown chunk {}", chunk_id))),
        }
    }

    async fn upsert_embedding_metadata(&self, meta: SymbolEmbeddingMetadata) -> StoreResult<()> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        if !tables.symbols.contains_key(&meta.symbol_id) {
            return Err(StoreError::Rejected(format!(
                "embedding metadata refers to unknown symbol {}",
                meta.symbol_id
            )));
        }
        tables
            .embeddings
            .insert((meta.symbol_id, meta.external_vector_id.clone()), meta);
        Ok(())
    }

    async fn embedding_metadata(&self, symbol_id: SymbolId) -> StoreResult<Vec<SymbolEmbeddingMetadata>> {
        self.check_available().await?;
        Ok(self
            .tables
            .read()
            .await
            .embeddings
            .values()
            .filter(|m| m.symbol_id == symbol_id)
            .cloned()
            .collect())
    }

    async fn replace_references(
        &self,
        from: SymbolId,
        references: Vec<NewReference>,
    ) -> StoreResult<Vec<Reference>> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;

        if let Some(bad) = references.iter().find(|r| r.from_symbol_id != from) {
            return Err(StoreError::Rejected(format!(
                "reference from {} listed under symbol {}",
                bad.from_symbol_id, from
            )));
        }

        tables.references.retain(|_, r| r.from_symbol_id != from);
        let mut created = Vec::with_capacity(references.len());
        for new in references {
            let reference = Reference {
                id: tables.next_id(),
                from_symbol_id: new.from_symbol_id,
                to_symbol_id: new.to_symbol_id,
                reference_type: new.reference_type,
                file_path: new.file_path,
                line: new.line,
                context_snippet: new.context_snippet,
            };
            tables.references.insert(reference.id, reference.clone());
            created.push(reference);
        }
        Ok(created)
    }

    async fn references_from(&self, symbol_id: SymbolId) -> StoreResult<Vec<Reference>> {
        self.check_available().await?;
        let mut refs: Vec<Reference> = self
            .tables
            .read()
            .await
            .references
            .values()
            .filter(|r| r.from_symbol_id == symbol_id)
            .cloned()
            .collect();
        refs.sort_by_key(|r| (r.line, r.id));
        Ok(refs)
    }

    async fn create_job(&self, job: IndexingJob) -> StoreResult<IndexingJob> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_job(&self, job: &IndexingJob) -> StoreResult<IndexingJob> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;

        let Some(stored) = tables.jobs.get_mut(&job.id) else {
            return Err(StoreError::Rejected(format!("unknown job {}", job.id)));
        };
        if stored.version != job.version {
            return Err(StoreError::StaleJob {
                job_id: job.id,
                expected: job.version,
                found: stored.version,
            });
        }

        let mut updated = job.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Option<IndexingJob>> {
        self.check_available().await?;
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn jobs_for_project(&self, project: ProjectId) -> StoreResult<Vec<IndexingJob>> {
        self.check_available().await?;
        let mut jobs: Vec<IndexingJob> = self
            .tables
            .read()
            .await
            .jobs
            .values()
            .filter(|j| j.project_id == project)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        Ok(jobs)
    }

    async fn jobs_with_status(&self, status: JobStatus) -> StoreResult<Vec<IndexingJob>> {
        self.check_available().await?;
        let mut jobs: Vec<IndexingJob> = self
            .tables
            .read()
            .await
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        Ok(jobs)
    }

    async fn counts(&self, project: ProjectId) -> StoreResult<StoreCounts> {
        self.check_available().await?;
        let tables = self.tables.read().await;
        let symbol_ids: HashSet<SymbolId> = tables
            .symbols
            .values()
            .filter(|s| s.project_id == project)
            .map(|s| s.id)
            .collect();

        Ok(StoreCounts {
            symbols: symbol_ids.len(),
            chunks: tables
                .chunks
                .values()
                .filter(|c| symbol_ids.contains(&c.symbol_id))
                .count(),
            references: tables
                .references
                .values()
                .filter(|r| symbol_ids.contains(&r.from_symbol_id))
                .count(),
            embeddings: tables
                .embeddings
                .keys()
                .filter(|(id, _)| symbol_ids.contains(id))
                .count(),
            jobs: tables.jobs.values().filter(|j| j.project_id == project).count(),
        })
    }
}
