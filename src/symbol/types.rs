//! Persisted data model: projects, symbols, chunks, references and
//! embedding back-references.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::indexer::DraftSymbol;

pub type ProjectId = i64;
pub type SymbolId = i64;
pub type ChunkId = i64;
pub type ReferenceId = i64;

/// Free-form metadata attached to symbols and vector entries.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A repository registered for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Working-tree root handed to the snapshot provider
    pub root: PathBuf,
}

/// Kind of code construct a symbol represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    Function,
    Class,
    Method,
    Constant,
    Variable,
    Module,
    Import,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Function => "function",
            SymbolType::Class => "class",
            SymbolType::Method => "method",
            SymbolType::Constant => "constant",
            SymbolType::Variable => "variable",
            SymbolType::Module => "module",
            SymbolType::Import => "import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolType::Function),
            "class" => Some(SymbolType::Class),
            "method" => Some(SymbolType::Method),
            "constant" => Some(SymbolType::Constant),
            "variable" => Some(SymbolType::Variable),
            "module" => Some(SymbolType::Module),
            "import" => Some(SymbolType::Import),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted, line-bounded code construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub project_id: ProjectId,
    pub name: String,
    pub symbol_type: SymbolType,
    pub language: String,
    pub file_path: String,
    /// 1-indexed, inclusive
    pub start_line: usize,
    /// 1-indexed, inclusive; never below `start_line`
    pub end_line: usize,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub commit_hash: Option<String>,
    pub token_count_estimate: usize,
    pub usage_count: u64,
    pub centrality_score: f64,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Symbol {
    /// Whether `[start, end]` lies inside this symbol's span.
    pub fn encloses(&self, start: usize, end: usize) -> bool {
        self.start_line <= start && end <= self.end_line
    }

    /// Number of lines covered by the symbol.
    pub fn span(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn key(&self) -> SymbolKey {
        SymbolKey {
            project_id: self.project_id,
            file_path: self.file_path.clone(),
            name: self.name.clone(),
            start_line: self.start_line,
        }
    }
}

/// Identity of a symbol across re-indexing runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub project_id: ProjectId,
    pub file_path: String,
    pub name: String,
    pub start_line: usize,
}

/// Symbol fields supplied on create/update; the store owns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSymbol {
    pub project_id: ProjectId,
    pub name: String,
    pub symbol_type: SymbolType,
    pub language: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub commit_hash: Option<String>,
    pub token_count_estimate: usize,
    pub usage_count: u64,
    pub metadata: Metadata,
}

impl NewSymbol {
    pub fn from_draft(project_id: ProjectId, draft: &DraftSymbol, commit_hash: Option<&str>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("kind".to_string(), draft.kind.into());
        if let Some(parent) = &draft.parent {
            metadata.insert("parent".to_string(), parent.clone().into());
        }

        Self {
            project_id,
            name: draft.name.clone(),
            symbol_type: draft.symbol_type,
            language: draft.language.clone(),
            file_path: draft.file_path.clone(),
            start_line: draft.start_line,
            end_line: draft.end_line,
            signature: draft.signature.clone(),
            docstring: draft.docstring.clone(),
            commit_hash: commit_hash.map(str::to_string),
            token_count_estimate: draft.token_count(),
            usage_count: 0,
            metadata,
        }
    }

    pub fn key(&self) -> SymbolKey {
        SymbolKey {
            project_id: self.project_id,
            file_path: self.file_path.clone(),
            name: self.name.clone(),
            start_line: self.start_line,
        }
    }
}

/// A unit of symbol text submitted for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolChunk {
    pub id: ChunkId,
    pub symbol_id: SymbolId,
    pub chunk_index: usize,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub embedding_vector_id: Option<String>,
    pub token_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSymbolChunk {
    pub symbol_id: SymbolId,
    pub chunk_index: usize,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub token_count: usize,
}

/// Kind of relationship a reference edge records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Call,
    Import,
    Inheritance,
    Usage,
    Implementation,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Call => "call",
            ReferenceType::Import => "import",
            ReferenceType::Inheritance => "inheritance",
            ReferenceType::Usage => "usage",
            ReferenceType::Implementation => "implementation",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed edge between two symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ReferenceId,
    pub from_symbol_id: SymbolId,
    pub to_symbol_id: SymbolId,
    pub reference_type: ReferenceType,
    pub file_path: String,
    pub line: usize,
    pub context_snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReference {
    pub from_symbol_id: SymbolId,
    pub to_symbol_id: SymbolId,
    pub reference_type: ReferenceType,
    pub file_path: String,
    pub line: usize,
    pub context_snippet: Option<String>,
}

/// Back-reference from a symbol to its vector in the external index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEmbeddingMetadata {
    pub symbol_id: SymbolId,
    pub external_vector_id: String,
    pub namespace: String,
    pub dim: usize,
    pub last_upserted_at: DateTime<Utc>,
}

/// Vector-index namespace holding a project's symbol chunks.
pub fn symbols_namespace(project_id: ProjectId) -> String {
    format!("project_{}_symbols", project_id)
}

/// Vector-index namespace holding a project's commit history.
pub fn commits_namespace(project_id: ProjectId) -> String {
    format!("project_{}_commits", project_id)
}
