//! Symbol data model and snippet-to-symbol resolution.

pub mod resolver;
pub mod types;

pub use resolver::{EnclosingSymbol, SymbolMatch, SymbolResolver};
pub use types::{
    commits_namespace, symbols_namespace, ChunkId, Metadata, NewReference, NewSymbol,
    NewSymbolChunk, Project, ProjectId, Reference, ReferenceId, ReferenceType, Symbol,
    SymbolChunk, SymbolEmbeddingMetadata, SymbolId, SymbolKey, SymbolType,
};
