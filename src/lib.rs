//! Symbol reference indexing and token-budgeted context packs.
//!
//! Source files are parsed into symbols, intra-file references and embedded
//! chunks. Queries resolve a snippet to a symbol, walk its reference graph
//! and pack the most relevant context under a token budget.

pub mod cli;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod graph;
pub mod history;
pub mod indexer;
pub mod indexing;
pub mod logging;
pub mod metrics;
pub mod pack;
pub mod ranking;
pub mod search;
pub mod storage;
pub mod symbol;
pub mod vcs;

pub use config::Config;
pub use engine::{EngineContext, EngineError, IndexingTicket, ReferenceEngine};
