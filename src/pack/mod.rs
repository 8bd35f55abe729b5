//! Token-budgeted reference packs for debugging queries.

mod builder;

pub use builder::ReferencePackBuilder;

use serde::Serialize;

use crate::history::HistoricalFix;
use crate::symbol::{ReferenceType, Symbol, SymbolId};

/// The anchor symbol's source, read from the live file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub content: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub token_count: usize,
}

/// A reference admitted into a pack, with its surrounding lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackedReference {
    pub content: String,
    pub reference_type: ReferenceType,
    pub file_path: String,
    pub line: usize,
    pub depth: usize,
    pub symbol_id: Option<SymbolId>,
    pub symbol_name: Option<String>,
    pub token_count: usize,
    pub score: f64,
}

/// A historical fix admitted into a pack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackedFix {
    #[serde(flatten)]
    pub fix: HistoricalFix,
    pub token_count: usize,
    pub score: f64,
}

/// Definition plus supporting context, bounded by a token budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferencePack {
    pub symbol: Symbol,
    pub definition: Definition,
    pub references: Vec<PackedReference>,
    pub callers: Vec<PackedReference>,
    pub callees: Vec<PackedReference>,
    pub imports: Vec<PackedReference>,
    pub tests: Vec<PackedReference>,
    pub historical_fixes: Vec<PackedFix>,
    /// Definition plus every admitted candidate
    pub token_count: usize,
    pub reasoning: String,
}

impl ReferencePack {
    /// Every admitted reference, across buckets.
    pub fn all_references(&self) -> impl Iterator<Item = &PackedReference> {
        self.references
            .iter()
            .chain(&self.callers)
            .chain(&self.callees)
            .chain(&self.imports)
            .chain(&self.tests)
    }

    pub fn reference_count(&self) -> usize {
        self.all_references().count()
    }
}
