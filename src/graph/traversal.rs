use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::storage::{Store, StoreResult};
use crate::symbol::{Reference, Symbol, SymbolId};

/// One edge reached by a traversal, with the depth it was found at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub reference: Reference,
    /// 0 for the anchor's own outgoing references
    pub depth: usize,
    /// Target of the edge, if it still exists
    pub symbol: Option<Symbol>,
}

/// Outgoing edges of one symbol still to be emitted.
struct Frame {
    depth: usize,
    edges: std::vec::IntoIter<(Reference, Option<Symbol>)>,
}

/// Bounded depth-first walk over outgoing references.
pub struct ReferenceGraph {
    store: Arc<dyn Store>,
}

impl ReferenceGraph {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// References reachable from `symbol_id`, in traversal order.
    ///
    /// The anchor's edges are depth 0. After an edge is emitted its target's
    /// edges follow at `depth + 1`, as long as `depth < max_depth` and the
    /// target has not been expanded before. The walk stops once
    /// `max_references` entries are collected. An unknown anchor has no
    /// references.
    pub async fn get_symbol_references(
        &self,
        symbol_id: SymbolId,
        max_depth: usize,
        max_references: usize,
    ) -> StoreResult<Vec<ReferenceEntry>> {
        let mut entries = Vec::new();
        if max_references == 0 || self.store.get_symbol(symbol_id).await?.is_none() {
            return Ok(entries);
        }

        let mut visited: HashSet<SymbolId> = HashSet::from([symbol_id]);
        let mut stack = vec![Frame {
            depth: 0,
            edges: self.outgoing(symbol_id).await?.into_iter(),
        }];

        while let Some(frame) = stack.last_mut() {
            let depth = frame.depth;
            let Some((reference, symbol)) = frame.edges.next() else {
                stack.pop();
                continue;
            };

            let target = reference.to_symbol_id;
            entries.push(ReferenceEntry {
                reference,
                depth,
                symbol,
            });
            if entries.len() >= max_references {
                break;
            }

            if depth < max_depth && visited.insert(target) {
                stack.push(Frame {
                    depth: depth + 1,
                    edges: self.outgoing(target).await?.into_iter(),
                });
            }
        }

        debug!(
            "Traversed {} references from symbol {} (max_depth={}, max_references={})",
            entries.len(),
            symbol_id,
            max_depth,
            max_references
        );
        Ok(entries)
    }

    /// Outgoing edges of `symbol_id` paired with their target symbols.
    async fn outgoing(&self, symbol_id: SymbolId) -> StoreResult<Vec<(Reference, Option<Symbol>)>> {
        let references = self.store.references_from(symbol_id).await?;
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let mut target_ids: Vec<SymbolId> = references.iter().map(|r| r.to_symbol_id).collect();
        target_ids.sort_unstable();
        target_ids.dedup();
        let targets: HashMap<SymbolId, Symbol> = self
            .store
            .get_symbols(&target_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        Ok(references
            .into_iter()
            .map(|r| {
                let symbol = targets.get(&r.to_symbol_id).cloned();
                (r, symbol)
            })
            .collect())
    }
}
