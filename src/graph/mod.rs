//! Reference graph queries over persisted symbols and edges.

mod traversal;

pub use traversal::{ReferenceEntry, ReferenceGraph};
