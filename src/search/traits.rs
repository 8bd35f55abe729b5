//! Vector similarity index seam.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::symbol::Metadata;

/// An entry to store in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// One query hit. Lower `distance` is closer; similarity is `1 - distance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub distance: f32,
    pub metadata: Metadata,
}

impl VectorMatch {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }

    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| v.as_i64())
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Namespaced vector storage with nearest-neighbour queries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite entries by id within `namespace`.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()>;

    /// Up to `top_k` nearest entries, closest first. An unknown namespace is empty.
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Remove entries by id; unknown ids are ignored.
    async fn delete(&self, namespace: &str, ids: &[String]) -> Result<()>;

    fn index_type(&self) -> &'static str;
}
