use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::traits::{VectorIndex, VectorMatch, VectorRecord};
use super::cosine_similarity;
use crate::symbol::Metadata;

/// Exact in-process cosine search, one map per namespace.
#[derive(Default)]
pub struct MemoryVectorIndex {
    namespaces: RwLock<HashMap<String, HashMap<String, (Vec<f32>, Metadata)>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored in `namespace`.
    pub async fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;

        // The whole batch is checked before anything is written.
        let expected = namespaces
            .get(namespace)
            .and_then(|entries| entries.values().next())
            .map(|(existing, _)| existing.len())
            .or_else(|| records.first().map(|r| r.vector.len()));
        if let Some(expected) = expected {
            if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
                bail!(
                    "vector dimension {} does not match namespace '{}' dimension {}",
                    bad.vector.len(),
                    namespace,
                    expected
                );
            }
        }

        let entries = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            entries.insert(record.id, (record.vector, record.metadata));
        }
        Ok(())
    }

    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let namespaces = self.namespaces.read().await;
        let Some(entries) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = entries
            .iter()
            .map(|(id, (stored, metadata))| VectorMatch {
                id: id.clone(),
                distance: 1.0 - cosine_similarity(vector, stored).unwrap_or(0.0),
                metadata: metadata.clone(),
            })
            .collect();

        // Id breaks distance ties so results do not depend on map order.
        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, namespace: &str, ids: &[String]) -> Result<()> {
        if let Some(entries) = self.namespaces.write().await.get_mut(namespace) {
            for id in ids {
                entries.remove(id);
            }
        }
        Ok(())
    }

    fn index_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, vector: Vec<f32>, file: &str) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("file_path".to_string(), json!(file));
        VectorRecord {
            id: id.to_string(),
            vector,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                "ns",
                vec![
                    record("far", vec![0.0, 1.0], "b.py"),
                    record("near", vec![1.0, 0.1], "a.py"),
                ],
            )
            .await
            .unwrap();

        let hits = index.query("ns", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].distance < hits[1].distance);
        assert!((hits[1].similarity() - 0.0).abs() < 1e-6);
        assert_eq!(hits[0].metadata_str("file_path"), Some("a.py"));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_delete_removes() {
        let index = MemoryVectorIndex::new();
        index.upsert("ns", vec![record("a", vec![1.0, 0.0], "x")]).await.unwrap();
        index.upsert("ns", vec![record("a", vec![0.0, 1.0], "y")]).await.unwrap();
        assert_eq!(index.len("ns").await, 1);

        let hits = index.query("ns", &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].metadata_str("file_path"), Some("y"));

        index.delete("ns", &["a".to_string(), "missing".to_string()]).await.unwrap();
        assert_eq!(index.len("ns").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_empty() {
        let index = MemoryVectorIndex::new();
        assert!(index.query("nope", &[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let index = MemoryVectorIndex::new();
        index.upsert("ns", vec![record("a", vec![1.0, 0.0], "x")]).await.unwrap();
        let err = index.upsert("ns", vec![record("b", vec![1.0], "x")]).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_mixed_batch_writes_nothing() {
        let index = MemoryVectorIndex::new();
        index.upsert("ns", vec![record("a", vec![1.0, 0.0], "x")]).await.unwrap();

        let err = index
            .upsert(
                "ns",
                vec![record("b", vec![0.0, 1.0], "x"), record("c", vec![1.0], "x")],
            )
            .await;
        assert!(err.is_err());
        assert_eq!(index.len("ns").await, 1);

        // A fresh namespace takes its dimension from the batch itself.
        let err = index
            .upsert("fresh", vec![record("d", vec![1.0, 0.0], "x"), record("e", vec![1.0], "x")])
            .await;
        assert!(err.is_err());
        assert_eq!(index.len("fresh").await, 0);
    }
}
