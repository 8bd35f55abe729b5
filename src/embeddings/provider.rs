use anyhow::Result;
use async_trait::async_trait;

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per input
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single query
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>>;

    /// Dimension of every vector this provider produces
    fn embedding_dimension(&self) -> usize;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;

    /// Largest number of texts accepted by one `embed` call
    fn max_batch_size(&self) -> usize;
}
