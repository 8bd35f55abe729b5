mod mock;
mod provider;

#[cfg(feature = "fastembed")]
mod fastembed_provider;

pub use mock::MockEmbedder;
pub use provider::EmbeddingProvider;

#[cfg(feature = "fastembed")]
pub use fastembed_provider::FastEmbedProvider;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{EmbeddingProviderKind, EmbeddingsConfig};

/// Build the provider selected in `config`.
pub fn create_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::Mock => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        #[cfg(feature = "fastembed")]
        EmbeddingProviderKind::Fastembed => Ok(Arc::new(FastEmbedProvider::new(config)?)),
        #[cfg(not(feature = "fastembed"))]
        EmbeddingProviderKind::Fastembed => anyhow::bail!(
            "embedding provider 'fastembed' requires building with the `fastembed` feature"
        ),
    }
}
