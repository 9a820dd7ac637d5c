//! Dimension-normalizing wrapper around a remote embedding provider.

use std::sync::Arc;

use futures_util::{stream, StreamExt, TryStreamExt};

use crate::core::errors::ApiError;
use crate::llm::EmbeddingProvider;

/// Upper bound on embedding requests in flight for one batch.
pub const MAX_CONCURRENT_EMBEDDINGS: usize = 8;

/// Embeds texts and normalizes every vector to the index dimensionality.
#[derive(Clone)]
pub struct EmbeddingAdapter {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
}

impl EmbeddingAdapter {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// One vector per input, in input order. At most
    /// `MAX_CONCURRENT_EMBEDDINGS` items are embedded at once and the first
    /// failure fails the whole batch.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let pending: Vec<_> = texts.iter().map(|text| self.embed_one(text)).collect();
        stream::iter(pending)
            .buffered(MAX_CONCURRENT_EMBEDDINGS)
            .try_collect()
            .await
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let raw = self.provider.embed(text).await?;
        if raw.len() != self.dimension {
            tracing::debug!(
                "Normalizing {} embedding from {} to {} dimensions",
                self.provider.name(),
                raw.len(),
                self.dimension
            );
        }
        Ok(normalize_dimension(raw, self.dimension))
    }
}

/// Zero-pads short vectors and truncates long ones to exactly `dimension`.
pub fn normalize_dimension(raw: Vec<f32>, dimension: usize) -> Vec<f32> {
    if raw.len() == dimension {
        return raw;
    }
    let mut normalized = vec![0.0; dimension];
    let copied = raw.len().min(dimension);
    normalized[..copied].copy_from_slice(&raw[..copied]);
    normalized
}
