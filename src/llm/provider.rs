use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::ApiError;

/// Incremental text fragments produced by a streaming generation.
pub type FragmentReceiver = mpsc::Receiver<Result<String, ApiError>>;

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// return the provider name (e.g. "gemini")
    fn name(&self) -> &str;

    /// single-shot completion of `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, ApiError>;

    /// streaming completion; an `Err` here means streaming is unavailable and
    /// callers fall back to `generate`
    async fn stream_generate(&self, prompt: &str) -> Result<FragmentReceiver, ApiError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// raw embedding of one text, at whatever dimensionality the model emits
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;
}
