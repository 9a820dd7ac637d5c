//! Context retrieval: query embedding, similarity search and context filters.
//!
//! Retrieval never fails a request. Embedding or index errors, and losing
//! the race against the streaming deadline, all degrade to an empty context
//! list so the model answers without documentation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::embedding::EmbeddingAdapter;
use super::store::VectorIndex;
use crate::core::errors::ApiError;

/// Outcome of [`first_of`].
#[derive(Debug, PartialEq, Eq)]
pub enum Race<T> {
    Completed(T),
    TimedOut,
}

/// Runs `task` on its own tokio task and races it against `timeout`.
///
/// When the timer wins the task is detached: it may still run to completion,
/// but its output is dropped with the join handle and never observed.
pub async fn first_of<F, T>(task: F, timeout: Duration) -> Race<Option<T>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(task);
    tokio::select! {
        joined = handle => match joined {
            Ok(value) => Race::Completed(Some(value)),
            Err(e) => {
                tracing::warn!("Retrieval task aborted: {}", e);
                Race::Completed(None)
            }
        },
        _ = tokio::time::sleep(timeout) => Race::TimedOut,
    }
}

#[derive(Clone)]
pub struct Retriever {
    embedder: EmbeddingAdapter,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: EmbeddingAdapter, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `top_k` context snippets for `query`. Never fails.
    pub async fn retrieve(&self, query: &str, top_k: usize, machine_id: Option<&str>) -> Vec<String> {
        match self.search(query, top_k, machine_id).await {
            Ok(contexts) => contexts,
            Err(e) => {
                tracing::warn!("Retrieval failed, answering without context: {}", e);
                Vec::new()
            }
        }
    }

    /// [`Retriever::retrieve`] bounded by `timeout`; a late result is discarded.
    pub async fn retrieve_within(
        &self,
        query: String,
        top_k: usize,
        machine_id: Option<String>,
        timeout: Duration,
    ) -> Vec<String> {
        let retriever = self.clone();
        let task = async move {
            retriever
                .retrieve(&query, top_k, machine_id.as_deref())
                .await
        };

        match first_of(task, timeout).await {
            Race::Completed(contexts) => contexts.unwrap_or_default(),
            Race::TimedOut => {
                tracing::warn!(
                    "Retrieval exceeded {} ms, answering without context",
                    timeout.as_millis()
                );
                Vec::new()
            }
        }
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        machine_id: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        let vector = self.embedder.embed_one(query).await?;
        let matches = self.index.query(&vector, top_k, machine_id).await?;

        Ok(matches
            .into_iter()
            .filter_map(|m| m.metadata.map(|meta| meta.text))
            .filter(|text| !text.is_empty())
            .take(top_k)
            .collect())
    }
}

/// Keeps contexts that mention `machine` (case-insensitive).
///
/// A blank or absent machine name keeps everything. When nothing matches the
/// result is empty rather than the unfiltered list, so the model is never
/// grounded in documentation for a different machine.
pub fn filter_by_machine_name(contexts: Vec<String>, machine: Option<&str>) -> Vec<String> {
    let Some(machine) = machine.map(str::trim).filter(|m| !m.is_empty()) else {
        return contexts;
    };
    let needle = machine.to_lowercase();
    contexts
        .into_iter()
        .filter(|context| context.to_lowercase().contains(&needle))
        .collect()
}
