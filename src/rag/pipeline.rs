//! Query orchestration: retrieval, prompt assembly, generation and streaming.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use super::prompt::{build_prompt, PromptMode};
use super::retrieval::{filter_by_machine_name, Retriever};
use super::sanitize::{sanitize, sanitize_fragment};
use crate::core::errors::ApiError;
use crate::llm::GenerativeModel;

pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 8;
pub const DEFAULT_TOP_K: usize = 4;

/// A validated question.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub top_k: usize,
    /// Free-text machine name used to filter contexts by substring.
    pub machine: Option<String>,
    /// Exact machine id used as a metadata filter at search time.
    pub machine_id: Option<String>,
}

impl QueryRequest {
    pub fn new(
        query: String,
        top_k: Option<f64>,
        machine: Option<String>,
        machine_id: Option<String>,
    ) -> Result<Self, ApiError> {
        if query.trim().is_empty() {
            return Err(ApiError::BadRequest("query must not be empty".to_string()));
        }
        Ok(Self {
            query,
            top_k: validate_top_k(top_k)?,
            machine: machine.filter(|m| !m.trim().is_empty()),
            machine_id: machine_id.filter(|id| !id.trim().is_empty()),
        })
    }
}

/// `topK` must be an integer in `[MIN_TOP_K, MAX_TOP_K]`; absent means
/// `DEFAULT_TOP_K`.
pub fn validate_top_k(raw: Option<f64>) -> Result<usize, ApiError> {
    let Some(value) = raw else {
        return Ok(DEFAULT_TOP_K);
    };
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(ApiError::BadRequest("topK must be an integer".to_string()));
    }
    if value < MIN_TOP_K as f64 || value > MAX_TOP_K as f64 {
        return Err(ApiError::BadRequest(format!(
            "topK must be between {} and {}",
            MIN_TOP_K, MAX_TOP_K
        )));
    }
    Ok(value as usize)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub contexts: Vec<String>,
}

/// One line of the NDJSON answer stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamRecord {
    Contexts { contexts: Vec<String> },
    Delta { delta: String },
}

#[derive(Clone)]
pub struct QueryPipeline {
    retriever: Retriever,
    model: Arc<dyn GenerativeModel>,
    stream_timeout: Duration,
}

impl QueryPipeline {
    pub fn new(retriever: Retriever, model: Arc<dyn GenerativeModel>, stream_timeout: Duration) -> Self {
        Self {
            retriever,
            model,
            stream_timeout,
        }
    }

    /// Single-shot answer. Retrieval problems degrade to an answer without
    /// context; a generation failure fails the request.
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryAnswer, ApiError> {
        let contexts = self
            .retriever
            .retrieve(&request.query, request.top_k, request.machine_id.as_deref())
            .await;
        let contexts = filter_by_machine_name(contexts, request.machine.as_deref());

        let prompt = build_prompt(
            &request.query,
            &contexts,
            PromptMode::SingleShot,
            request.machine.as_deref(),
        );
        let raw = self.model.generate(&prompt).await?;

        Ok(QueryAnswer {
            answer: sanitize(&raw),
            contexts,
        })
    }

    /// Starts a streamed answer. The receiver yields the contexts record
    /// first, then deltas, and closes when generation ends.
    pub fn stream(&self, request: QueryRequest) -> mpsc::Receiver<StreamRecord> {
        let (tx, rx) = mpsc::channel(32);
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_stream(request, tx).await });
        rx
    }

    async fn run_stream(&self, request: QueryRequest, tx: mpsc::Sender<StreamRecord>) {
        // The streaming endpoint does not filter by machine id.
        let contexts = self
            .retriever
            .retrieve_within(request.query.clone(), request.top_k, None, self.stream_timeout)
            .await;
        let contexts = filter_by_machine_name(contexts, request.machine.as_deref());
        let prompt = build_prompt(
            &request.query,
            &contexts,
            PromptMode::Structured,
            request.machine.as_deref(),
        );

        if tx.send(StreamRecord::Contexts { contexts }).await.is_err() {
            return;
        }

        let mut fragments = match self.model.stream_generate(&prompt).await {
            Ok(fragments) => fragments,
            Err(e) => {
                tracing::warn!(
                    "Streaming from {} unavailable, falling back to one response: {}",
                    self.model.name(),
                    e
                );
                match self.model.generate(&prompt).await {
                    Ok(text) => {
                        let delta = sanitize(&text);
                        if !delta.is_empty() {
                            let _ = tx.send(StreamRecord::Delta { delta }).await;
                        }
                    }
                    Err(e) => tracing::error!("Fallback generation failed: {}", e),
                }
                return;
            }
        };

        let mut started = false;
        while let Some(item) = fragments.recv().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(e) => {
                    tracing::warn!("Answer stream ended early: {}", e);
                    return;
                }
            };

            // Emptiness is judged on the trimmed form; the emitted text keeps
            // its boundary spaces so deltas concatenate.
            if sanitize(&fragment).is_empty() {
                continue;
            }
            let mut delta = sanitize_fragment(&fragment);
            if !started {
                delta = delta.trim_start().to_string();
            }
            started = true;

            if tx.send(StreamRecord::Delta { delta }).await.is_err() {
                tracing::debug!("Client disconnected during streaming");
                return;
            }
        }
    }
}
