use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;

use super::provider::{EmbeddingProvider, FragmentReceiver, GenerativeModel};
use super::types::{
    Content, EmbedContentRequest, EmbedContentResponse, GenerateContentRequest,
    GenerateContentResponse,
};
use crate::core::config::GeminiConfig;
use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST client serving both generation and embeddings.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, client: Client) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            client,
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        let url = self.model_url(&self.model, "generateContent");
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
        };

        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::upstream("gemini", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(
                "gemini",
                format!("generateContent returned {}: {}", status, text),
            ));
        }

        let payload: GenerateContentResponse = res
            .json()
            .await
            .map_err(|e| ApiError::upstream("gemini", e))?;

        payload
            .text()
            .ok_or_else(|| ApiError::upstream("gemini", "response contained no candidates"))
    }

    async fn stream_generate(&self, prompt: &str) -> Result<FragmentReceiver, ApiError> {
        let url = format!(
            "{}?alt=sse",
            self.model_url(&self.model, "streamGenerateContent")
        );
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
        };

        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::upstream("gemini", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(
                "gemini",
                format!("streamGenerateContent returned {}: {}", status, text),
            ));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            // Raw bytes: a network chunk may end inside a multi-byte char.
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        for data in drain_sse_data(&mut buffer) {
                            let Some(fragment) = parse_stream_event(&data) else {
                                continue;
                            };
                            if tx.send(Ok(fragment)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ApiError::upstream("gemini", e))).await;
                        return;
                    }
                }
            }

            // A final event without a trailing newline.
            buffer.push(b'\n');
            for data in drain_sse_data(&mut buffer) {
                if let Some(fragment) = parse_stream_event(&data) {
                    let _ = tx.send(Ok(fragment)).await;
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let url = self.model_url(&self.embedding_model, "embedContent");
        let body = EmbedContentRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::text(text),
        };

        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::upstream("gemini embedding", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(
                "gemini embedding",
                format!("embedContent returned {}: {}", status, text),
            ));
        }

        let payload: EmbedContentResponse = res
            .json()
            .await
            .map_err(|e| ApiError::upstream("gemini embedding", e))?;

        Ok(payload.embedding.values)
    }
}

/// Removes every complete line from `buffer` and returns the payloads of its
/// `data:` lines. An incomplete trailing line stays in the buffer, so lines
/// are decoded only once all of their bytes have arrived.
pub(crate) fn drain_sse_data(buffer: &mut Vec<u8>) -> Vec<String> {
    let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };

    let complete: Vec<u8> = buffer.drain(..=last_newline).collect();
    complete
        .split(|&b| b == b'\n')
        .map(String::from_utf8_lossy)
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            line.strip_prefix("data:")
                .map(|data| data.trim_start().to_string())
        })
        .filter(|data| !data.is_empty())
        .collect()
}

fn parse_stream_event(data: &str) -> Option<String> {
    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(event) => event.text().filter(|text| !text.is_empty()),
        Err(e) => {
            tracing::debug!("Skipping unparseable stream event: {}", e);
            None
        }
    }
}
