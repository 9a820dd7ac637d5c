use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::server::extract::AppJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TtsPayload {
    pub text: String,
}

pub async fn tts(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<TtsPayload>,
) -> Result<Response, ApiError> {
    let speech = state
        .speech
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("text-to-speech is not configured".to_string()))?;

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    let max_chars = state.config.tts.max_chars;
    if text.chars().count() > max_chars {
        return Err(ApiError::BadRequest(format!(
            "text must be at most {} characters",
            max_chars
        )));
    }

    let audio = speech.synthesize(text).await?;
    Ok(([(header::CONTENT_TYPE, speech.encoding().content_type())], audio).into_response())
}
