use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::rag::QueryRequest;
use crate::server::extract::AppJson;
use crate::server::ndjson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPayload {
    pub query: String,
    /// Kept as a float so fractional values can be rejected explicitly.
    #[serde(default)]
    pub top_k: Option<f64>,
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
}

impl QueryPayload {
    fn into_request(self) -> Result<QueryRequest, ApiError> {
        QueryRequest::new(self.query, self.top_k, self.machine, self.machine_id)
    }
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<QueryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.into_request()?;
    let answer = state.pipeline.answer(&request).await?;
    Ok(Json(answer))
}

pub async fn query_stream(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<QueryPayload>,
) -> Result<Response, ApiError> {
    let request = payload.into_request()?;
    Ok(ndjson::response(state.pipeline.stream(request)))
}
