use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::db::logs::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::db::NewLog;
use crate::server::extract::AppJson;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsParams {
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn create_log(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewLog>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.db.logs().create(payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    params: Result<Query<LogsParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }
    let machine_id = params.machine_id.filter(|id| !id.trim().is_empty());
    let entries = state.db.logs().list(machine_id.as_deref(), limit).await?;
    Ok(Json(entries))
}
