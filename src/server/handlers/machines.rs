use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::db::{MachineUpdate, NewMachine};
use crate::server::extract::AppJson;
use crate::state::AppState;

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("machine '{}' not found", id))
}

pub async fn list_machines(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.machines().list().await?))
}

pub async fn create_machine(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewMachine>,
) -> Result<impl IntoResponse, ApiError> {
    let machine = state.db.machines().create(payload).await?;
    Ok((StatusCode::CREATED, Json(machine)))
}

pub async fn get_machine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let machine = state
        .db
        .machines()
        .get(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(machine))
}

pub async fn update_machine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<MachineUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let machine = state
        .db
        .machines()
        .update(&id, payload)
        .await?
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(machine))
}

pub async fn delete_machine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.machines().delete(&id).await? {
        return Err(not_found(&id));
    }
    Ok(Json(json!({ "ok": true })))
}
