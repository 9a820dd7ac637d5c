use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::ingest::{Document, UploadedFile};
use crate::server::extract::AppJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub documents: Vec<Document>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    #[serde(default)]
    pub machine_id: Option<String>,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<IngestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let upserted = state.ingest.ingest_documents(payload.documents).await?;
    Ok(Json(json!({ "ok": true, "upserted": upserted })))
}

/// Multipart upload. Files arrive in `files` fields; `machineId` may be a
/// query parameter or a form field, the query parameter winning.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    params: Result<Query<UploadParams>, QueryRejection>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let mut machine_id = params.machine_id;
    let mut form_machine_id = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("upload-{}", files.len()));
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                files.push(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "machineId" => form_machine_id = Some(field.text().await?),
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    if machine_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
        machine_id = form_machine_id;
    }

    let upserted = state.ingest.ingest_upload(files, machine_id).await?;
    Ok(Json(json!({ "ok": true, "upserted": upserted })))
}
