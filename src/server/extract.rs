use axum::extract::FromRequest;

use crate::core::errors::ApiError;

/// `axum::Json` whose rejection answers `{ "error": ... }` with status 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);
