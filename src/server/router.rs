use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::AppConfig;
use crate::server::handlers::{health, ingest, logs, machines, query, tts};
use crate::state::AppState;

/// Multipart framing allowance on top of the raw file bytes.
const UPLOAD_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Creates the application router.
///
/// Every route is served at the root and again under `/api`, the prefix the
/// web client uses.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_allowed_origins);
    let json_limit = state.config.server.json_body_limit_bytes;
    let routes = api_routes(upload_limit(&state.config));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(json_limit))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn api_routes(upload_limit: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/ingest", post(ingest::ingest))
        .route(
            "/ingest/upload",
            post(ingest::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/tts", post(tts::tts))
        .route("/query", post(query::query))
        .route("/query/stream", post(query::query_stream))
        .route("/log", post(logs::create_log))
        .route("/logs", get(logs::list_logs))
        .route(
            "/machines",
            get(machines::list_machines).post(machines::create_machine),
        )
        .route(
            "/machines/:id",
            get(machines::get_machine)
                .put(machines::update_machine)
                .delete(machines::delete_machine),
        )
}

fn upload_limit(config: &AppConfig) -> usize {
    config
        .ingest
        .max_upload_files
        .saturating_mul(config.ingest.max_upload_bytes())
        .saturating_add(UPLOAD_OVERHEAD_BYTES)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_origins = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    let layer = if allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed_origins))
    };

    layer
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_covers_all_files() {
        let config = AppConfig::default();
        assert_eq!(upload_limit(&config), 5 * 10 * 1024 * 1024 + UPLOAD_OVERHEAD_BYTES);
    }
}
