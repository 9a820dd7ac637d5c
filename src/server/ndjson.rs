//! Newline-delimited JSON response bodies.

use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::mpsc;

pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// One record serialized as a single JSON line.
pub fn encode_line<T: Serialize>(record: &T) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Streams every record received on `rx` as its own line. The body ends when
/// the sender side is dropped.
pub fn response<T>(rx: mpsc::Receiver<T>) -> Response
where
    T: Serialize + Send + 'static,
{
    let lines = futures_util::stream::unfold(rx, |mut rx| async move {
        let record = rx.recv().await?;
        Some((encode_line(&record), rx))
    });

    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}
