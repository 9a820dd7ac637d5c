use serde_json::{Map, Value};
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
        validate_u64_field(
            server,
            "server.json_body_limit_bytes",
            "json_body_limit_bytes",
            1024,
            100_000_000,
        )?;
    }

    if let Some(logging) = expect_optional_object(root, "logging")? {
        validate_optional_string_field(logging, "logging.dir", "dir")?;
        validate_optional_string_field(logging, "logging.file_name", "file_name")?;
    }

    if let Some(database) = expect_optional_object(root, "database")? {
        validate_optional_string_field(database, "database.url", "url")?;
        validate_u64_field(
            database,
            "database.max_connections",
            "max_connections",
            1,
            100,
        )?;
    }

    if let Some(gemini) = expect_optional_object(root, "gemini")? {
        validate_optional_string_field(gemini, "gemini.api_key", "api_key")?;
        validate_optional_string_field(gemini, "gemini.base_url", "base_url")?;
        validate_optional_string_field(gemini, "gemini.model", "model")?;
        validate_optional_string_field(gemini, "gemini.embedding_model", "embedding_model")?;
    }

    if let Some(pinecone) = expect_optional_object(root, "pinecone")? {
        validate_optional_string_field(pinecone, "pinecone.api_key", "api_key")?;
        validate_optional_string_field(pinecone, "pinecone.index", "index")?;
        validate_optional_string_field(pinecone, "pinecone.host", "host")?;
        validate_optional_string_field(
            pinecone,
            "pinecone.control_plane_url",
            "control_plane_url",
        )?;
        validate_optional_string_field(pinecone, "pinecone.namespace", "namespace")?;
        validate_u64_field(pinecone, "pinecone.dimension", "dimension", 1, 20_000)?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(
            retrieval,
            "retrieval.stream_timeout_ms",
            "stream_timeout_ms",
            1,
            600_000,
        )?;
    }

    if let Some(ingest) = expect_optional_object(root, "ingest")? {
        validate_u64_field(ingest, "ingest.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(
            ingest,
            "ingest.chunk_overlap",
            "chunk_overlap",
            0,
            1_000_000,
        )?;
        validate_u64_field(
            ingest,
            "ingest.max_upload_files",
            "max_upload_files",
            1,
            100,
        )?;
        validate_u64_field(ingest, "ingest.max_upload_mb", "max_upload_mb", 1, 1024)?;

        let chunk_size = ingest.get("chunk_size").and_then(Value::as_u64).unwrap_or(1000);
        let overlap = ingest.get("chunk_overlap").and_then(Value::as_u64).unwrap_or(200);
        if overlap >= chunk_size {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at 'ingest.chunk_overlap': must be smaller than chunk_size ({})",
                chunk_size
            )));
        }
    }

    if let Some(tts) = expect_optional_object(root, "tts")? {
        validate_optional_string_field(tts, "tts.api_key", "api_key")?;
        validate_optional_string_field(tts, "tts.base_url", "base_url")?;
        validate_optional_string_field(tts, "tts.language_code", "language_code")?;
        validate_optional_string_field(tts, "tts.voice_name", "voice_name")?;
        validate_enum_field(tts, "tts.encoding", "encoding", &["mp3", "wav"])?;
        validate_u64_field(tts, "tts.max_chars", "max_chars", 1, 100_000)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

/// Strings may also be null, which leaves optional settings unset.
fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(ApiError::BadRequest(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_typical_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "server": { "port": 8787, "cors_allowed_origins": ["http://localhost:5173"] },
            "pinecone": { "index": "warehouse", "host": null, "dimension": 768 },
            "ingest": { "chunk_size": 1000, "chunk_overlap": 200 },
            "tts": { "encoding": "wav" }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_wrong_types_with_path() {
        let err = validate_config(&json!({ "server": { "port": "http" } })).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad request: Invalid config at 'server.port': expected integer"
        );

        let err = validate_config(&json!({ "gemini": "key" })).unwrap_err();
        assert!(err.to_string().contains("'gemini': expected object"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = validate_config(&json!({ "pinecone": { "dimension": 0 } })).unwrap_err();
        assert!(err.to_string().contains("pinecone.dimension"));

        let err = validate_config(&json!({ "tts": { "encoding": "ogg" } })).unwrap_err();
        assert!(err.to_string().contains("expected one of mp3, wav"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = validate_config(&json!({
            "ingest": { "chunk_size": 100, "chunk_overlap": 100 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("ingest.chunk_overlap"));

        assert!(validate_config(&json!({ "ingest": { "chunk_size": 300 } })).is_ok());
    }
}
