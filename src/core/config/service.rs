use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::settings::AppConfig;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 6] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
];

const SENSITIVE_WHITELIST: [&str; 1] = ["max_tokens"];

/// Environment variables layered over the YAML files, keyed to the config path
/// they override.
const ENV_OVERRIDES: [(&str, &[&str]); 17] = [
    ("PORT", &["server", "port"]),
    ("HOST", &["server", "host"]),
    ("DATABASE_URL", &["database", "url"]),
    ("GEMINI_API_KEY", &["gemini", "api_key"]),
    ("GEMINI_MODEL", &["gemini", "model"]),
    ("GEMINI_EMBEDDING_MODEL", &["gemini", "embedding_model"]),
    ("PINECONE_API_KEY", &["pinecone", "api_key"]),
    ("PINECONE_INDEX", &["pinecone", "index"]),
    ("PINECONE_INDEX_HOST", &["pinecone", "host"]),
    ("EMBEDDING_DIMENSION", &["pinecone", "dimension"]),
    ("STREAM_RETRIEVAL_TIMEOUT_MS", &["retrieval", "stream_timeout_ms"]),
    ("MAX_UPLOAD_MB", &["ingest", "max_upload_mb"]),
    ("MAX_UPLOAD_FILES", &["ingest", "max_upload_files"]),
    ("TTS_API_KEY", &["tts", "api_key"]),
    ("TTS_ENCODING", &["tts", "encoding"]),
    ("TTS_VOICE", &["tts", "voice_name"]),
    ("LOG_DIR", &["logging", "dir"]),
];

/// Loads the layered configuration: `config.yml`, then `secrets.yaml`, then
/// environment variables.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_path: PathBuf,
    secrets_path: PathBuf,
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigService {
    pub fn new() -> Self {
        let config_path = env::var("CREWMIND_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.yml"));
        let secrets_path = env::var("CREWMIND_SECRETS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("secrets.yaml"));
        Self::with_paths(config_path, secrets_path)
    }

    pub fn with_paths(config_path: PathBuf, secrets_path: PathBuf) -> Self {
        Self {
            config_path,
            secrets_path,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Merged, env-overridden and validated configuration document.
    pub fn load_raw(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path)?;
        let secrets_config = load_yaml_file(&self.secrets_path)?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |name| env::var(name).ok());
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn load(&self) -> Result<AppConfig, ApiError> {
        let raw = self.load_raw()?;
        tracing::debug!(
            "Effective configuration: {}",
            redact_sensitive_values(&raw)
        );
        serde_json::from_value(raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid config: {}", e)))
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ApiError::internal(format!("Failed to read {}: {}", path.display(), e))
    })?;
    match serde_yaml::from_str::<Value>(&contents) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(ApiError::BadRequest(format!(
            "Invalid config in {}: top level must be a mapping",
            path.display()
        ))),
        Err(e) => Err(ApiError::BadRequest(format!(
            "Invalid YAML in {}: {}",
            path.display(),
            e
        ))),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (name, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(name) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        ensure_object_path(config, path, env_value(path, raw));
    }
}

const NUMERIC_KEYS: [&str; 5] = [
    "port",
    "dimension",
    "stream_timeout_ms",
    "max_upload_mb",
    "max_upload_files",
];

/// Numeric settings become JSON numbers so they validate like YAML numbers.
fn env_value(path: &[&str], raw: &str) -> Value {
    let numeric = path
        .last()
        .map(|key| NUMERIC_KEYS.contains(key))
        .unwrap_or(false);
    if numeric {
        if let Ok(number) = raw.parse::<u64>() {
            return Value::from(number);
        }
    }
    Value::String(raw.to_string())
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::AudioEncoding;
    use serde_json::json;

    #[test]
    fn deep_merge_lets_secrets_override_public_values() {
        let public_config = json!({
            "gemini": { "api_key": "", "model": "gemini-1.5-flash" },
            "server": { "port": 8787 }
        });
        let secrets = json!({ "gemini": { "api_key": "secret" } });

        let merged = deep_merge(&public_config, &secrets);

        assert_eq!(
            merged,
            json!({
                "gemini": { "api_key": "secret", "model": "gemini-1.5-flash" },
                "server": { "port": 8787 }
            })
        );
    }

    #[test]
    fn env_overrides_create_missing_sections() {
        let mut config = json!({});
        apply_env_overrides(&mut config, |name| match name {
            "PORT" => Some("9000".to_string()),
            "PINECONE_INDEX" => Some("warehouse".to_string()),
            "TTS_ENCODING" => Some("wav".to_string()),
            "GEMINI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(
            config,
            json!({
                "server": { "port": 9000 },
                "pinecone": { "index": "warehouse" },
                "tts": { "encoding": "wav" }
            })
        );

        let typed: AppConfig = serde_json::from_value(config).unwrap();
        assert_eq!(typed.server.port, 9000);
        assert_eq!(typed.pinecone.index, "warehouse");
        assert_eq!(typed.tts.encoding, AudioEncoding::Wav);
        assert_eq!(typed.gemini.api_key, "");
    }

    #[test]
    fn redact_hides_keys_but_not_limits() {
        let input = json!({
            "gemini": { "api_key": "secret", "model": "m" },
            "tts": { "api_key": null, "max_tokens": 5 }
        });

        assert_eq!(
            redact_sensitive_values(&input),
            json!({
                "gemini": { "api_key": "****", "model": "m" },
                "tts": { "api_key": null, "max_tokens": 5 }
            })
        );
    }

    #[test]
    fn load_reads_yaml_and_secrets_files() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yml");
        let secrets_path = dir.path().join("secrets.yaml");
        fs::write(
            &config_path,
            "ingest:\n  chunk_size: 500\n  chunk_overlap: 50\npinecone:\n  dimension: 1024\n",
        )
        .unwrap();
        fs::write(&secrets_path, "pinecone:\n  api_key: pc-key\n").unwrap();

        let service = ConfigService::with_paths(config_path, secrets_path);
        let config = service.load().unwrap();

        assert_eq!(config.ingest.chunk_size, 500);
        assert_eq!(config.ingest.chunk_overlap, 50);
        assert_eq!(config.pinecone.dimension, 1024);
        assert_eq!(config.pinecone.api_key, "pc-key");
        assert_eq!(config.retrieval.stream_timeout_ms, 1200);
    }

    #[test]
    fn load_rejects_invalid_sections() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yml");
        fs::write(&config_path, "ingest:\n  chunk_size: 100\n  chunk_overlap: 100\n").unwrap();

        let service = ConfigService::with_paths(config_path, dir.path().join("missing.yaml"));
        let err = service.load_raw().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }
}
