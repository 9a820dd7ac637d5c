pub mod health;
pub mod ingest;
pub mod logs;
pub mod machines;
pub mod query;
pub mod tts;
