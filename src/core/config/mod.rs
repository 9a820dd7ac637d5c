pub mod service;
pub mod settings;
pub mod validation;

pub use service::ConfigService;
pub use settings::{
    AppConfig, AudioEncoding, DatabaseConfig, GeminiConfig, IngestConfig, LoggingConfig,
    PineconeConfig, RetrievalConfig, ServerConfig, TtsConfig,
};
