use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] anyhow::Error),

    #[error("Failed to initialize database: {0}")]
    Database(#[source] anyhow::Error),
}
