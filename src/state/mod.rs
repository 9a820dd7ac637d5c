use std::sync::Arc;
use std::time::Duration;

use crate::core::config::AppConfig;
use crate::db::Database;
use crate::ingest::IngestService;
use crate::llm::{EmbeddingProvider, GeminiClient, GenerativeModel};
use crate::rag::{EmbeddingAdapter, PineconeIndex, QueryPipeline, Retriever, VectorIndex};
use crate::speech::{GoogleSpeech, SpeechSynthesizer};

pub mod error;

use error::InitializationError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state. Read-only after startup.
///
/// Remote services sit behind trait objects so tests can swap in fakes
/// through [`AppState::from_parts`].
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub pipeline: QueryPipeline,
    pub ingest: IngestService,
    /// `None` when no text-to-speech key is configured.
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl AppState {
    /// Builds the production clients (Gemini, Pinecone, Google TTS) and
    /// opens the database.
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>, InitializationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| InitializationError::HttpClient(e.into()))?;

        let gemini = Arc::new(GeminiClient::new(&config.gemini, client.clone()));
        let index: Arc<dyn VectorIndex> =
            Arc::new(PineconeIndex::new(&config.pinecone, client.clone()));
        let speech = GoogleSpeech::from_config(&config.tts, client)
            .map(|speech| Arc::new(speech) as Arc<dyn SpeechSynthesizer>);
        if speech.is_none() {
            tracing::info!("No text-to-speech key configured; /tts is disabled");
        }

        let db = Database::connect(&config.database)
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;

        Ok(Self::from_parts(config, db, gemini.clone(), gemini, index, speech))
    }

    pub fn from_parts(
        config: AppConfig,
        db: Database,
        model: Arc<dyn GenerativeModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Arc<Self> {
        let embedding = EmbeddingAdapter::new(embedder, config.pinecone.dimension);
        let retriever = Retriever::new(embedding.clone(), index.clone());
        let pipeline = QueryPipeline::new(
            retriever,
            model,
            Duration::from_millis(config.retrieval.stream_timeout_ms),
        );
        let ingest = IngestService::new(embedding, index, config.ingest.clone());

        Arc::new(Self {
            config: Arc::new(config),
            db,
            pipeline,
            ingest,
            speech,
        })
    }
}
