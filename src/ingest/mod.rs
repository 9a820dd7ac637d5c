//! Document ingestion into the vector index.
//!
//! JSON documents are embedded whole, one record each. Uploaded files are
//! extracted, chunked and embedded chunk by chunk.

pub mod extract;

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::core::config::IngestConfig;
use crate::core::errors::ApiError;
use crate::rag::chunker::chunk;
use crate::rag::{EmbeddingAdapter, VectorIndex, VectorMetadata, VectorRecord};

pub use extract::{extract_text, extract_text_blocking, UploadedFile};

const UPLOAD_SOURCE: &str = "upload";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub machine_id: Option<String>,
}

#[derive(Clone)]
pub struct IngestService {
    embedder: EmbeddingAdapter,
    index: Arc<dyn VectorIndex>,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(embedder: EmbeddingAdapter, index: Arc<dyn VectorIndex>, config: IngestConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Embeds and upserts `documents`; returns the number of documents.
    pub async fn ingest_documents(&self, documents: Vec<Document>) -> Result<usize, ApiError> {
        for (i, doc) in documents.iter().enumerate() {
            if doc.id.trim().is_empty() {
                return Err(ApiError::BadRequest(format!("documents[{}].id must not be empty", i)));
            }
            if doc.text.is_empty() {
                return Err(ApiError::BadRequest(format!("documents[{}].text must not be empty", i)));
            }
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let records = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, values)| VectorRecord {
                id: doc.id,
                values,
                metadata: VectorMetadata {
                    text: doc.text,
                    machine_id: doc.machine_id.filter(|id| !id.is_empty()),
                    ..VectorMetadata::default()
                },
            })
            .collect::<Vec<_>>();

        let count = records.len();
        self.index.upsert(records).await?;
        tracing::info!("Ingested {} documents", count);
        Ok(count)
    }

    /// Extracts, chunks, embeds and upserts uploaded files. Returns the number
    /// of files ingested.
    pub async fn ingest_upload(
        &self,
        files: Vec<UploadedFile>,
        machine_id: Option<String>,
    ) -> Result<usize, ApiError> {
        self.check_upload_limits(&files)?;
        let machine_id = machine_id.filter(|id| !id.trim().is_empty());

        // Extract everything first so a bad file rejects the whole upload
        // before anything is written.
        let file_count = files.len();
        let mut chunked = Vec::with_capacity(file_count);
        for file in files {
            let file_name = file.file_name.clone();
            let text = extract_text_blocking(file).await?;
            if text.trim().is_empty() {
                return Err(ApiError::BadRequest(format!(
                    "no text could be extracted from '{}'",
                    file_name
                )));
            }
            let chunks = chunk(&text, self.config.chunk_size, self.config.chunk_overlap);
            tracing::debug!("'{}' split into {} chunks", file_name, chunks.len());
            chunked.push((file_name, chunks));
        }

        let mut records = Vec::new();
        for (file_name, chunks) in chunked {
            let vectors = self.embedder.embed(&chunks).await?;
            let file_id = Uuid::new_v4();
            records.extend(chunks.into_iter().zip(vectors).enumerate().map(
                |(i, (text, values))| VectorRecord {
                    id: format!("{}-{}", file_id, i),
                    values,
                    metadata: VectorMetadata {
                        text,
                        source: Some(UPLOAD_SOURCE.to_string()),
                        machine_id: machine_id.clone(),
                        file_name: Some(file_name.clone()),
                    },
                },
            ));
        }

        let written = self.index.upsert(records).await?;
        tracing::info!("Ingested {} uploaded files ({} chunks)", file_count, written);
        Ok(file_count)
    }

    fn check_upload_limits(&self, files: &[UploadedFile]) -> Result<(), ApiError> {
        if files.is_empty() {
            return Err(ApiError::BadRequest("no files uploaded".to_string()));
        }
        if files.len() > self.config.max_upload_files {
            return Err(ApiError::BadRequest(format!(
                "at most {} files may be uploaded at once",
                self.config.max_upload_files
            )));
        }
        let max_bytes = self.config.max_upload_bytes();
        if let Some(file) = files.iter().find(|f| f.bytes.len() > max_bytes) {
            return Err(ApiError::BadRequest(format!(
                "'{}' exceeds the {} MB upload limit",
                file.file_name, self.config.max_upload_mb
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::EmbeddingProvider;
    use crate::rag::QueryMatch;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
            Ok(vec![text.chars().count() as f32])
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        records: Mutex<Vec<VectorRecord>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, ApiError> {
            let count = records.len();
            self.records.lock().unwrap().extend(records);
            Ok(count)
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _machine_id: Option<&str>,
        ) -> Result<Vec<QueryMatch>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn service(index: Arc<RecordingIndex>, config: IngestConfig) -> IngestService {
        IngestService::new(EmbeddingAdapter::new(Arc::new(LengthEmbedder), 3), index, config)
    }

    fn text_file(name: &str, text: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: text.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn documents_become_one_record_each() {
        let index = Arc::new(RecordingIndex::default());
        let docs = vec![
            Document {
                id: "doc-1".into(),
                text: "Conveyor A jam procedure".into(),
                machine_id: Some("m-1".into()),
            },
            Document {
                id: "doc-2".into(),
                text: "Packer B reset".into(),
                machine_id: None,
            },
        ];

        let count = service(index.clone(), IngestConfig::default())
            .ingest_documents(docs)
            .await
            .unwrap();

        assert_eq!(count, 2);
        let records = index.records.lock().unwrap();
        assert_eq!(records[0].id, "doc-1");
        assert_eq!(records[0].values, vec![24.0, 0.0, 0.0]);
        assert_eq!(records[0].metadata.machine_id.as_deref(), Some("m-1"));
        assert_eq!(records[1].metadata.text, "Packer B reset");
        assert!(records[1].metadata.source.is_none());
    }

    #[tokio::test]
    async fn empty_document_text_is_rejected() {
        let index = Arc::new(RecordingIndex::default());
        let err = service(index.clone(), IngestConfig::default())
            .ingest_documents(vec![Document {
                id: "doc-1".into(),
                text: String::new(),
                machine_id: None,
            }])
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(index.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_document_list_writes_nothing() {
        let index = Arc::new(RecordingIndex::default());
        let count = service(index.clone(), IngestConfig::default())
            .ingest_documents(Vec::new())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn uploads_are_chunked_and_tagged() {
        let index = Arc::new(RecordingIndex::default());
        let config = IngestConfig {
            chunk_size: 10,
            chunk_overlap: 2,
            ..IngestConfig::default()
        };
        let files = vec![
            text_file("manual.txt", "abcdefghijklmnopqrst"),
            text_file("short.txt", "tiny"),
        ];

        let count = service(index.clone(), config)
            .ingest_upload(files, Some("m-3".into()))
            .await
            .unwrap();

        assert_eq!(count, 2);
        let records = index.records.lock().unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.metadata.text.as_str()).collect();
        assert_eq!(texts, vec!["abcdefghij", "ijklmnopqr", "qrst", "tiny"]);
        assert!(records[0].id.ends_with("-0"));
        assert!(records[2].id.ends_with("-2"));
        assert_ne!(
            records[0].id.rsplit_once('-').map(|(p, _)| p),
            records[3].id.rsplit_once('-').map(|(p, _)| p)
        );
        for record in records.iter() {
            assert_eq!(record.metadata.source.as_deref(), Some("upload"));
            assert_eq!(record.metadata.machine_id.as_deref(), Some("m-3"));
        }
        assert_eq!(records[3].metadata.file_name.as_deref(), Some("short.txt"));
    }

    #[tokio::test]
    async fn upload_limits_are_enforced() {
        let index = Arc::new(RecordingIndex::default());
        let config = IngestConfig {
            max_upload_files: 1,
            max_upload_mb: 1,
            ..IngestConfig::default()
        };
        let svc = service(index.clone(), config);

        assert!(svc.ingest_upload(Vec::new(), None).await.is_err());
        assert!(svc
            .ingest_upload(vec![text_file("a.txt", "a"), text_file("b.txt", "b")], None)
            .await
            .is_err());

        let big = UploadedFile {
            file_name: "big.txt".into(),
            content_type: None,
            bytes: vec![b'x'; 1024 * 1024 + 1],
        };
        let err = svc.ingest_upload(vec![big], None).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("big.txt")));
        assert!(index.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_file_rejects_whole_upload() {
        let index = Arc::new(RecordingIndex::default());
        let err = service(index.clone(), IngestConfig::default())
            .ingest_upload(vec![text_file("ok.txt", "Reset"), text_file("blank.txt", "   ")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("blank.txt")));
        assert!(index.records.lock().unwrap().is_empty());
    }
}
