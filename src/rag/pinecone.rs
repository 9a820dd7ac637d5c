//! Pinecone data-plane client.
//!
//! Upserts are sent in batches of at most `UPSERT_BATCH_SIZE` vectors. The
//! index host is either configured directly or looked up once through the
//! control plane (`GET /indexes/{name}`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::store::{QueryMatch, VectorIndex, VectorRecord};
use crate::core::config::PineconeConfig;
use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "Api-Key";
const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH_SIZE: usize = 100;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

pub struct PineconeIndex {
    api_key: String,
    index_name: String,
    control_plane_url: String,
    namespace: Option<String>,
    host: OnceCell<String>,
    client: Client,
}

impl PineconeIndex {
    pub fn new(config: &PineconeConfig, client: Client) -> Self {
        let host = OnceCell::new();
        if let Some(configured) = config.host.as_deref().filter(|h| !h.trim().is_empty()) {
            let _ = host.set(normalize_host(configured));
        }
        Self {
            api_key: config.api_key.clone(),
            index_name: config.index.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
            host,
            client,
        }
    }

    async fn host(&self) -> Result<&str, ApiError> {
        let host = self
            .host
            .get_or_try_init(|| self.describe_index_host())
            .await?;
        Ok(host.as_str())
    }

    async fn describe_index_host(&self) -> Result<String, ApiError> {
        if self.index_name.is_empty() {
            return Err(ApiError::upstream(
                "pinecone",
                "neither an index host nor an index name is configured",
            ));
        }

        let url = format!("{}/indexes/{}", self.control_plane_url, self.index_name);
        let res = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await
            .map_err(|e| ApiError::upstream("pinecone", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(
                "pinecone",
                format!("describe index returned {}: {}", status, text),
            ));
        }

        let payload: DescribeIndexResponse = res
            .json()
            .await
            .map_err(|e| ApiError::upstream("pinecone", e))?;
        tracing::info!(
            "Resolved Pinecone index '{}' to host {}",
            self.index_name,
            payload.host
        );
        Ok(normalize_host(&payload.host))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.host().await?, route);
        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::upstream("pinecone", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(
                "pinecone",
                format!("{} returned {}: {}", route, status, text),
            ));
        }
        Ok(res)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, ApiError> {
        let mut upserted = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let body = UpsertRequest {
                vectors: batch,
                namespace: self.namespace.as_deref(),
            };
            let res = self.post("/vectors/upsert", &body).await?;
            let payload: UpsertResponse = res
                .json()
                .await
                .map_err(|e| ApiError::upstream("pinecone", e))?;
            upserted += payload.upserted_count.unwrap_or(batch.len());
        }
        Ok(upserted)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        machine_id: Option<&str>,
    ) -> Result<Vec<QueryMatch>, ApiError> {
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            filter: machine_id.map(|id| json!({ "machineId": { "$eq": id } })),
            namespace: self.namespace.as_deref(),
        };
        let res = self.post("/query", &body).await?;
        let payload: QueryResponse = res
            .json()
            .await
            .map_err(|e| ApiError::upstream("pinecone", e))?;
        Ok(payload.matches)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::VectorMetadata;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn index_with_host(host: &str) -> PineconeIndex {
        let config = PineconeConfig {
            api_key: "pc-key".to_string(),
            host: Some(host.to_string()),
            ..PineconeConfig::default()
        };
        PineconeIndex::new(&config, Client::new())
    }

    fn record(id: &str, text: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values: vec![0.1, 0.2],
            metadata: VectorMetadata {
                text: text.to_string(),
                machine_id: Some("m-1".to_string()),
                ..VectorMetadata::default()
            },
        }
    }

    #[test]
    fn hosts_default_to_https() {
        assert_eq!(normalize_host("idx-abc.svc.pinecone.io"), "https://idx-abc.svc.pinecone.io");
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[tokio::test]
    async fn query_sends_machine_filter_and_parses_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("Api-Key", "pc-key"))
            .and(body_partial_json(json!({
                "topK": 3,
                "includeMetadata": true,
                "filter": { "machineId": { "$eq": "m-1" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    { "id": "a", "score": 0.9, "metadata": { "text": "Conveyor A jam procedure", "machineId": "m-1" } },
                    { "id": "b", "score": 0.5 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let matches = index_with_host(&server.uri())
            .query(&[0.1, 0.2], 3, Some("m-1"))
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(
            matches[0].metadata.as_ref().map(|m| m.text.as_str()),
            Some("Conveyor A jam procedure")
        );
        assert!(matches[1].metadata.is_none());
    }

    #[tokio::test]
    async fn upsert_batches_and_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 100 })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 20 })))
            .mount(&server)
            .await;

        let records: Vec<VectorRecord> = (0..120)
            .map(|i| record(&format!("doc-{}", i), "text"))
            .collect();
        let upserted = index_with_host(&server.uri()).upsert(records).await.unwrap();

        assert_eq!(upserted, 120);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn host_is_resolved_once_through_control_plane() {
        let data_plane = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matches": [] })))
            .mount(&data_plane)
            .await;

        let control_plane = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/warehouse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "host": data_plane.uri() })))
            .expect(1)
            .mount(&control_plane)
            .await;

        let config = PineconeConfig {
            api_key: "pc-key".to_string(),
            index: "warehouse".to_string(),
            control_plane_url: control_plane.uri(),
            ..PineconeConfig::default()
        };
        let index = PineconeIndex::new(&config, Client::new());

        assert!(index.query(&[0.0], 1, None).await.unwrap().is_empty());
        assert!(index.query(&[0.0], 1, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_errors_are_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500).set_body_string("index unavailable"))
            .mount(&server)
            .await;

        let err = index_with_host(&server.uri())
            .query(&[0.1], 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(msg) if msg.contains("index unavailable")));
    }
}
