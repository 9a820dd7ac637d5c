//! VectorIndex trait: abstract interface for the remote similarity-search backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Metadata stored next to every vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMetadata {
    /// The text the vector was computed from; returned as query context.
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// A record as written to the index. `values.len()` is the index dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<VectorMetadata>,
}

/// Abstract trait for vector index backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records; returns how many were written.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, ApiError>;

    /// Up to `top_k` nearest neighbours, restricted to records tagged with
    /// `machine_id` when one is given.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        machine_id: Option<&str>,
    ) -> Result<Vec<QueryMatch>, ApiError>;
}
