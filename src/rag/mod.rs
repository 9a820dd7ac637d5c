//! Retrieval-augmented answering.
//!
//! This module provides:
//! - `chunker` / `embedding`: text preparation for the vector index
//! - `PineconeIndex`: the `VectorIndex` used in production
//! - `Retriever`: similarity search with degrade-to-empty semantics
//! - `QueryPipeline`: prompt assembly, generation and answer streaming

pub mod chunker;
pub mod embedding;
pub mod pinecone;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod sanitize;
pub mod store;

pub use embedding::EmbeddingAdapter;
pub use pinecone::PineconeIndex;
pub use pipeline::{QueryAnswer, QueryPipeline, QueryRequest, StreamRecord};
pub use retrieval::Retriever;
pub use store::{QueryMatch, VectorIndex, VectorMetadata, VectorRecord};
