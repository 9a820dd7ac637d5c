pub mod core;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod server;
pub mod speech;
pub mod state;
