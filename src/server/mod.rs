pub mod extract;
pub mod handlers;
pub mod ndjson;
pub mod router;
