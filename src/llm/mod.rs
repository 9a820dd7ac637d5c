pub mod gemini;
pub mod provider;
pub mod types;


pub use gemini::GeminiClient;
pub use provider::{EmbeddingProvider, FragmentReceiver, GenerativeModel};
