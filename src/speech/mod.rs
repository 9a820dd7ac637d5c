//! Text-to-speech backends.

pub mod google;

use async_trait::async_trait;

use crate::core::config::AudioEncoding;
use crate::core::errors::ApiError;

pub use google::GoogleSpeech;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Format of the bytes returned by `synthesize`.
    fn encoding(&self) -> AudioEncoding;

    /// Renders `text` to audio.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError>;
}
