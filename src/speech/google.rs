use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::SpeechSynthesizer;
use crate::core::config::{AudioEncoding, TtsConfig};
use crate::core::errors::ApiError;

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

/// Google Cloud Text-to-Speech over REST.
pub struct GoogleSpeech {
    api_key: String,
    base_url: String,
    language_code: String,
    voice_name: Option<String>,
    encoding: AudioEncoding,
    client: Client,
}

impl GoogleSpeech {
    /// `None` when no API key is configured.
    pub fn from_config(config: &TtsConfig, client: Client) -> Option<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())?;
        Some(Self {
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language_code: config.language_code.clone(),
            voice_name: config.voice_name.clone().filter(|v| !v.is_empty()),
            encoding: config.encoding,
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeech {
    fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/v1/text:synthesize", self.base_url);
        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language_code,
                name: self.voice_name.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: self.encoding.api_name(),
            },
        };

        let res = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::upstream("tts", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(
                "tts",
                format!("text:synthesize returned {}: {}", status, text),
            ));
        }

        let payload: SynthesizeResponse = res
            .json()
            .await
            .map_err(|e| ApiError::upstream("tts", e))?;
        if payload.audio_content.is_empty() {
            return Err(ApiError::upstream("tts", "response contained no audio"));
        }

        STANDARD
            .decode(payload.audio_content.as_bytes())
            .map_err(|e| ApiError::upstream("tts", format!("invalid audio payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, encoding: AudioEncoding) -> TtsConfig {
        TtsConfig {
            api_key: Some("tts-key".to_string()),
            base_url: base_url.to_string(),
            voice_name: Some("en-US-Standard-C".to_string()),
            encoding,
            ..TtsConfig::default()
        }
    }

    #[test]
    fn missing_key_disables_speech() {
        assert!(GoogleSpeech::from_config(&TtsConfig::default(), Client::new()).is_none());
        let blank = TtsConfig {
            api_key: Some("  ".to_string()),
            ..TtsConfig::default()
        };
        assert!(GoogleSpeech::from_config(&blank, Client::new()).is_none());
    }

    #[tokio::test]
    async fn synthesize_decodes_audio_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text:synthesize"))
            .and(query_param("key", "tts-key"))
            .and(body_partial_json(json!({
                "input": { "text": "Belt stopped." },
                "voice": { "languageCode": "en-US", "name": "en-US-Standard-C" },
                "audioConfig": { "audioEncoding": "LINEAR16" }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "audioContent": STANDARD.encode(b"RIFFdata") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let speech =
            GoogleSpeech::from_config(&config(&server.uri(), AudioEncoding::Wav), Client::new())
                .unwrap();
        assert_eq!(speech.encoding(), AudioEncoding::Wav);
        assert_eq!(speech.synthesize("Belt stopped.").await.unwrap(), b"RIFFdata".to_vec());
    }

    #[tokio::test]
    async fn api_errors_are_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text:synthesize"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let speech =
            GoogleSpeech::from_config(&config(&server.uri(), AudioEncoding::Mp3), Client::new())
                .unwrap();
        let err = speech.synthesize("hi").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(msg) if msg.contains("API key not valid")));
    }
}
