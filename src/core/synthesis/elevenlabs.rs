//! ElevenLabs synthesis backend.
//!
//! # API Reference
//!
//! - Endpoint: `POST {base}/v1/text-to-speech/{voice_id}`
//! - Auth: `xi-api-key` header
//! - Output selected via the `output_format` query parameter

use serde_json::json;

use super::base::{AudioFormat, ProviderDescriptor};
use super::provider::SpeechBackend;

/// Default ElevenLabs model when the descriptor names none.
const DEFAULT_MODEL: &str = "eleven_turbo_v2_5";

pub struct ElevenLabsBackend {
    endpoint: String,
    api_key: String,
    model: String,
}

impl ElevenLabsBackend {
    pub fn new(descriptor: &ProviderDescriptor) -> Self {
        Self {
            endpoint: descriptor.endpoint.trim_end_matches('/').to_string(),
            api_key: descriptor.api_key.clone().unwrap_or_default(),
            model: descriptor
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn output_format(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Mp3 => "mp3_44100_128",
            AudioFormat::Opus => "opus_48000_64",
            AudioFormat::Pcm => "pcm_24000",
        }
    }

    /// Map a request-level model name onto an ElevenLabs model id. The
    /// generic "tts-1-hd" selects the highest-quality model; everything else
    /// uses the configured default.
    fn model_id(&self, model: Option<&str>) -> &str {
        match model {
            Some("tts-1-hd") => "eleven_multilingual_v2",
            _ => &self.model,
        }
    }
}

impl SpeechBackend for ElevenLabsBackend {
    fn build_request(
        &self,
        client: &reqwest::Client,
        text: &str,
        voice_id: &str,
        model: Option<&str>,
        format: AudioFormat,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/text-to-speech/{voice_id}", self.endpoint);
        // Voice settings tuned for conversational replies: stability low
        // enough for natural variation, speaker boost for clarity.
        let body = json!({
            "text": text,
            "model_id": self.model_id(model),
            "voice_settings": {
                "stability": 0.40,
                "similarity_boost": 0.75,
                "use_speaker_boost": true,
            },
        });

        client
            .post(url)
            .query(&[("output_format", Self::output_format(format))])
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
    }
}
