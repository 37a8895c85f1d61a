//! OpenAI-compatible synthesis backend.
//!
//! Speaks the `/v1/audio/speech` JSON protocol. Used both for OpenAI itself
//! and for self-hosted fallback engines that expose the same surface, which
//! is what makes it the natural last link in a provider chain.

use serde_json::json;

use super::base::{AudioFormat, ProviderDescriptor};
use super::provider::SpeechBackend;

/// Default model when the descriptor names none.
const DEFAULT_MODEL: &str = "tts-1";

pub struct OpenAiCompatBackend {
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatBackend {
    pub fn new(descriptor: &ProviderDescriptor) -> Self {
        Self {
            endpoint: descriptor.endpoint.trim_end_matches('/').to_string(),
            api_key: descriptor.api_key.clone(),
            model: descriptor
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

impl SpeechBackend for OpenAiCompatBackend {
    fn build_request(
        &self,
        client: &reqwest::Client,
        text: &str,
        voice_id: &str,
        model: Option<&str>,
        format: AudioFormat,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/audio/speech", self.endpoint);
        let body = json!({
            "model": model.unwrap_or(&self.model),
            "input": text,
            "voice": voice_id,
            "response_format": format.as_str(),
        });

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body);
        // Local engines typically run keyless.
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        request
    }
}
