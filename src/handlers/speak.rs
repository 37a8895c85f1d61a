//! Text-to-speech handler, decoupled from live audio bridging.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderName, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use crate::core::synthesis::{AudioFormat, SynthesisRequest};
use crate::errors::AppResult;
use crate::state::AppState;

/// Response header naming the provider that actually served the request.
pub const PROVIDER_HEADER: HeaderName = HeaderName::from_static("x-tts-provider");

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Output format name; unknown values fall back to mp3.
    #[serde(default)]
    pub format: Option<String>,
}

fn default_voice() -> String {
    "alloy".to_string()
}

/// `POST /v1/speak`: synthesize text into audio bytes.
///
/// Returns the audio with a content type matching the produced format and
/// the serving provider in `x-tts-provider`. A provider failure is absorbed
/// by fallback; only an exhausted chain surfaces, as 502.
pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeakRequest>,
) -> AppResult<Response> {
    let format = request
        .format
        .as_deref()
        .map(AudioFormat::from_str_or_default)
        .unwrap_or_default();

    let synthesis_request = SynthesisRequest {
        text: request.text,
        voice: request.voice,
        model: request.model,
        format,
    };

    let result = state.synthesis.synthesize(&synthesis_request).await?;

    info!(
        provider = %result.provider,
        bytes = result.audio.len(),
        format = format.as_str(),
        "synthesis served"
    );

    Ok((
        [
            (header::CONTENT_TYPE, result.content_type.to_string()),
            (PROVIDER_HEADER, result.provider),
        ],
        result.audio,
    )
        .into_response())
}
