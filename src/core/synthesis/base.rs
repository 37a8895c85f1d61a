//! Base types for the speech synthesis gateway.
//!
//! Providers are described by configuration ([`ProviderDescriptor`]) rather
//! than hardcoded: an ordered list of descriptors plus per-provider voice
//! maps is injected at startup, so deployments can reorder or swap providers
//! without code changes.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during speech synthesis.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// A single provider call failed. Triggers fallback; only surfaced if
    /// the whole chain is exhausted.
    #[error("provider {0} failed: {1}")]
    Provider(String, String),

    /// Every provider in the chain failed or was unhealthy.
    #[error("all synthesis providers failed")]
    ChainExhausted,

    /// The input text was empty (or empty after normalization).
    #[error("empty input text")]
    EmptyInput,

    /// The provider chain configuration is unusable.
    #[error("invalid synthesis configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for synthesis operations.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

// =============================================================================
// Audio Format
// =============================================================================

/// Output audio container/encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MP3, 44.1kHz
    #[default]
    Mp3,
    /// Opus, 48kHz
    Opus,
    /// Raw PCM 16-bit signed little-endian, 24kHz
    Pcm,
}

impl AudioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Pcm => "pcm",
        }
    }

    /// Content type declared on responses carrying this format.
    pub fn content_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Opus => "audio/opus",
            AudioFormat::Pcm => "audio/pcm",
        }
    }

    /// Parse a format name, falling back to the default for unknown values.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "opus" => AudioFormat::Opus,
            "pcm" => AudioFormat::Pcm,
            _ => AudioFormat::default(),
        }
    }
}

// =============================================================================
// Request / Response
// =============================================================================

/// One synthesis call. Transient, created per request.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    /// Canonical voice name; mapped per provider via its voice map.
    pub voice: String,
    /// Model identifier, passed through to providers that take one.
    pub model: Option<String>,
    pub format: AudioFormat,
}

/// Synthesized audio plus the metadata callers rely on: the declared content
/// type always matches the produced format, and `provider` names which chain
/// member actually served the request.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio: Bytes,
    pub content_type: &'static str,
    pub provider: String,
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// ElevenLabs REST API (`/v1/text-to-speech/{voice_id}`).
    Elevenlabs,
    /// OpenAI-style `/v1/audio/speech`; also spoken by local fallback engines.
    OpenaiCompat,
}

/// Configured description of one synthesis provider.
///
/// Chain position is the descriptor's position in the configured list;
/// ordering is deterministic and fixed at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique name, reported in the `x-tts-provider` response header.
    pub name: String,
    pub kind: ProviderKind,
    /// Base URL of the provider API.
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Provider-side model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// Voice used when the requested canonical voice has no mapping.
    pub default_voice: String,
    /// Canonical voice name -> provider-specific voice id.
    #[serde(default)]
    pub voice_map: HashMap<String, String>,
}

impl ProviderDescriptor {
    /// Resolve a canonical voice name to this provider's voice id, falling
    /// back to the provider's default voice when no mapping exists.
    pub fn resolve_voice(&self, voice: &str) -> (&str, bool) {
        match self.voice_map.get(voice) {
            Some(id) => (id.as_str(), false),
            None => (self.default_voice.as_str(), true),
        }
    }
}

/// Static model identifiers advertised by the listing endpoint.
pub const AVAILABLE_MODELS: &[&str] = &["tts-1", "tts-1-hd"];
