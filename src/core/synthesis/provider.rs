//! Backend trait and factory for synthesis providers.

use super::base::{AudioFormat, ProviderDescriptor, ProviderKind};
use super::compat::OpenAiCompatBackend;
use super::elevenlabs::ElevenLabsBackend;

/// Builds the provider-specific HTTP request for one synthesis call.
///
/// Implementations are pure request constructors; sending, timeouts, health
/// bookkeeping, and fallback all live in the gateway so every backend gets
/// identical failure semantics.
pub trait SpeechBackend: Send + Sync {
    /// `model` is the request-level model identifier, overriding the
    /// descriptor's configured model when present.
    fn build_request(
        &self,
        client: &reqwest::Client,
        text: &str,
        voice_id: &str,
        model: Option<&str>,
        format: AudioFormat,
    ) -> reqwest::RequestBuilder;
}

/// Boxed trait object for configured backends.
pub type BoxedBackend = Box<dyn SpeechBackend>;

/// Create the backend for a descriptor.
pub fn create_backend(descriptor: &ProviderDescriptor) -> BoxedBackend {
    match descriptor.kind {
        ProviderKind::Elevenlabs => Box::new(ElevenLabsBackend::new(descriptor)),
        ProviderKind::OpenaiCompat => Box::new(OpenAiCompatBackend::new(descriptor)),
    }
}
