//! Speech synthesis gateway with provider failover.
//!
//! Converts text to audio via an ordered provider chain. Each call walks the
//! chain in configured order, skipping providers currently marked unhealthy;
//! any failure (HTTP error, timeout, empty audio body) marks that provider
//! unhealthy for a bounded window and falls through to the next. Exhausting
//! the chain raises [`SynthesisError::ChainExhausted`]; a silent or empty
//! audio result is never returned.
//!
//! The health table is the only synthesis state shared across sessions; it
//! lives in a `DashMap` of unhealthy-until deadlines.

mod base;
mod compat;
mod elevenlabs;
mod provider;
pub mod text;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

pub use base::{
    AVAILABLE_MODELS, AudioFormat, ProviderDescriptor, ProviderKind, SynthesisError,
    SynthesisRequest, SynthesisResult, SynthesizedAudio,
};
pub use compat::OpenAiCompatBackend;
pub use elevenlabs::ElevenLabsBackend;
pub use provider::{BoxedBackend, SpeechBackend, create_backend};

struct ProviderEntry {
    descriptor: ProviderDescriptor,
    backend: BoxedBackend,
}

/// Health snapshot of one chain member, for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub healthy: bool,
}

/// The synthesis gateway. One instance serves all sessions.
pub struct SynthesisGateway {
    providers: Vec<ProviderEntry>,
    /// Provider name -> deadline until which it is skipped.
    unhealthy_until: DashMap<String, Instant>,
    client: reqwest::Client,
    unhealthy_window: Duration,
    provider_timeout: Duration,
}

impl std::fmt::Debug for SynthesisGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisGateway")
            .field("providers", &self.providers.len())
            .field("unhealthy_until", &self.unhealthy_until.len())
            .field("unhealthy_window", &self.unhealthy_window)
            .field("provider_timeout", &self.provider_timeout)
            .finish()
    }
}

impl SynthesisGateway {
    /// Build a gateway from configured descriptors. Chain order is the
    /// descriptor order and never changes afterwards.
    pub fn new(
        descriptors: Vec<ProviderDescriptor>,
        unhealthy_window: Duration,
        provider_timeout: Duration,
    ) -> SynthesisResult<Self> {
        if descriptors.is_empty() {
            return Err(SynthesisError::InvalidConfiguration(
                "provider chain is empty".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for descriptor in &descriptors {
            if descriptor.name.is_empty() {
                return Err(SynthesisError::InvalidConfiguration(
                    "provider name must not be empty".to_string(),
                ));
            }
            if !seen.insert(descriptor.name.clone()) {
                return Err(SynthesisError::InvalidConfiguration(format!(
                    "duplicate provider name: {}",
                    descriptor.name
                )));
            }
        }

        let providers = descriptors
            .into_iter()
            .map(|descriptor| ProviderEntry {
                backend: create_backend(&descriptor),
                descriptor,
            })
            .collect();

        Ok(Self {
            providers,
            unhealthy_until: DashMap::new(),
            client: reqwest::Client::new(),
            unhealthy_window,
            provider_timeout,
        })
    }

    /// Synthesize speech, falling through the chain on provider failure.
    ///
    /// Dropping the returned future (caller disconnect) cancels the work; a
    /// request already dispatched to a provider may still complete on the
    /// provider side and is simply discarded.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> SynthesisResult<SynthesizedAudio> {
        let text = text::clean_for_speech(&request.text);
        if text.is_empty() {
            return Err(SynthesisError::EmptyInput);
        }

        for entry in &self.providers {
            let name = &entry.descriptor.name;
            if self.is_unhealthy(name) {
                debug!(provider = %name, "skipping unhealthy provider");
                continue;
            }

            let (voice_id, substituted) = entry.descriptor.resolve_voice(&request.voice);
            if substituted {
                debug!(
                    provider = %name,
                    voice = %request.voice,
                    default_voice = %voice_id,
                    "no voice mapping, substituting provider default"
                );
            }

            match self
                .call_provider(entry, &text, voice_id, request.model.as_deref(), request.format)
                .await
            {
                Ok(audio) => {
                    self.mark_healthy(name);
                    return Ok(SynthesizedAudio {
                        audio,
                        content_type: request.format.content_type(),
                        provider: name.clone(),
                    });
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "provider failed, falling through");
                    self.mark_unhealthy(name);
                }
            }
        }

        Err(SynthesisError::ChainExhausted)
    }

    async fn call_provider(
        &self,
        entry: &ProviderEntry,
        text: &str,
        voice_id: &str,
        model: Option<&str>,
        format: AudioFormat,
    ) -> SynthesisResult<bytes::Bytes> {
        let name = &entry.descriptor.name;
        let response = entry
            .backend
            .build_request(&self.client, text, voice_id, model, format)
            .timeout(self.provider_timeout)
            .send()
            .await
            .map_err(|e| SynthesisError::Provider(name.clone(), e.to_string()))?
            .error_for_status()
            .map_err(|e| SynthesisError::Provider(name.clone(), e.to_string()))?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Provider(name.clone(), e.to_string()))?;

        // An empty body is a failure: the caller gets real audio or an error,
        // never silence.
        if audio.is_empty() {
            return Err(SynthesisError::Provider(
                name.clone(),
                "empty audio body".to_string(),
            ));
        }
        Ok(audio)
    }

    fn is_unhealthy(&self, name: &str) -> bool {
        // Copy the deadline out so the map guard is released before any
        // mutation on the same shard.
        let deadline = match self.unhealthy_until.get(name) {
            Some(entry) => *entry,
            None => return false,
        };
        if deadline > Instant::now() {
            true
        } else {
            // Window expired; re-enable.
            self.unhealthy_until.remove(name);
            false
        }
    }

    fn mark_unhealthy(&self, name: &str) {
        self.unhealthy_until
            .insert(name.to_string(), Instant::now() + self.unhealthy_window);
    }

    fn mark_healthy(&self, name: &str) {
        self.unhealthy_until.remove(name);
    }

    /// Health snapshot of the whole chain, in chain order.
    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.providers
            .iter()
            .map(|entry| ProviderHealth {
                name: entry.descriptor.name.clone(),
                healthy: !self.is_unhealthy(&entry.descriptor.name),
            })
            .collect()
    }

    /// Canonical voice names known to any provider in the chain, sorted.
    pub fn canonical_voices(&self) -> Vec<String> {
        let mut voices = BTreeSet::new();
        for entry in &self.providers {
            voices.extend(entry.descriptor.voice_map.keys().cloned());
        }
        voices.into_iter().collect()
    }
}
