//! YAML configuration file support.
//!
//! Every field is optional; values present in the file override whatever the
//! environment produced. The provider list replaces the environment-derived
//! chain wholesale when given, since chain order is part of its meaning.
//!
//! # Example
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//! backend:
//!   url: ws://voice-backend:8998/api/stream
//!   queue_frames: 256
//! synthesis:
//!   unhealthy_window_secs: 30
//!   provider_timeout_secs: 30
//!   providers:
//!     - name: elevenlabs
//!       kind: elevenlabs
//!       endpoint: https://api.elevenlabs.io
//!       api_key: xi-...
//!       default_voice: 21m00Tcm4TlvDq8ikWAM
//!       voice_map:
//!         alloy: 21m00Tcm4TlvDq8ikWAM
//!     - name: local
//!       kind: openai-compat
//!       endpoint: http://tts-fallback:8000
//!       default_voice: alloy
//! memory_sink_url: http://memory-store:8001/voice/memory/log
//! security:
//!   cors_allowed_origins: "*"
//!   rate_limit_requests_per_second: 60
//!   rate_limit_burst_size: 10
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::core::synthesis::ProviderDescriptor;

use super::ServerConfig;

#[derive(Debug, Default, Deserialize)]
pub struct YamlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub synthesis: SynthesisSection,
    #[serde(default)]
    pub memory_sink_url: Option<String>,
    #[serde(default)]
    pub security: SecuritySection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendSection {
    pub url: Option<String>,
    pub queue_frames: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SynthesisSection {
    pub unhealthy_window_secs: Option<u64>,
    pub provider_timeout_secs: Option<u64>,
    pub providers: Option<Vec<ProviderDescriptor>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecuritySection {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Overlay file values onto an environment-derived config.
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.server.host {
            config.host = host;
        }
        if let Some(port) = self.server.port {
            config.port = port;
        }
        if let Some(url) = self.backend.url {
            config.backend_url = url;
        }
        if let Some(frames) = self.backend.queue_frames {
            config.bridge_queue_frames = frames;
        }
        if let Some(secs) = self.synthesis.unhealthy_window_secs {
            config.unhealthy_window = Duration::from_secs(secs);
        }
        if let Some(secs) = self.synthesis.provider_timeout_secs {
            config.provider_timeout = Duration::from_secs(secs);
        }
        if let Some(providers) = self.synthesis.providers {
            config.synthesis_providers = providers;
        }
        if self.memory_sink_url.is_some() {
            config.memory_sink_url = self.memory_sink_url;
        }
        if let Some(origins) = self.security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = self.security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = self.security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synthesis::ProviderKind;

    #[test]
    fn test_full_file_parses() {
        let yaml = r#"
server:
  host: 127.0.0.1
  port: 9000
backend:
  url: ws://backend:8998/api/stream
  queue_frames: 64
synthesis:
  unhealthy_window_secs: 10
  providers:
    - name: primary
      kind: elevenlabs
      endpoint: https://api.elevenlabs.io
      api_key: key
      default_voice: v1
    - name: local
      kind: openai-compat
      endpoint: http://fallback:8000
      default_voice: alloy
security:
  cors_allowed_origins: "*"
"#;
        let parsed: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.server.port, Some(9000));
        let providers = parsed.synthesis.providers.unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].kind, ProviderKind::Elevenlabs);
        assert_eq!(providers[1].kind, ProviderKind::OpenaiCompat);
    }

    #[test]
    fn test_empty_file_parses_to_defaults() {
        let parsed: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(parsed.server.host.is_none());
        assert!(parsed.synthesis.providers.is_none());
    }
}
