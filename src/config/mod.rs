//! Configuration module for the Aria Gateway.
//!
//! Configuration comes from three sources with the priority
//! YAML > environment variables > defaults. `.env` files are loaded into the
//! environment before any of this runs (see `main`).
//!
//! # Example
//! ```rust,no_run
//! use aria_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // YAML file with environment fallback
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

mod yaml;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::core::synthesis::{ProviderDescriptor, ProviderKind};

pub use yaml::YamlConfig;

/// Default public ElevenLabs voice ("Rachel") used when no voice id is
/// configured for the primary provider.
const ELEVENLABS_FALLBACK_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

/// Canonical voice names every default voice map covers.
const CANONICAL_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Configuration loading/validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration.
///
/// Contains everything needed to run the gateway:
/// - server settings (host, port)
/// - upstream voice-model backend address
/// - audio bridge tuning (queue depth)
/// - synthesis provider chain (ordered descriptors + voice maps)
/// - external memory sink address
/// - security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// WebSocket URL of the conversational voice-model backend.
    pub backend_url: String,

    /// Inbound frame queue depth per session before drop-oldest kicks in.
    pub bridge_queue_frames: usize,

    // Synthesis settings
    /// Ordered provider chain. Order is the fallback order.
    pub synthesis_providers: Vec<ProviderDescriptor>,
    /// How long a failed provider is skipped before being retried.
    pub unhealthy_window: Duration,
    /// Upper bound on any single provider call.
    pub provider_timeout: Duration,

    /// External memory/telemetry store that recorded turns are forwarded to.
    pub memory_sink_url: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all).
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address.
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting.
    pub rate_limit_burst_size: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            host: env_or("ARIA_HOST", "0.0.0.0"),
            port: env_parse("ARIA_PORT", 8080)?,
            backend_url: env_or("BACKEND_WS_URL", "ws://localhost:8998/api/stream"),
            bridge_queue_frames: env_parse("BRIDGE_QUEUE_FRAMES", 256)?,
            synthesis_providers: providers_from_env(),
            unhealthy_window: Duration::from_secs(env_parse("PROVIDER_UNHEALTHY_WINDOW_SECS", 30)?),
            provider_timeout: Duration::from_secs(env_parse("PROVIDER_TIMEOUT_SECS", 30)?),
            memory_sink_url: std::env::var("MEMORY_SINK_URL").ok(),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS").ok(),
            rate_limit_requests_per_second: env_parse("RATE_LIMIT_RPS", 60)?,
            rate_limit_burst_size: env_parse("RATE_LIMIT_BURST", 10)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment values filling
    /// anything the file leaves unset.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let yaml: YamlConfig = serde_yaml::from_str(&raw)?;
        let mut config = Self::from_env()?;
        yaml.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Socket address string the server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.synthesis_providers.is_empty() {
            return Err(ConfigError::Invalid(
                "no synthesis providers configured; set ELEVENLABS_API_KEY, \
                 OPENAI_API_KEY, or FALLBACK_TTS_URL, or supply a providers \
                 list in the config file"
                    .to_string(),
            ));
        }
        if self.bridge_queue_frames == 0 {
            return Err(ConfigError::Invalid(
                "bridge_queue_frames must be at least 1".to_string(),
            ));
        }
        if !self.backend_url.starts_with("ws://") && !self.backend_url.starts_with("wss://") {
            return Err(ConfigError::Invalid(format!(
                "backend_url must be a ws:// or wss:// URL, got {}",
                self.backend_url
            )));
        }
        Ok(())
    }
}

/// Build the default provider chain from provider credentials in the
/// environment. Chain order: ElevenLabs, then OpenAI, then a local
/// OpenAI-compatible fallback engine, present members only.
fn providers_from_env() -> Vec<ProviderDescriptor> {
    let mut providers = Vec::new();

    if let Ok(api_key) = std::env::var("ELEVENLABS_API_KEY") {
        let default_voice =
            env_or("ELEVENLABS_DEFAULT_VOICE", ELEVENLABS_FALLBACK_VOICE);
        // Every canonical voice maps onto the configured house voice unless a
        // YAML voice map overrides it.
        let voice_map: HashMap<String, String> = CANONICAL_VOICES
            .iter()
            .map(|v| (v.to_string(), default_voice.clone()))
            .collect();
        providers.push(ProviderDescriptor {
            name: "elevenlabs".to_string(),
            kind: ProviderKind::Elevenlabs,
            endpoint: env_or("ELEVENLABS_ENDPOINT", "https://api.elevenlabs.io"),
            api_key: Some(api_key),
            model: std::env::var("ELEVENLABS_MODEL").ok(),
            default_voice,
            voice_map,
        });
    }

    if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
        providers.push(ProviderDescriptor {
            name: "openai".to_string(),
            kind: ProviderKind::OpenaiCompat,
            endpoint: env_or("OPENAI_ENDPOINT", "https://api.openai.com"),
            api_key: Some(api_key),
            model: std::env::var("OPENAI_TTS_MODEL").ok(),
            default_voice: "alloy".to_string(),
            voice_map: identity_voice_map(),
        });
    }

    if let Ok(endpoint) = std::env::var("FALLBACK_TTS_URL") {
        providers.push(ProviderDescriptor {
            name: "local".to_string(),
            kind: ProviderKind::OpenaiCompat,
            endpoint,
            api_key: None,
            model: None,
            default_voice: "alloy".to_string(),
            voice_map: identity_voice_map(),
        });
    }

    providers
}

/// OpenAI-style engines use the canonical voice names directly.
fn identity_voice_map() -> HashMap<String, String> {
    CANONICAL_VOICES
        .iter()
        .map(|v| (v.to_string(), v.to_string()))
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("cannot parse {key}={raw}"))),
        Err(_) => Ok(default),
    }
}
