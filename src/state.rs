//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::peer::PeerConnectionManager;
use crate::core::registry::{InMemorySessionStore, SessionStore};
use crate::core::synthesis::{SynthesisError, SynthesisGateway};

/// State shared by all handlers. Everything here is either immutable
/// configuration or internally synchronized.
pub struct AppState {
    pub config: ServerConfig,
    pub peers: PeerConnectionManager,
    pub registry: Arc<dyn SessionStore>,
    pub synthesis: SynthesisGateway,
    /// Client used for fire-and-forget forwarding to the memory sink.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, SynthesisError> {
        let synthesis = SynthesisGateway::new(
            config.synthesis_providers.clone(),
            config.unhealthy_window,
            config.provider_timeout,
        )?;

        Ok(Arc::new(Self {
            config,
            peers: PeerConnectionManager::new(),
            registry: Arc::new(InMemorySessionStore::new()),
            synthesis,
            http: reqwest::Client::new(),
        }))
    }
}
