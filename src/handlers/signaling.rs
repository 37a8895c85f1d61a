//! Signaling handler: offer in, answer plus session id out.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::state::AppState;

/// Incoming offer. `conversation_id` and `persona` are optional; a missing
/// conversation id gets a fresh one so turn recording always has a target.
#[derive(Debug, Deserialize)]
pub struct SessionOffer {
    /// Session description text declaring the desired media.
    pub sdp: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionAnswer {
    pub session_id: Uuid,
    pub conversation_id: String,
    pub sdp: String,
    pub state: String,
}

/// `POST /v1/session`: negotiate a new peer session.
///
/// A malformed or audio-less offer is rejected with 422 and nothing is
/// created; on success the session is registered atomically in `Connecting`.
pub async fn accept_session(
    State(state): State<Arc<AppState>>,
    Json(offer): Json<SessionOffer>,
) -> AppResult<Json<SessionAnswer>> {
    let negotiated = state
        .peers
        .accept(&offer.sdp, offer.conversation_id, offer.persona)?;

    info!(
        session_id = %negotiated.session_id,
        active_sessions = state.peers.active_count(),
        "session accepted"
    );

    Ok(Json(SessionAnswer {
        session_id: negotiated.session_id,
        conversation_id: negotiated.conversation_id,
        sdp: negotiated.answer,
        state: "connecting".to_string(),
    }))
}
