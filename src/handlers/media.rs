//! Media WebSocket handler.
//!
//! Attaches a caller's media stream to a negotiated peer session and runs
//! the audio bridge for it. The session must exist and still be in
//! `Connecting`; a session can carry at most one media attachment over its
//! lifetime.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use tracing::info;
use uuid::Uuid;

use crate::core::bridge::{self, BridgeEnd};
use crate::core::peer::PeerState;
use crate::errors::AppError;
use crate::state::AppState;

/// Maximum WebSocket message size (10 MB), matching the largest frame any
/// reasonable audio codec produces with wide margin.
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// `GET /v1/session/{id}/media`: WebSocket upgrade for a session's media.
pub async fn media_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let session = match state.peers.get(session_id) {
        Some(session) => session,
        None => return AppError::SessionNotFound(session_id).into_response(),
    };
    if session.state() != PeerState::Connecting || !session.try_attach() {
        return AppError::MediaUnavailable(session_id).into_response();
    }

    info!(session_id = %session_id, "media attach requested");

    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state, session_id))
}

async fn handle_media_socket(socket: WebSocket, state: Arc<AppState>, session_id: Uuid) {
    let Some(session) = state.peers.get(session_id) else {
        // Closed between upgrade and attach; nothing to bridge.
        return;
    };

    let end = bridge::run(
        session,
        socket,
        &state.config.backend_url,
        state.config.bridge_queue_frames,
        Arc::clone(&state.registry),
    )
    .await;

    match end {
        BridgeEnd::CallerClosed => {
            state.peers.close(session_id);
        }
        BridgeEnd::Failed(error) => {
            state.peers.fail(session_id, &error);
        }
        // The manager already tore the session down.
        BridgeEnd::Cancelled => {}
    }
}
