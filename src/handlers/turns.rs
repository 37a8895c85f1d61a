//! Turn recording handlers.
//!
//! Records go to the session store; successful recordings are additionally
//! forwarded to the external memory/telemetry sink as fire-and-forget posts
//! that never delay or fail the caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::debug;

use crate::core::registry::{self, ConversationSession, TurnRecord, TurnRole};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordTurnRequest {
    pub conversation_id: String,
    pub role: TurnRole,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct RecordTurnResponse {
    pub conversation_id: String,
    pub turn_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

/// `POST /v1/turns`: record one conversation turn.
pub async fn record_turn(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecordTurnRequest>,
) -> AppResult<Json<RecordTurnResponse>> {
    let turn = TurnRecord {
        role: request.role,
        persona: request.persona,
        metadata: request.metadata,
    };

    let session =
        registry::record_turn_with_retry(state.registry.as_ref(), &request.conversation_id, &turn)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

    forward_to_memory_sink(&state, &session, request.role);

    Ok(Json(RecordTurnResponse {
        conversation_id: session.conversation_id,
        turn_count: session.turn_count,
        last_activity: session.last_activity,
    }))
}

/// `GET /v1/turns/{conversation_id}`: current conversation state.
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> AppResult<Json<ConversationSession>> {
    state
        .registry
        .get(&conversation_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map(Json)
        .ok_or(AppError::ConversationNotFound(conversation_id))
}

/// Forward a recorded turn to the external memory store, if configured.
/// Fire-and-forget: failures are logged at debug and never reach the caller.
fn forward_to_memory_sink(state: &Arc<AppState>, session: &ConversationSession, role: TurnRole) {
    let Some(sink_url) = state.config.memory_sink_url.clone() else {
        return;
    };

    let client = state.http.clone();
    let payload = json!({
        "conversation_id": session.conversation_id,
        "persona": session.persona,
        "role": role,
        "turn_count": session.turn_count,
        "source": "voice_gateway",
    });

    tokio::spawn(async move {
        match client.post(&sink_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                debug!(status = %response.status(), "memory sink rejected turn");
            }
            Err(e) => {
                debug!(error = %e, "memory sink unreachable");
            }
        }
    });
}
