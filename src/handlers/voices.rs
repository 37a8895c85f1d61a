//! Model and voice listing handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::core::synthesis::AVAILABLE_MODELS;
use crate::state::AppState;

/// `GET /v1/models`: static synthesis model identifiers.
pub async fn list_models() -> Json<Value> {
    Json(json!({
        "models": AVAILABLE_MODELS,
    }))
}

/// `GET /v1/voices`: canonical voice names the configured chain can map.
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "voices": state.synthesis.canonical_voices(),
    }))
}
