use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{signaling, speak, turns, voices};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/session", post(signaling::accept_session))
        .route("/v1/speak", post(speak::speak_handler))
        .route("/v1/models", get(voices::list_models))
        .route("/v1/voices", get(voices::list_voices))
        .route("/v1/turns", post(turns::record_turn))
        .route("/v1/turns/{conversation_id}", get(turns::get_conversation))
        .layer(TraceLayer::new_for_http())
}
