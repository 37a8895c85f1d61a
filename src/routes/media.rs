use axum::{Router, routing::get};

use crate::handlers::media;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media WebSocket router.
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/session/{session_id}/media", get(media::media_handler))
}
