//! Application-level error type for HTTP handlers.
//!
//! Component modules define their own error enums (`SignalingError`,
//! `TransportError`, `SynthesisError`, `RegistryError`); this module unifies
//! the ones that are allowed to reach a caller into a single `AppError` with
//! an HTTP status mapping. Transport and bridge failures are handled where
//! they occur and never pass through here.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::core::peer::SignalingError;
use crate::core::synthesis::SynthesisError;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Offer negotiation failed; nothing was created.
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    /// Speech synthesis failed (invalid request or exhausted chain).
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// No peer session registered under this id.
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    /// No conversation recorded under this id.
    #[error("conversation {0} not found")]
    ConversationNotFound(String),

    /// The session exists but is not in a state that accepts a media attach.
    #[error("session {0} is not accepting media")]
    MediaUnavailable(Uuid),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for handler functions.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Signaling(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Synthesis(e) => match e {
                SynthesisError::ChainExhausted => StatusCode::BAD_GATEWAY,
                SynthesisError::Provider(_, _) => StatusCode::BAD_GATEWAY,
                SynthesisError::EmptyInput => StatusCode::BAD_REQUEST,
                SynthesisError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::SessionNotFound(_) | AppError::ConversationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::MediaUnavailable(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
