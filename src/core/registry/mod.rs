//! Conversation turn tracking, independent of transport.
//!
//! The registry records turns per conversation id behind the [`SessionStore`]
//! trait so deployments can swap the in-memory store for a durable one.
//! Creation is idempotent on conversation id: the first recorded turn creates
//! the session, later turns update it. Turn counts are monotonically
//! non-decreasing and each recorded turn increments the counter exactly once,
//! even under concurrency. No delete operation exists here; retention is an
//! external collaborator's policy.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

pub use memory::InMemorySessionStore;

/// How many times a conflicted recording is retried before giving up.
/// The in-memory store never conflicts; this bounds transactional stores.
const MAX_RECORD_ATTEMPTS: u32 = 16;

// =============================================================================
// Error Types
// =============================================================================

/// Errors a session store may produce.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A concurrent update raced this one. Resolved by retry at the call
    /// site, never surfaced to callers.
    #[error("concurrent update conflict for conversation {0}")]
    Conflict(String),

    /// The store itself failed (durable backends only).
    #[error("session store error: {0}")]
    Store(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Types
// =============================================================================

/// Speaker role of a recorded turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// The logical multi-turn exchange, decoupled from any live transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub conversation_id: String,
    pub persona: String,
    pub turn_count: u64,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    /// Opaque caller-supplied metadata, last write wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ConversationSession {
    pub fn new(conversation_id: &str, persona: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            conversation_id: conversation_id.to_string(),
            persona: persona.to_string(),
            turn_count: 0,
            active: true,
            started_at: now,
            last_activity: now,
            metadata: None,
        }
    }
}

/// One turn to record.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub role: TurnRole,
    pub persona: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

// =============================================================================
// Store Trait
// =============================================================================

/// Pluggable conversation store.
///
/// Implementations must serialize concurrent recordings for the same
/// conversation id so no update is lost; stores that detect a race instead
/// of serializing return [`RegistryError::Conflict`] and the caller retries.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record one turn. Creates the session on first call for the id,
    /// increments the turn counter exactly once per call.
    async fn record_turn(
        &self,
        conversation_id: &str,
        turn: &TurnRecord,
    ) -> RegistryResult<ConversationSession>;

    /// Fetch the current state of a conversation.
    async fn get(&self, conversation_id: &str) -> RegistryResult<Option<ConversationSession>>;

    /// Number of tracked conversations.
    async fn len(&self) -> usize;
}

/// Record a turn, absorbing conflicts by retrying.
///
/// `Conflict` never escapes this function short of `MAX_RECORD_ATTEMPTS`
/// consecutive losses, which indicates a broken store rather than contention.
pub async fn record_turn_with_retry(
    store: &dyn SessionStore,
    conversation_id: &str,
    turn: &TurnRecord,
) -> RegistryResult<ConversationSession> {
    let mut attempt = 0;
    loop {
        match store.record_turn(conversation_id, turn).await {
            Err(RegistryError::Conflict(_)) if attempt < MAX_RECORD_ATTEMPTS => {
                attempt += 1;
                debug!(conversation_id, attempt, "registry conflict, retrying");
            }
            other => return other,
        }
    }
}
