//! In-memory session store.
//!
//! The default store for single-process deployments and tests. Updates for a
//! given conversation id serialize on the map's per-key entry, so concurrent
//! recordings increment the counter exactly once each and no update is lost.
//! This store never reports a conflict.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;

use super::{
    ConversationSession, RegistryResult, SessionStore, TurnRecord,
};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, ConversationSession>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn record_turn(
        &self,
        conversation_id: &str,
        turn: &TurnRecord,
    ) -> RegistryResult<ConversationSession> {
        // The entry guard holds the key's shard for the whole update; no
        // await happens while it is held.
        let mut entry = self
            .sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                ConversationSession::new(
                    conversation_id,
                    turn.persona.as_deref().unwrap_or("default"),
                )
            });

        entry.turn_count += 1;
        entry.last_activity = OffsetDateTime::now_utc();
        if let Some(persona) = &turn.persona {
            entry.persona = persona.clone();
        }
        if let Some(metadata) = &turn.metadata {
            entry.metadata = Some(metadata.clone());
        }

        Ok(entry.value().clone())
    }

    async fn get(&self, conversation_id: &str) -> RegistryResult<Option<ConversationSession>> {
        Ok(self
            .sessions
            .get(conversation_id)
            .map(|entry| entry.value().clone()))
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}
