//! Peer session lifecycle management.
//!
//! This module owns the set of live transport sessions. Each signaling
//! exchange mints exactly one [`PeerSession`], tracked in an arena keyed by
//! session id. Sessions carry an explicit state machine and progress through
//! it forward only:
//!
//! ```text
//! New -> Connecting -> Connected -> { Failed, Closed }
//! ```
//!
//! `New -> Connecting` happens when the remote description is applied during
//! `accept`; `Connecting -> Connected` on the first media frame; any live
//! state moves to `Failed` on a transport error and to `Closed` on graceful
//! disconnect. A session is never resurrected after leaving the live set.

pub mod sdp;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use sdp::{MediaKind, MediaSection, SessionDescription, build_answer};

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while negotiating a new session.
///
/// These are the only peer errors surfaced to callers; everything after
/// negotiation is handled locally.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The offer could not be parsed as a session description.
    #[error("malformed offer: {0}")]
    MalformedOffer(String),

    /// The offer parsed but declared no audio media line.
    #[error("no audio track offered")]
    NoAudioTrack,
}

/// Transport-level failures. Logged and handled locally, never surfaced.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to the upstream voice-model backend failed.
    #[error("backend connection failed: {0}")]
    Backend(String),

    /// The peer's transport produced an error mid-session.
    #[error("peer transport error: {0}")]
    Peer(String),
}

// =============================================================================
// Session State
// =============================================================================

/// State of a peer session. Transitions are forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Created, remote description not yet applied.
    New,
    /// Remote description applied, waiting for media.
    Connecting,
    /// First media frame observed, bridge running.
    Connected,
    /// Torn down after a transport error.
    Failed,
    /// Gracefully disconnected.
    Closed,
}

impl PeerState {
    /// Whether the session is in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, PeerState::Failed | PeerState::Closed)
    }

    /// Forward-only transition check. Terminal states admit nothing.
    fn can_advance(self, next: PeerState) -> bool {
        match (self, next) {
            (PeerState::New, PeerState::Connecting) => true,
            (PeerState::Connecting, PeerState::Connected) => true,
            // Any live state may fail or close.
            (from, PeerState::Failed | PeerState::Closed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerState::New => write!(f, "new"),
            PeerState::Connecting => write!(f, "connecting"),
            PeerState::Connected => write!(f, "connected"),
            PeerState::Failed => write!(f, "failed"),
            PeerState::Closed => write!(f, "closed"),
        }
    }
}

// =============================================================================
// Peer Session
// =============================================================================

/// One live transport session between a caller and the gateway.
///
/// All mutable state is owned by the session itself; nothing here is shared
/// across sessions, so sessions progress fully independently.
pub struct PeerSession {
    id: Uuid,
    /// Conversation this session belongs to, for turn recording.
    pub conversation_id: String,
    pub persona: String,
    pub created_at: OffsetDateTime,
    /// The generated answer description.
    pub answer: String,
    /// Number of negotiated audio sections.
    pub audio_tracks: usize,
    state: Mutex<PeerState>,
    cancel: CancellationToken,
    dropped_frames: Arc<AtomicU64>,
    attached: AtomicBool,
}

impl PeerSession {
    fn new(
        id: Uuid,
        conversation_id: String,
        persona: String,
        answer: String,
        audio_tracks: usize,
    ) -> Self {
        Self {
            id,
            conversation_id,
            persona,
            created_at: OffsetDateTime::now_utc(),
            answer,
            audio_tracks,
            state: Mutex::new(PeerState::New),
            cancel: CancellationToken::new(),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            attached: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PeerState {
        *self.state.lock()
    }

    /// Advance the state machine. Returns `true` if the transition was taken,
    /// `false` if it was rejected (backward, repeated, or from a terminal
    /// state). Rejected transitions are logged and otherwise ignored so a
    /// repeated close stays a no-op.
    pub fn advance(&self, next: PeerState) -> bool {
        let mut state = self.state.lock();
        if state.can_advance(next) {
            debug!(session_id = %self.id, from = %*state, to = %next, "peer state transition");
            *state = next;
            true
        } else {
            debug!(
                session_id = %self.id,
                from = %*state,
                to = %next,
                "peer state transition rejected"
            );
            false
        }
    }

    /// Claim the session's single media attachment. Only the first caller
    /// wins; a session is never bridged twice.
    pub fn try_attach(&self) -> bool {
        !self.attached.swap(true, Ordering::SeqCst)
    }

    /// Token cancelled when the session is closed or fails; bridge pumps for
    /// this session observe it at every suspension point.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shared counter of inbound frames dropped under backpressure.
    pub fn dropped_frames_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped_frames)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Peer Connection Manager
// =============================================================================

/// Outcome of a successful `accept`.
#[derive(Debug, Clone)]
pub struct NegotiatedSession {
    pub session_id: Uuid,
    pub conversation_id: String,
    pub answer: String,
}

/// Owner of the live session arena.
///
/// Lookup, close, and shutdown operate per-entry; no operation holds a lock
/// across an await point, so closing one session never blocks the rest.
#[derive(Default)]
pub struct PeerConnectionManager {
    sessions: DashMap<Uuid, Arc<PeerSession>>,
}

impl PeerConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Negotiate a new session from an offer.
    ///
    /// The offer must parse and carry at least one audio media line; anything
    /// else is rejected and nothing is created. On success the session is
    /// fully constructed (answer generated, remote description applied, state
    /// `Connecting`) before it is inserted, so a partially-registered session
    /// is never observable.
    pub fn accept(
        &self,
        offer: &str,
        conversation_id: Option<String>,
        persona: Option<String>,
    ) -> Result<NegotiatedSession, SignalingError> {
        let description = SessionDescription::parse(offer)?;
        if !description.has_audio() {
            return Err(SignalingError::NoAudioTrack);
        }

        let conversation_id =
            conversation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let persona = persona.unwrap_or_else(|| "default".to_string());
        let audio_tracks = description.audio_sections().count();

        let id = Uuid::new_v4();
        let answer = build_answer(&description, id);
        let session = Arc::new(PeerSession::new(
            id,
            conversation_id.clone(),
            persona,
            answer.clone(),
            audio_tracks,
        ));

        // Applying the remote description moves New -> Connecting.
        session.advance(PeerState::Connecting);

        self.sessions.insert(id, session);
        info!(session_id = %id, audio_tracks, "peer session negotiated");

        Ok(NegotiatedSession {
            session_id: id,
            conversation_id,
            answer,
        })
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<PeerSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of sessions currently in the live set.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Close a session gracefully. Idempotent: the second close of the same
    /// id finds nothing in the arena and is a no-op. Returns `true` if this
    /// call performed the close.
    pub fn close(&self, id: Uuid) -> bool {
        match self.sessions.remove(&id) {
            Some((_, session)) => {
                session.advance(PeerState::Closed);
                session.cancel.cancel();
                info!(
                    session_id = %id,
                    dropped_frames = session.dropped_frames(),
                    "peer session closed"
                );
                true
            }
            None => false,
        }
    }

    /// Tear a session down after a transport error.
    pub fn fail(&self, id: Uuid, error: &TransportError) -> bool {
        match self.sessions.remove(&id) {
            Some((_, session)) => {
                session.advance(PeerState::Failed);
                session.cancel.cancel();
                warn!(session_id = %id, error = %error, "peer session failed");
                true
            }
            None => false,
        }
    }

    /// Close every active session exactly once.
    ///
    /// `remove` is atomic per id, so even a shutdown racing a concurrent
    /// close results in a single close per session. Returns the number of
    /// sessions this call closed.
    pub fn shutdown(&self) -> usize {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;
        for id in ids {
            if self.close(id) {
                closed += 1;
            }
        }
        info!(closed, "peer connection manager shut down");
        closed
    }
}
