//! Per-session bidirectional audio bridging.
//!
//! For a negotiated peer session, the bridge couples the caller's media
//! WebSocket to the conversational voice-model backend:
//!
//! - caller -> backend: inbound frames pass through a bounded drop-oldest
//!   [`FrameQueue`], so a backend that cannot keep pace costs counted frame
//!   drops instead of unbounded buffering. Overruns are logged, never
//!   surfaced.
//! - backend -> caller: synthesized frames are forwarded directly in
//!   generation order.
//!
//! Ordering is preserved within each direction; the directions are
//! independent. Either side ending tears the bridge down: a backend
//! disconnect drives the session to `Failed`, a caller disconnect ends the
//! bridge without further backend contact. In every case the caller is sent
//! a clean close frame.
//!
//! The bridge references the session registry (it does not own it): each
//! distinct backend text event records an assistant turn for the session's
//! conversation.

pub mod queue;

use std::sync::Arc;

use axum::extract::ws::{Message as CallerMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as BackendMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::core::peer::{PeerSession, PeerState, TransportError};
use crate::core::registry::{self, SessionStore, TurnRecord, TurnRole};

pub use queue::FrameQueue;

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why the bridge ended. The media handler maps this onto the peer manager:
/// `CallerClosed` -> graceful close, `Failed` -> teardown, `Cancelled` ->
/// the manager already removed the session.
#[derive(Debug)]
pub enum BridgeEnd {
    /// The caller disconnected cleanly.
    CallerClosed,
    /// A transport error on either side ended the bridge.
    Failed(TransportError),
    /// The session was closed out from under the bridge.
    Cancelled,
}

/// Run the bridge for one session until either side ends it.
///
/// Dials the backend, then drives three pumps concurrently: caller reader,
/// queue-to-backend writer, and backend-to-caller forwarder. The session's
/// cancellation token is observed alongside them, so closing the session
/// ends all in-flight pulls and pushes promptly.
pub async fn run(
    session: Arc<PeerSession>,
    socket: WebSocket,
    backend_url: &str,
    queue_capacity: usize,
    store: Arc<dyn SessionStore>,
) -> BridgeEnd {
    let session_id = session.id();
    let cancel = session.cancellation();

    let backend = match connect_async(backend_url).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "backend dial failed");
            // The caller still sees a clean close.
            let mut socket = socket;
            let _ = socket.send(CallerMessage::Close(None)).await;
            return BridgeEnd::Failed(TransportError::Backend(e.to_string()));
        }
    };
    info!(session_id = %session_id, backend_url, "audio bridge established");

    let (mut caller_tx, mut caller_rx) = socket.split();
    let (mut backend_tx, mut backend_rx) = backend.split();
    let queue = FrameQueue::new(queue_capacity, session.dropped_frames_counter());

    let end = tokio::select! {
        _ = cancel.cancelled() => BridgeEnd::Cancelled,
        end = inbound_pump(&session, &mut caller_rx, &queue) => end,
        end = backend_writer(&session, &queue, &mut backend_tx) => end,
        end = outbound_pump(&session, &store, &mut backend_rx, &mut caller_tx) => end,
    };

    queue.close();

    // Whatever ended the bridge, the caller sees an orderly close; a backend
    // failure mid-call must not look like a crash from the outside.
    if !matches!(end, BridgeEnd::CallerClosed) {
        let _ = caller_tx.send(CallerMessage::Close(None)).await;
    }

    info!(
        session_id = %session_id,
        dropped_frames = session.dropped_frames(),
        end = ?end,
        "audio bridge ended"
    );
    end
}

/// caller -> queue. The first media frame moves the session to `Connected`.
async fn inbound_pump(
    session: &Arc<PeerSession>,
    caller_rx: &mut SplitStream<WebSocket>,
    queue: &FrameQueue,
) -> BridgeEnd {
    while let Some(msg) = caller_rx.next().await {
        match msg {
            Ok(CallerMessage::Binary(frame)) => {
                if session.state() == PeerState::Connecting {
                    session.advance(PeerState::Connected);
                    info!(session_id = %session.id(), "first media frame, session connected");
                }
                if queue.push(frame) {
                    debug!(
                        session_id = %session.id(),
                        dropped = queue.dropped(),
                        "inbound frame dropped under backpressure"
                    );
                }
            }
            Ok(CallerMessage::Close(_)) => return BridgeEnd::CallerClosed,
            // Ping/pong are answered by the socket layer; text frames carry
            // no media and are ignored.
            Ok(_) => {}
            Err(e) => {
                return BridgeEnd::Failed(TransportError::Peer(e.to_string()));
            }
        }
    }
    BridgeEnd::CallerClosed
}

/// queue -> backend, in receipt order.
async fn backend_writer(
    session: &Arc<PeerSession>,
    queue: &FrameQueue,
    backend_tx: &mut SplitSink<BackendSocket, BackendMessage>,
) -> BridgeEnd {
    while let Some(frame) = queue.pop().await {
        if let Err(e) = backend_tx.send(BackendMessage::Binary(frame)).await {
            warn!(session_id = %session.id(), error = %e, "backend write failed");
            return BridgeEnd::Failed(TransportError::Backend(e.to_string()));
        }
    }
    // Queue only closes during teardown; nothing left to deliver.
    BridgeEnd::Cancelled
}

/// backend -> caller, in generation order. Distinct text events from the
/// backend describe spoken replies; each one records an assistant turn
/// against the session's conversation.
async fn outbound_pump(
    session: &Arc<PeerSession>,
    store: &Arc<dyn SessionStore>,
    backend_rx: &mut SplitStream<BackendSocket>,
    caller_tx: &mut SplitSink<WebSocket, CallerMessage>,
) -> BridgeEnd {
    let mut last_reply = String::new();
    while let Some(msg) = backend_rx.next().await {
        match msg {
            Ok(BackendMessage::Binary(frame)) => {
                if let Err(e) = caller_tx.send(CallerMessage::Binary(frame)).await {
                    return BridgeEnd::Failed(TransportError::Peer(e.to_string()));
                }
            }
            Ok(BackendMessage::Text(text)) => {
                // Backends interleave text events with audio; pass them along.
                if let Err(e) = caller_tx
                    .send(CallerMessage::Text(text.to_string().into()))
                    .await
                {
                    return BridgeEnd::Failed(TransportError::Peer(e.to_string()));
                }
                record_reply_turn(session, store, text.as_str(), &mut last_reply).await;
            }
            Ok(BackendMessage::Close(_)) => {
                return BridgeEnd::Failed(TransportError::Backend(
                    "backend closed the connection".to_string(),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                return BridgeEnd::Failed(TransportError::Backend(e.to_string()));
            }
        }
    }
    BridgeEnd::Failed(TransportError::Backend("backend stream ended".to_string()))
}

/// Record one assistant turn for a backend reply event. Consecutive
/// duplicate events collapse to a single turn; recording failures are
/// logged and never disturb the bridge.
async fn record_reply_turn(
    session: &Arc<PeerSession>,
    store: &Arc<dyn SessionStore>,
    text: &str,
    last_reply: &mut String,
) {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() || normalized == *last_reply {
        return;
    }
    *last_reply = normalized;

    let turn = TurnRecord {
        role: TurnRole::Assistant,
        persona: Some(session.persona.clone()),
        metadata: None,
    };
    if let Err(e) =
        registry::record_turn_with_retry(store.as_ref(), &session.conversation_id, &turn).await
    {
        debug!(session_id = %session.id(), error = %e, "reply turn recording failed");
    }
}
