//! End-to-end media bridge tests: a real caller WebSocket, a real gateway
//! server, and a mock voice-model backend that echoes audio frames.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use aria_gateway::config::ServerConfig;
use aria_gateway::core::synthesis::{ProviderDescriptor, ProviderKind};
use aria_gateway::routes;
use aria_gateway::state::AppState;

const AUDIO_OFFER: &str = "v=0\r\nm=audio 49170 RTP/AVP 0 8\r\n";

fn test_config(backend_url: String) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        backend_url,
        bridge_queue_frames: 64,
        synthesis_providers: vec![ProviderDescriptor {
            name: "local".to_string(),
            kind: ProviderKind::OpenaiCompat,
            endpoint: "http://127.0.0.1:1".to_string(),
            api_key: None,
            model: None,
            default_voice: "alloy".to_string(),
            voice_map: Default::default(),
        }],
        unhealthy_window: Duration::from_secs(30),
        provider_timeout: Duration::from_secs(1),
        memory_sink_url: None,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 100000,
        rate_limit_burst_size: 100,
    }
}

/// Mock backend: accepts one WebSocket connection and echoes binary frames.
async fn spawn_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_binary() && ws.send(msg).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// Start the gateway on an ephemeral port, returning its address.
async fn spawn_gateway(backend_url: String) -> SocketAddr {
    let state = AppState::new(test_config(backend_url)).unwrap();
    let app = axum::Router::new()
        .route(
            "/",
            axum::routing::get(aria_gateway::handlers::api::health_check),
        )
        .merge(routes::api::create_api_router())
        .merge(routes::media::create_media_router())
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn negotiate_session(gateway: SocketAddr, conversation_id: Option<&str>) -> String {
    let client = reqwest::Client::new();
    let mut body = json!({ "sdp": AUDIO_OFFER });
    if let Some(id) = conversation_id {
        body["conversation_id"] = json!(id);
    }
    let response: Value = client
        .post(format!("http://{gateway}/v1/session"))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    response["session_id"].as_str().unwrap().to_string()
}

async fn active_sessions(gateway: SocketAddr) -> u64 {
    let response: Value = reqwest::get(format!("http://{gateway}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    response["active_sessions"].as_u64().unwrap()
}

/// Poll the health endpoint until the active-session count reaches the
/// expected value or the deadline passes.
async fn wait_for_active_sessions(gateway: SocketAddr, expected: u64) {
    for _ in 0..40 {
        if active_sessions(gateway).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("active session count never reached {expected}");
}

#[tokio::test]
async fn test_frames_round_trip_in_order() {
    let backend = spawn_echo_backend().await;
    let gateway = spawn_gateway(format!("ws://{backend}")).await;
    let session_id = negotiate_session(gateway, None).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{gateway}/v1/session/{session_id}/media"
    ))
    .await
    .unwrap();

    for i in 0u8..10 {
        ws.send(Message::Binary(Bytes::from(vec![i; 4])))
            .await
            .unwrap();
    }

    // The echo backend returns every frame; per-direction order must hold
    // end to end (caller -> backend -> caller).
    for i in 0u8..10 {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for echoed frame")
            .unwrap()
            .unwrap();
        assert_eq!(msg.into_data(), Bytes::from(vec![i; 4]));
    }

    assert_eq!(active_sessions(gateway).await, 1);

    // A clean caller close ends the session.
    ws.close(None).await.unwrap();
    wait_for_active_sessions(gateway, 0).await;
}

#[tokio::test]
async fn test_backend_reply_text_records_assistant_turns() {
    // Backend that answers every binary frame with a text reply event.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut replies = 0u32;
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_binary() {
                replies += 1;
                let text = format!("reply number {replies}");
                if ws.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let gateway = spawn_gateway(format!("ws://{backend}")).await;
    let session_id = negotiate_session(gateway, Some("conv-e2e")).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{gateway}/v1/session/{session_id}/media"
    ))
    .await
    .unwrap();

    for _ in 0..2 {
        ws.send(Message::Binary(Bytes::from_static(b"\x01\x02")))
            .await
            .unwrap();
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for reply event")
            .unwrap()
            .unwrap();
        assert!(msg.is_text());
    }

    // Both distinct reply events land in the registry as assistant turns;
    // recording trails the forwarded event slightly, so poll.
    let mut last_seen = json!(null);
    for _ in 0..40 {
        let response = reqwest::get(format!("http://{gateway}/v1/turns/conv-e2e")).await.unwrap();
        if response.status().is_success() {
            let body: Value = response.json().await.unwrap();
            if body["turn_count"] == 2 {
                assert_eq!(body["persona"], "default");
                return;
            }
            last_seen = body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("assistant turns never reached 2, last seen: {last_seen}");
}

#[tokio::test]
async fn test_media_attach_to_unknown_session_is_rejected() {
    let backend = spawn_echo_backend().await;
    let gateway = spawn_gateway(format!("ws://{backend}")).await;

    let result = tokio_tungstenite::connect_async(format!(
        "ws://{gateway}/v1/session/{}/media",
        uuid::Uuid::new_v4()
    ))
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_second_media_attach_is_rejected() {
    let backend = spawn_echo_backend().await;
    let gateway = spawn_gateway(format!("ws://{backend}")).await;
    let session_id = negotiate_session(gateway, None).await;

    let url = format!("ws://{gateway}/v1/session/{session_id}/media");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    // Move the session out of Connecting with a first media frame.
    ws.send(Message::Binary(Bytes::from_static(b"\x00\x01")))
        .await
        .unwrap();
    // Wait until the frame has round-tripped so the state change happened.
    let _ = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for echoed frame");

    let second = tokio_tungstenite::connect_async(&url).await;
    assert!(second.is_err(), "second attach should be refused");
}

#[tokio::test]
async fn test_unreachable_backend_fails_session_but_closes_cleanly() {
    // Nothing listens on the backend address.
    let gateway = spawn_gateway("ws://127.0.0.1:1".to_string()).await;
    let session_id = negotiate_session(gateway, None).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{gateway}/v1/session/{session_id}/media"
    ))
    .await
    .unwrap();

    // The caller observes an orderly close, not an abrupt error.
    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break true,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break false,
            }
        }
    })
    .await
    .expect("timed out waiting for close");
    assert!(outcome, "caller should see a clean close");

    wait_for_active_sessions(gateway, 0).await;
}
