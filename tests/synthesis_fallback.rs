//! Provider chain failover tests with mocked provider backends.

use std::time::Duration;

use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aria_gateway::core::synthesis::{
    AudioFormat, ProviderDescriptor, ProviderKind, SynthesisError, SynthesisGateway,
    SynthesisRequest,
};

fn elevenlabs_descriptor(endpoint: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        name: "primary".to_string(),
        kind: ProviderKind::Elevenlabs,
        endpoint: endpoint.to_string(),
        api_key: Some("test-key".to_string()),
        model: None,
        default_voice: "voice-default".to_string(),
        voice_map: [("alloy".to_string(), "voice-alloy".to_string())]
            .into_iter()
            .collect(),
    }
}

fn compat_descriptor(name: &str, endpoint: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.to_string(),
        kind: ProviderKind::OpenaiCompat,
        endpoint: endpoint.to_string(),
        api_key: None,
        model: None,
        default_voice: "alloy".to_string(),
        voice_map: [("alloy".to_string(), "alloy".to_string())]
            .into_iter()
            .collect(),
    }
}

fn gateway(descriptors: Vec<ProviderDescriptor>, unhealthy_window: Duration) -> SynthesisGateway {
    SynthesisGateway::new(descriptors, unhealthy_window, Duration::from_secs(2)).unwrap()
}

fn request(voice: &str) -> SynthesisRequest {
    SynthesisRequest {
        text: "hello".to_string(),
        voice: voice.to_string(),
        model: None,
        format: AudioFormat::Mp3,
    }
}

#[tokio::test]
async fn test_primary_down_falls_back_with_nonempty_audio() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"FALLBACK-AUDIO".to_vec()))
        .mount(&fallback)
        .await;

    let gw = gateway(
        vec![
            elevenlabs_descriptor(&primary.uri()),
            compat_descriptor("local", &fallback.uri()),
        ],
        Duration::from_secs(30),
    );

    let result = gw.synthesize(&request("alloy")).await.unwrap();
    assert_eq!(result.provider, "local");
    assert!(!result.audio.is_empty());
    assert_eq!(result.content_type, "audio/mpeg");
}

#[tokio::test]
async fn test_exhausted_chain_errors_without_audio() {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;

    let gw = gateway(
        vec![elevenlabs_descriptor(&primary.uri())],
        Duration::from_secs(30),
    );

    let err = gw.synthesize(&request("alloy")).await.unwrap_err();
    assert!(matches!(err, SynthesisError::ChainExhausted));
}

#[tokio::test]
async fn test_empty_audio_body_counts_as_provider_failure() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;

    // Primary answers 200 with an empty body; silence must not be returned.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"REAL-AUDIO".to_vec()))
        .mount(&fallback)
        .await;

    let gw = gateway(
        vec![
            elevenlabs_descriptor(&primary.uri()),
            compat_descriptor("local", &fallback.uri()),
        ],
        Duration::from_secs(30),
    );

    let result = gw.synthesize(&request("alloy")).await.unwrap();
    assert_eq!(result.provider, "local");
}

#[tokio::test]
async fn test_unhealthy_provider_is_skipped_until_window_expires() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;

    // Primary fails exactly once, then recovers.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PRIMARY-AUDIO".to_vec()))
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"FALLBACK-AUDIO".to_vec()))
        .mount(&fallback)
        .await;

    let gw = gateway(
        vec![
            elevenlabs_descriptor(&primary.uri()),
            compat_descriptor("local", &fallback.uri()),
        ],
        Duration::from_millis(400),
    );

    // First call: primary fails, fallback serves, primary marked unhealthy.
    let first = gw.synthesize(&request("alloy")).await.unwrap();
    assert_eq!(first.provider, "local");
    assert_eq!(primary.received_requests().await.unwrap().len(), 1);

    // Second call inside the window: primary is skipped, not retried.
    let second = gw.synthesize(&request("alloy")).await.unwrap();
    assert_eq!(second.provider, "local");
    assert_eq!(primary.received_requests().await.unwrap().len(), 1);

    // After the window expires the primary is eligible again and serves.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let third = gw.synthesize(&request("alloy")).await.unwrap();
    assert_eq!(third.provider, "primary");
    assert_eq!(primary.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_voice_mapping_and_default_substitution() {
    let primary = MockServer::start().await;

    // Mapped voice hits its provider-specific id.
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-alloy"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"A".to_vec()))
        .expect(1)
        .mount(&primary)
        .await;
    // Unmapped voices substitute the provider default rather than failing.
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-default"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"B".to_vec()))
        .expect(1)
        .mount(&primary)
        .await;

    let gw = gateway(
        vec![elevenlabs_descriptor(&primary.uri())],
        Duration::from_secs(30),
    );

    gw.synthesize(&request("alloy")).await.unwrap();
    gw.synthesize(&request("unmapped-voice")).await.unwrap();

    primary.verify().await;
}

#[tokio::test]
async fn test_elevenlabs_request_path_includes_voice_id() {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1/text-to-speech/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"A".to_vec()))
        .mount(&primary)
        .await;

    let gw = gateway(
        vec![elevenlabs_descriptor(&primary.uri())],
        Duration::from_secs(30),
    );
    let result = gw.synthesize(&request("alloy")).await.unwrap();
    assert_eq!(result.provider, "primary");

    let requests = primary.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/v1/text-to-speech/voice-alloy");
    assert_eq!(
        requests[0].headers.get("xi-api-key").unwrap(),
        "test-key"
    );
}
