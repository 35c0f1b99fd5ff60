//! Real HTTP through the reqwest adapter, served by wiremock.

use std::sync::Arc;
use std::time::Duration;

use convo_stream::adapters::{ReqwestHttpClient, StaticIdentity};
use convo_stream::client::{ChatClient, SendOptions};
use convo_stream::config::StreamConfig;
use convo_stream::error::{ConvoError, ProtocolError};
use convo_stream::events::{self, StreamEvent};
use convo_stream::models::StreamRequest;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_BODY: &str = "event: prompt_ready\ndata: {}\n\n\
: ping\n\n\
event: chunk\ndata: {\"text\":\"Olá\",\"index\":0}\n\n\
event: chunk\ndata: {\"text\":\"mundo\",\"index\":1}\n\n\
event: meta\ndata: {\"metadata\":{\"model\":\"wm\"}}\n\n\
data: [DONE]\n\n";

fn client_for(server: &MockServer, config: StreamConfig) -> ChatClient {
    let identity = StaticIdentity::new().with_guest_id("guest-7");
    ChatClient::with_http(
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(identity),
        config.with_base_url(server.uri()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_stream_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .and(header("accept", "text/event-stream"))
        .and(header("x-client-message-id", "wm-1"))
        .and(header("x-guest-id", "guest-7"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, StreamConfig::default());
    let (tx, mut rx) = events::channel();
    let request = StreamRequest::new("oi").with_client_message_id("wm-1");

    let outcome = client
        .stream(request, SendOptions::new(), Some(tx))
        .await
        .unwrap();

    assert_eq!(outcome.text, "Olámundo");
    assert_eq!(outcome.metadata, Some(serde_json::json!({"model": "wm"})));
    assert_eq!(outcome.stats.heartbeats, 1);
    assert_eq!(outcome.stats.bytes_received, SSE_BODY.len() as u64);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if !matches!(event, StreamEvent::Watchdog { .. }) {
            kinds.push(event.kind());
        }
    }
    assert_eq!(
        kinds,
        vec!["prompt_ready", "first_token", "chunk", "chunk", "meta", "done"]
    );
}

#[tokio::test]
async fn test_json_answer_falls_back_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "queued"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/ask"))
        .and(header("x-guest-id", "guest-7"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"message": "resposta via json"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, StreamConfig::default());
    let outcome = client
        .collect(StreamRequest::new("oi"), SendOptions::new())
        .await
        .unwrap();

    assert!(outcome.via_fallback);
    assert_eq!(outcome.text, "resposta via json");
}

#[tokio::test]
async fn test_slow_server_hits_fallback_guard() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(SSE_BODY, "text/event-stream")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "rápido"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = StreamConfig::default().with_fallback_timeout(Duration::from_millis(200));
    let client = client_for(&mock_server, config);
    let outcome = client
        .collect(StreamRequest::new("oi"), SendOptions::new())
        .await
        .unwrap();

    assert!(outcome.via_fallback);
    assert_eq!(outcome.text, "rápido");
}

#[tokio::test]
async fn test_server_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, StreamConfig::default());
    let err = client
        .collect(StreamRequest::new("oi"), SendOptions::new())
        .await
        .unwrap_err();

    match err.inner() {
        ConvoError::Protocol(ProtocolError::HttpStatus { status, message }) => {
            assert_eq!(*status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_backend() {
    let config = StreamConfig::default()
        .with_base_url("http://127.0.0.1:59998")
        .with_fallback(false);
    let client = ChatClient::with_http(
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(StaticIdentity::new()),
        config,
    )
    .unwrap();

    let err = client
        .collect(StreamRequest::new("oi"), SendOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), ConvoError::Transport(_)));
    assert!(err.is_user_visible());
}
