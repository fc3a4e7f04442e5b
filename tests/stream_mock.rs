//! End-to-end streaming tests against a mock backend.
//!
//! Each test stands up a wiremock server speaking the backend's SSE wire
//! format and drives a `ChatSession` through it.


use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rill::backend::{BackendClient, BackendConfig, BackendErrorKind};
use rill::core::events::ChatEvent;
use rill::core::ingest::{ChatEventRx, StreamOutcome, create_event_channel};
use rill::core::session::ChatSession;
use rill::core::transcript::{Block, Role};

const SESSION_COOKIE: &str = "session=test-cookie";

fn backend_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        base_url: server.uri(),
        session_cookie: Some(SESSION_COOKIE.to_string()),
        request_timeout: Some(Duration::from_secs(5)),
    }
}

async fn mount_signed_in_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixtures::user_json(7, "ada", "ada@example.com")),
        )
        .mount(server)
        .await;
}

/// Session that already resolved a signed-in user against the mock server.
async fn signed_in_session(server: &MockServer) -> ChatSession {
    mount_signed_in_user(server).await;

    let client = BackendClient::new(backend_config(server)).unwrap();
    let mut session = ChatSession::new(client);
    let user = session.connect().await.unwrap().cloned();
    assert_eq!(user.map(|u| u.username), Some("ada".to_string()));
    session
}

async fn drain(mut rx: ChatEventRx) -> Vec<Arc<ChatEvent>> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_text_stream_assembles_one_final_block() {
    let server = MockServer::start().await;
    let mut session = signed_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/chat/message"))
        .and(query_param("message", "Hello"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(fixtures::sse_response(&fixtures::text_stream(
            &["Hi ", "there"],
            "!",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, rx) = create_event_channel();
    let outcome = session.send_message("Hello", tx).await.unwrap();
    assert_eq!(outcome, StreamOutcome::Completed);

    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text(), "Hello");

    let assistant = &turns[1];
    assert_eq!(assistant.role, Role::Assistant);
    assert!(!assistant.pending);
    assert_eq!(assistant.error, None);
    assert_eq!(
        assistant.blocks,
        vec![Block::Text {
            content: "Hi there!".to_string(),
            is_streaming: false,
        }]
    );

    // The published sequence ends with the synthetic close.
    let events = drain(rx).await;
    assert!(matches!(
        events.last().map(|e| e.as_ref()),
        Some(ChatEvent::Close)
    ));
}

#[tokio::test]
async fn test_tool_blocks_arrive_in_order() {
    let server = MockServer::start().await;
    let mut session = signed_in_session(&server).await;

    let mut body = fixtures::tool_use("search", json!({"q": "x"}));
    body.push_str(&fixtures::tool_result(
        "search",
        json!({"q": "x"}),
        json!({"hits": 3}),
    ));

    Mock::given(method("GET"))
        .and(path("/api/chat/message"))
        .respond_with(fixtures::sse_response(&body))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, rx) = create_event_channel();
    session.send_message("find x", tx).await.unwrap();

    let assistant = session.transcript().last_turn().unwrap();
    assert_eq!(assistant.blocks.len(), 2);
    assert!(matches!(
        &assistant.blocks[0],
        Block::ToolUse { tool_name, .. } if tool_name == "search"
    ));
    assert!(matches!(
        &assistant.blocks[1],
        Block::ToolResult { tool_result, .. } if *tool_result == json!({"hits": 3})
    ));
    assert!(!assistant.blocks.iter().any(Block::is_text));
    assert!(!assistant.pending);

    // Tool events are published reliably, in arrival order.
    let events = drain(rx).await;
    let kinds: Vec<_> = events.iter().map(|e| e.as_ref()).collect();
    assert!(matches!(kinds[0], ChatEvent::ToolUse { .. }));
    assert!(matches!(kinds[1], ChatEvent::ToolResult { .. }));
    assert!(matches!(kinds[2], ChatEvent::Close));
}

#[tokio::test]
async fn test_malformed_and_unknown_frames_are_skipped() {
    let server = MockServer::start().await;
    let mut session = signed_in_session(&server).await;

    let mut body = fixtures::init_response("Hi ");
    body.push_str("data: {not json at all\n\n");
    body.push_str(&fixtures::frame(&json!({"type": "usage", "tokens": 12})));
    body.push_str(&fixtures::final_response("there!"));

    Mock::given(method("GET"))
        .and(path("/api/chat/message"))
        .respond_with(fixtures::sse_response(&body))
        .mount(&server)
        .await;

    let (tx, _rx) = create_event_channel();
    let outcome = session.send_message("Hello", tx).await.unwrap();
    assert_eq!(outcome, StreamOutcome::Completed);

    let assistant = session.transcript().last_turn().unwrap();
    assert_eq!(assistant.text(), "Hi there!");
    assert_eq!(assistant.error, None);
}

#[tokio::test]
async fn test_rejected_open_annotates_turn_and_session_recovers() {
    let server = MockServer::start().await;
    let mut session = signed_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/chat/message"))
        .and(query_param("message", "first"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "agent unavailable"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (tx, rx) = create_event_channel();
    let err = session.send_message("first", tx).await.unwrap_err();
    let backend_err = err.downcast_ref::<rill::backend::BackendError>().unwrap();
    assert_eq!(backend_err.kind, BackendErrorKind::HttpStatus);
    assert!(backend_err.message.contains("agent unavailable"));

    // The failed turn is annotated and no longer pending.
    let assistant = session.transcript().last_turn().unwrap();
    assert!(!assistant.pending);
    assert!(assistant.error.as_deref().unwrap().contains("agent unavailable"));
    assert!(assistant.blocks.is_empty());

    // The synthetic error event reached the presentation layer.
    let events = drain(rx).await;
    assert!(matches!(
        events.last().map(|e| e.as_ref()),
        Some(ChatEvent::Error { .. })
    ));

    // Subsequent input is still accepted.
    Mock::given(method("GET"))
        .and(path("/api/chat/message"))
        .and(query_param("message", "second"))
        .respond_with(fixtures::sse_response(&fixtures::text_stream(&[], "ok")))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, _rx) = create_event_channel();
    let outcome = session.send_message("second", tx).await.unwrap();
    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(session.transcript().last_turn().unwrap().text(), "ok");
    assert_eq!(session.transcript().turns().len(), 4);
}

#[tokio::test]
async fn test_signed_out_backend_gates_sends() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "Missing cookie"})))
        .mount(&server)
        .await;

    let client = BackendClient::new(backend_config(&server)).unwrap();
    let mut session = ChatSession::new(client);
    assert!(session.connect().await.unwrap().is_none());

    let (tx, _rx) = create_event_channel();
    let err = session.send_message("hello", tx).await.unwrap_err();
    assert!(err.to_string().contains("Not signed in"));
    assert!(session.transcript().turns().is_empty());
}

#[tokio::test]
async fn test_current_user_round_trips() {
    let server = MockServer::start().await;
    mount_signed_in_user(&server).await;

    let client = BackendClient::new(backend_config(&server)).unwrap();
    let user = client.current_user().await.unwrap().unwrap();

    assert_eq!(user.id, 7);
    assert_eq!(user.username, "ada");
    assert_eq!(user.email, "ada@example.com");
}

#[tokio::test]
async fn test_cancel_mid_stream_leaves_turn_pending() {
    let server = MockServer::start().await;
    let mut session = signed_in_session(&server).await;

    // A stream that trickles in far slower than the cancellation below.
    Mock::given(method("GET"))
        .and(path("/api/chat/message"))
        .respond_with(
            fixtures::sse_response(&fixtures::text_stream(&["never rendered"], "!"))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let cancel_handle = cancel.clone();
    let (tx, _rx) = create_event_channel();

    let send = tokio::spawn(async move {
        let result = session
            .send_message_with_cancel("hello", tx, &cancel)
            .await;
        (result, session)
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel_handle.cancel();

    let (result, session) = send.await.unwrap();
    assert_eq!(result.unwrap(), StreamOutcome::Cancelled);

    // No partial-write corruption: the turn simply never resolved.
    let assistant = session.transcript().last_turn().unwrap();
    assert_eq!(assistant.role, Role::Assistant);
    assert!(assistant.pending);
    assert!(assistant.blocks.is_empty());
    assert_eq!(assistant.error, None);
    assert!(!session.is_streaming());
}
