//! End-to-end session tests over an in-memory WebSocket pipe.
//!
//! Each test plays the chat server on one end of a `tokio::io::duplex` pipe
//! and runs a real session on the other end.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use soop_chat_client::application::ConnectionState;
use soop_chat_client::domain::ChatConfig;
use soop_chat_client::infrastructure::{
    spawn_with_transport, ChatHandler, ChatSession, SessionError,
};
use soop_chat_core::events::{ChatEvent, EventPayload};
use soop_chat_core::protocol::codec::{encode_chat, encode_init, encode_join, KEEPALIVE_FRAME};

const WAIT: Duration = Duration::from_secs(5);
const FF: char = '\u{0c}';

// ── Test doubles ──────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Record {
    Connected,
    Event(ChatEvent, bool),
    Flushed,
}

/// Forwards every callback to the test body.
struct RecordingHandler {
    tx: mpsc::UnboundedSender<Record>,
}

impl ChatHandler for RecordingHandler {
    fn on_connect(&mut self) {
        let _ = self.tx.send(Record::Connected);
    }

    fn on_flush(&mut self) {
        let _ = self.tx.send(Record::Flushed);
    }

    fn on_event(&mut self, event: &ChatEvent, retained: bool) {
        let _ = self.tx.send(Record::Event(event.clone(), retained));
    }
}

type Server = WebSocketStream<DuplexStream>;

fn frame(opcode: &str, fields: &[&str]) -> String {
    let mut raw = format!("\u{1b}\t{opcode}00000000");
    for f in fields {
        raw.push(FF);
        raw.push_str(f);
    }
    raw
}

fn fast_config() -> ChatConfig {
    ChatConfig {
        keepalive_interval_ms: 50,
        prune_interval_ms: 20,
        ..ChatConfig::default()
    }
}

/// Spawns a session over a duplex pipe and returns the server end.
async fn start(
    config: ChatConfig,
) -> (ChatSession, Server, mpsc::UnboundedReceiver<Record>) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

    let (tx, rx) = mpsc::unbounded_channel();
    let session = spawn_with_transport(
        "12345".to_string(),
        Some("cookie".to_string()),
        config,
        RecordingHandler { tx },
        async move { Ok(client) },
    );
    (session, server, rx)
}

/// Reads the next text frame the client sent, skipping control frames.
async fn next_text(server: &mut Server) -> Option<String> {
    loop {
        match timeout(WAIT, server.next()).await.ok()?? {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn next_record(rx: &mut mpsc::UnboundedReceiver<Record>) -> Record {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a callback")
        .expect("handler dropped")
}

/// Runs the init/join handshake and waits for the connect callback.
async fn handshake(server: &mut Server, rx: &mut mpsc::UnboundedReceiver<Record>) {
    assert_eq!(next_text(server).await.as_deref(), Some(encode_init(Some("cookie")).as_str()));
    server.send(Message::Text(frame("0001", &["", ""]))).await.unwrap();

    assert_eq!(next_text(server).await.as_deref(), Some(encode_join("12345").as_str()));
    server
        .send(Message::Text(frame("0002", &["12345", "", "", "", "", ""])))
        .await
        .unwrap();

    assert!(matches!(next_record(rx).await, Record::Connected));
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_join_ack_activates_session_and_connects_once() {
    // Arrange
    let (session, mut server, mut rx) = start(ChatConfig::default()).await;

    // Act
    handshake(&mut server, &mut rx).await;

    // Assert
    assert_eq!(session.handle().state(), ConnectionState::Active);
    session.handle().close();
    assert!(matches!(next_record(&mut rx).await, Record::Flushed));
    session.wait().await;
    assert!(rx.recv().await.is_none(), "no callback may follow the flush");
}

#[tokio::test]
async fn test_keepalive_is_sent_after_join() {
    // Arrange
    let (session, mut server, mut rx) = start(fast_config()).await;
    handshake(&mut server, &mut rx).await;

    // Act
    let sent = next_text(&mut server).await;

    // Assert
    assert_eq!(sent.as_deref(), Some(KEEPALIVE_FRAME));
    session.handle().close();
    session.wait().await;
}

#[tokio::test]
async fn test_server_close_flushes_once_even_after_manual_close() {
    // Arrange
    let (session, mut server, mut rx) = start(fast_config()).await;
    handshake(&mut server, &mut rx).await;
    let handle = session.handle().clone();

    // Act – server goes away, then the host closes as well
    server.close(None).await.unwrap();
    drop(server);
    assert!(matches!(next_record(&mut rx).await, Record::Flushed));
    handle.close();
    handle.close();
    session.wait().await;

    // Assert
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert!(rx.recv().await.is_none(), "flush must be reported exactly once");
    assert_eq!(handle.send("late"), Err(SessionError::NotConnected));
}

#[tokio::test]
async fn test_transport_lost_without_close_frame_flushes_once() {
    // Arrange
    let (session, mut server, mut rx) = start(fast_config()).await;
    handshake(&mut server, &mut rx).await;
    let handle = session.handle().clone();

    // Act – the pipe vanishes with no closing handshake
    drop(server);
    assert!(matches!(next_record(&mut rx).await, Record::Flushed));
    handle.close();
    session.wait().await;

    // Assert
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert!(rx.recv().await.is_none(), "no callback may follow the flush");
    assert_eq!(handle.send("late"), Err(SessionError::NotConnected));
}

#[tokio::test]
async fn test_hidden_kicks_still_reach_the_callback() {
    // Arrange
    let (session, mut server, mut rx) = start(ChatConfig::default()).await;
    handshake(&mut server, &mut rx).await;

    // Act
    server.send(Message::Text(frame("0090", &["", "0"]))).await.unwrap();
    server
        .send(Message::Text(frame("0076", &["troll", "Troll"])))
        .await
        .unwrap();
    server
        .send(Message::Text(frame("0104", &["", "", "", "rules"])))
        .await
        .unwrap();

    // Assert
    let toggle = next_record(&mut rx).await;
    let kick = next_record(&mut rx).await;
    let notice = next_record(&mut rx).await;
    assert!(matches!(
        toggle,
        Record::Event(ChatEvent { payload: EventPayload::KickDisplayToggle { visible: false }, .. }, false)
    ));
    assert!(matches!(
        kick,
        Record::Event(ChatEvent { payload: EventPayload::Kick { .. }, .. }, false)
    ));
    assert!(matches!(notice, Record::Event(_, true)));

    let history = session.handle().snapshot().await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(matches!(history[0].payload, EventPayload::Notice { .. }));

    session.handle().close();
    session.wait().await;
}

#[tokio::test]
async fn test_binary_frames_are_decoded_as_utf8() {
    let (session, mut server, mut rx) = start(ChatConfig::default()).await;
    handshake(&mut server, &mut rx).await;

    let raw = frame("0005", &["안녕하세요", "u1", "", "", "", "User", "0|0", ""]);
    server.send(Message::Binary(raw.into_bytes())).await.unwrap();

    match next_record(&mut rx).await {
        Record::Event(event, true) => match event.payload {
            EventPayload::Message { text, nickname, .. } => {
                assert_eq!(text, "안녕하세요");
                assert_eq!(nickname, "User");
            }
            other => panic!("unexpected payload {other:?}"),
        },
        other => panic!("unexpected record {other:?}"),
    }

    session.handle().close();
    session.wait().await;
}

#[tokio::test]
async fn test_send_reaches_server_as_chat_packet() {
    // Arrange
    let (session, mut server, mut rx) = start(ChatConfig::default()).await;
    handshake(&mut server, &mut rx).await;

    // Act
    session.handle().send("hello 세계").unwrap();

    // Assert
    assert_eq!(next_text(&mut server).await, Some(encode_chat("hello 세계")));
    session.handle().close();
    session.wait().await;
}

#[tokio::test]
async fn test_broadcast_closed_ends_the_session() {
    // Arrange
    let (session, mut server, mut rx) = start(fast_config()).await;
    handshake(&mut server, &mut rx).await;

    // Act
    server.send(Message::Text(frame("0088", &[""]))).await.unwrap();

    // Assert
    assert!(matches!(next_record(&mut rx).await, Record::Flushed));
    session.handle().closed().await;
    assert_eq!(session.handle().state(), ConnectionState::Closed);
    session.wait().await;
}

#[tokio::test]
async fn test_threshold_change_trims_history() {
    // Arrange
    let (session, mut server, mut rx) = start(ChatConfig::default()).await;
    handshake(&mut server, &mut rx).await;
    for i in 0..5 {
        let text = format!("notice {i}");
        server
            .send(Message::Text(frame("0104", &["", "", "", text.as_str()])))
            .await
            .unwrap();
        next_record(&mut rx).await;
    }

    // Act
    session.handle().set_threshold(2).unwrap();
    let history = session.handle().snapshot().await.unwrap();

    // Assert
    let texts: Vec<String> = history
        .into_iter()
        .filter_map(|e| match e.payload {
            EventPayload::Notice { text } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["notice 3", "notice 4"]);

    session.handle().close();
    session.wait().await;
}
