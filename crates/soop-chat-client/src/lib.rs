//! soop-chat-client library crate.
//!
//! This crate keeps a live connection to a SOOP broadcast's chat room,
//! decodes the chat protocol into typed events and maintains a bounded,
//! filtered history of those events for display.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Chat server (delimiter-framed text over wss://, subprotocol "chat")
//!         ↕
//! [soop-chat-client]
//!   ├── domain/           Pure types: endpoint record, ChatConfig
//!   ├── application/      Protocol dispatcher: frames → directives and events
//!   └── infrastructure/
//!         ├── transport/  WebSocket connect (tokio-tungstenite)
//!         └── session/    Session task: timers, host callbacks, history
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `soop-chat-core` only.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: endpoint record and configuration (no I/O).
pub mod domain;

/// Application layer: connection state machine and per-opcode decoding.
pub mod application;

/// Infrastructure layer: WebSocket transport and the session task.
pub mod infrastructure;
