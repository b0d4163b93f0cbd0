//! Infrastructure layer for soop-chat-client.
//!
//! The infrastructure layer handles all I/O: opening the WebSocket to the
//! chat server and running the per-session task that owns it.
//!
//! # Responsibilities
//!
//! - Building the WebSocket request with the `"chat"` subprotocol
//! - Driving the dispatcher from inbound frames and host commands
//! - Running the keepalive and history-prune timers
//! - Invoking the host's callbacks
//!
//! # What does NOT belong here?
//!
//! - Protocol decisions (that is the application layer)
//! - Endpoint and configuration types (that is the domain layer)

pub mod session;
pub mod transport;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use session::{
    connect, spawn_with_transport, ChatHandler, ChatSession, ConnectOutcome, SessionError,
    SessionHandle,
};
