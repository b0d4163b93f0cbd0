//! Protocol dispatcher: the connection state machine of one chat session.
//!
//! The dispatcher performs no I/O.  The session task feeds it transport
//! notifications (`on_open`, `on_frame`, `on_terminated`) and carries out the
//! [`Directive`]s it returns: sending packets, starting timers, closing the
//! transport and submitting events to the history.
//!
//! # Connection lifecycle (for beginners)
//!
//! ```text
//! Connecting ──init ack──► Initiated ──join ack──► Joined ──timers up──► Active
//!      │                       │                     │                     │
//!      └───────────────────────┴──── transport close/error ───────────────┴──► Closed
//! ```
//!
//! - `Connecting`: the transport is opening, or open with the init packet sent.
//! - `Initiated`: the server accepted the init packet; the join packet is sent.
//! - `Joined`: the server accepted the join; timers are being started.
//! - `Active`: keepalive and prune timers run; the host has been notified.
//! - `Closed`: terminal.  Every further frame is ignored.

use serde::Serialize;
use soop_chat_core::events::EventPayload;
use soop_chat_core::protocol::codec::{
    decode_frame, encode_init, encode_join, render_for_log,
};
use soop_chat_core::protocol::opcodes::Opcode;
use tracing::{debug, info, warn};

use crate::application::schema::decode_event;

/// Current state of a chat connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Initiated,
    Joined,
    Active,
    Closed,
}

/// An action the session task must carry out for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Send this text frame on the transport.
    Send(String),
    /// Start the keepalive and prune timers.
    StartTimers,
    /// Invoke the host's connect callback.
    NotifyConnected,
    /// Close the transport (the broadcast ended).
    CloseTransport,
    /// Submit this payload to the event store.
    Emit(EventPayload),
}

/// Connection state machine for one room.
#[derive(Debug)]
pub struct Dispatcher {
    room_id: String,
    cookie: Option<String>,
    state: ConnectionState,
}

impl Dispatcher {
    /// Creates a dispatcher for `room_id`.  An absent or empty `cookie` joins
    /// anonymously.
    pub fn new(room_id: impl Into<String>, cookie: Option<String>) -> Self {
        Self {
            room_id: room_id.into(),
            cookie: cookie.filter(|c| !c.is_empty()),
            state: ConnectionState::Connecting,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The transport opened: send the session-init packet.
    pub fn on_open(&mut self) -> Vec<Directive> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        debug!("transport open; sending init");
        vec![Directive::Send(encode_init(self.cookie.as_deref()))]
    }

    /// Handles one inbound text frame.
    ///
    /// Never fails: malformed and unknown frames are logged and ignored.
    pub fn on_frame(&mut self, raw: &str) -> Vec<Directive> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }

        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping malformed frame ({e}): {}", render_for_log(raw));
                return Vec::new();
            }
        };

        let opcode = match frame.opcode().parse::<Opcode>() {
            Ok(opcode) => opcode,
            Err(_) => {
                warn!(
                    "unknown opcode {}: {}",
                    frame.opcode(),
                    render_for_log(raw)
                );
                return Vec::new();
            }
        };

        match (opcode, self.state) {
            (Opcode::Login, ConnectionState::Connecting) => {
                info!("init acknowledged; joining room {}", self.room_id);
                self.state = ConnectionState::Initiated;
                vec![Directive::Send(encode_join(&self.room_id))]
            }
            (Opcode::JoinChannel, ConnectionState::Initiated) => {
                info!("joined room {}", self.room_id);
                self.state = ConnectionState::Joined;
                vec![Directive::StartTimers, Directive::NotifyConnected]
            }
            (Opcode::Login | Opcode::JoinChannel, state) => {
                debug!("ignoring {opcode:?} acknowledgement in state {state:?}");
                Vec::new()
            }
            (Opcode::CloseBroadcast, _) => {
                info!("broadcast closed by server");
                vec![Directive::CloseTransport]
            }
            (_, ConnectionState::Connecting) => {
                debug!("ignoring {opcode:?} before init acknowledgement");
                Vec::new()
            }
            _ => match decode_event(opcode, &frame) {
                Some(payload) => vec![Directive::Emit(payload)],
                None => {
                    debug!("opcode {opcode} ({opcode:?}) carries no event");
                    Vec::new()
                }
            },
        }
    }

    /// Timers are running: move from `Joined` to `Active`.
    pub fn mark_active(&mut self) {
        if self.state == ConnectionState::Joined {
            self.state = ConnectionState::Active;
        }
    }

    /// The transport closed or failed.
    ///
    /// Returns `true` the first time only; the caller runs its teardown
    /// (timer cancellation, flush callback) exactly when this returns `true`.
    pub fn on_terminated(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;
        true
    }
}
