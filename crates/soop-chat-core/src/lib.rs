//! # soop-chat-core
//!
//! Shared library for the SOOP live-chat client containing the chat wire
//! codec, bit-packed flag decoding, the typed event model and the bounded
//! event history.
//!
//! It has zero dependencies on sockets, timers, or async runtimes; the
//! `soop-chat-client` crate drives it from a WebSocket session.
//!
//! # Architecture overview (for beginners)
//!
//! The chat server speaks a text protocol: every frame starts with two
//! control characters, a 4-digit opcode, a 6-digit length and 2 reserved
//! digits, followed by fields separated by the form-feed character (`0x0C`).
//!
//! - **`protocol`** – How frames travel over the wire.  Outbound control
//!   packets are built here, inbound frames are split into an opcode and an
//!   ordered field list, and decimal flag words are expanded into named
//!   booleans.
//!
//! - **`events`** – The typed event model: one variant per chat event
//!   category, each carrying only the fields that category needs.
//!
//! - **`retention`** – The visibility rules, the capped in-memory history and
//!   the [`EventStore`] that stamps, filters and records submitted events.

pub mod events;
pub mod protocol;
pub mod retention;

pub use events::{ChatEvent, EventKind, EventPayload};
pub use protocol::codec::{decode_frame, Frame, ProtocolError};
pub use protocol::flags::{FreezeFlags, StatusFlags, UserFlags};
pub use protocol::opcodes::Opcode;
pub use retention::{EventStore, RetentionBuffer, Submission, VisibilityRules};
