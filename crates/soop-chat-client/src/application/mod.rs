//! Application layer: the protocol dispatcher.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure types) and the infrastructure (sockets, timers, the terminal).
//! Code in this layer decides *what* happens when a frame arrives, but never
//! performs the I/O itself: it returns [`dispatcher::Directive`]s that the
//! session task in the infrastructure layer executes.  That keeps the whole
//! protocol state machine testable without a socket.
//!
//! # Sub-modules
//!
//! - **`dispatcher`** – Connection state machine: handshake, join, event
//!   routing and teardown bookkeeping.
//!
//! - **`schema`** – Named field positions per opcode and the decoding of a
//!   frame into a typed event payload.

pub mod dispatcher;
pub mod schema;

pub use dispatcher::{ConnectionState, Directive, Dispatcher};
