//! Domain layer for soop-chat-client.
//!
//! Pure types with no dependency on sockets, timers or async runtimes:
//!
//! - the endpoint record handed over by the live-session metadata resolver,
//! - the runtime configuration of a chat session.

pub mod config;
pub mod endpoint;

pub use config::{ChatConfig, ConfigError};
pub use endpoint::{ChatEndpoint, EndpointInfo};
