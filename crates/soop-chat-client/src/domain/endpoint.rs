//! The live-info record consumed from the session-metadata resolver.
//!
//! The resolver hands over a JSON record using the upstream field names
//! (`BJID`, `CHATNO`, `CHDOMAIN`, `CHPT`).  Any of the chat fields may be
//! absent, for example when the broadcast has chat disabled.  Validation
//! turns the record into a [`ChatEndpoint`] or reports which field is
//! missing so the caller can treat chat as unavailable.

use serde::{Deserialize, Deserializer};

use crate::domain::config::ConfigError;

/// Subprotocol token negotiated with the chat server.
pub const CHAT_SUBPROTOCOL: &str = "chat";

/// Raw endpoint fields as delivered by the live-info resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EndpointInfo {
    /// Broadcaster id; part of the WebSocket path.
    #[serde(rename = "BJID", default)]
    pub broadcaster_id: String,

    /// Chat room number.  Upstream sends it as a JSON number.
    #[serde(rename = "CHATNO", default, deserialize_with = "string_or_number")]
    pub room_id: Option<String>,

    /// Chat server host name.
    #[serde(rename = "CHDOMAIN", default)]
    pub domain: Option<String>,

    /// Advertised chat port.  The secure WebSocket listens one port above it.
    #[serde(rename = "CHPT", default, deserialize_with = "string_or_number")]
    pub port: Option<String>,
}

/// A validated chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEndpoint {
    pub domain: String,
    /// Secure WebSocket port (advertised port + 1).
    pub port: u16,
    pub room_id: String,
    pub broadcaster_id: String,
}

impl ChatEndpoint {
    /// WebSocket URL of the chat room.
    pub fn url(&self) -> String {
        format!(
            "wss://{}:{}/Websocket/{}",
            self.domain, self.port, self.broadcaster_id
        )
    }
}

impl EndpointInfo {
    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] if the domain, port or room id is
    /// absent or blank, and [`ConfigError::InvalidPort`] if the port is not a
    /// number below 65535.
    pub fn resolve(&self) -> Result<ChatEndpoint, ConfigError> {
        let domain = required(&self.domain, "CHDOMAIN")?;
        let port_text = required(&self.port, "CHPT")?;
        let room_id = required(&self.room_id, "CHATNO")?;

        let port = port_text
            .parse::<u16>()
            .ok()
            .and_then(|p| p.checked_add(1))
            .ok_or_else(|| ConfigError::InvalidPort(port_text.to_string()))?;

        Ok(ChatEndpoint {
            domain: domain.to_string(),
            port,
            room_id: room_id.to_string(),
            broadcaster_id: self.broadcaster_id.clone(),
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingField(name))
}

/// Accepts either a JSON string or a JSON number.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}
