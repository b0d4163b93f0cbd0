//! WebSocket transport to the chat server.
//!
//! The chat server only accepts connections that negotiate the `"chat"`
//! subprotocol, so the request carries an explicit `Sec-WebSocket-Protocol`
//! header.

use anyhow::Context;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::domain::endpoint::CHAT_SUBPROTOCOL;

/// A connected chat transport.
pub type ChatStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens a WebSocket connection to `url` with the chat subprotocol.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the TCP, TLS or WebSocket
/// handshake fails.
pub async fn open(url: &str) -> anyhow::Result<ChatStream> {
    let mut request = url
        .into_client_request()
        .with_context(|| format!("invalid chat URL {url}"))?;
    request.headers_mut().insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(CHAT_SUBPROTOCOL),
    );

    let (stream, response) = connect_async(request)
        .await
        .with_context(|| format!("failed to connect to chat server at {url}"))?;

    debug!("chat transport open (HTTP {})", response.status());
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_rejects_invalid_url() {
        let result = open("not a url").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_reports_refused_connection() {
        // Port 1 on loopback is never a chat server.
        let result = open("ws://127.0.0.1:1/Websocket/x").await;

        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("failed to connect"), "{message}");
    }
}
