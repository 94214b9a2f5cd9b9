//! Transport socket: exactly one WebSocket connection per session.
//!
//! Open/send/close only. Reconnection is a caller-triggered action (a
//! "Retry" control), never an internal retry loop, and there is no
//! backoff machinery here on purpose.

use futures::SinkExt;
use futures::stream::{SplitSink, SplitStream, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{ChatError, ChatResult};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsReader = SplitStream<WsStream>;
type WsWriter = SplitSink<WsStream, WsMessage>;

/// Connection lifecycle state, as shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected { error: Option<String> },
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// The last error message, if disconnected with one.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Disconnected { error } => error.as_deref(),
            _ => None,
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected { error: None }
    }
}

/// The write half of the session's socket. The read half is handed to
/// the session's reader task on open.
pub(crate) struct Transport {
    writer: Mutex<Option<WsWriter>>,
}

impl Transport {
    pub(crate) fn new() -> Self {
        Self {
            writer: Mutex::new(None),
        }
    }

    /// Establish the connection and return the read half. Replaces
    /// any previous writer.
    pub(crate) async fn open(&self, endpoint: &str) -> ChatResult<WsReader> {
        debug!("opening gateway connection to {endpoint}");
        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|err| ChatError::Transport(err.to_string()))?;
        let (writer, reader) = stream.split();
        *self.writer.lock().await = Some(writer);
        Ok(reader)
    }

    /// Write one text frame. Fails with `NotConnected` when the
    /// socket is gone; callers check connection state first, but a
    /// late send must not bring anything down.
    pub(crate) async fn send(&self, frame: &str) -> ChatResult<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => writer
                .send(WsMessage::text(frame))
                .await
                .map_err(|err| ChatError::Transport(err.to_string())),
            None => Err(ChatError::NotConnected),
        }
    }

    /// Tear the connection down. Idempotent.
    pub(crate) async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.close().await;
        }
    }

    pub(crate) async fn is_open(&self) -> bool {
        self.writer.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_open_socket_is_a_typed_error() {
        let transport = Transport::new();
        assert!(!transport.is_open().await);
        match transport.send("{}").await {
            Err(ChatError::NotConnected) => {}
            other => panic!("expected NotConnected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = Transport::new();
        transport.close().await;
        transport.close().await;
    }

    #[tokio::test]
    async fn test_open_failure_surfaces_transport_error() {
        let transport = Transport::new();
        // Nothing listens on this port.
        let result = transport.open("ws://127.0.0.1:1/").await;
        match result {
            Err(ChatError::Transport(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_status_helpers() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(ConnectionStatus::Connecting.is_connecting());
        let status = ConnectionStatus::Disconnected {
            error: Some("gone".to_string()),
        };
        assert_eq!(status.error(), Some("gone"));
        assert_eq!(ConnectionStatus::default().error(), None);
    }
}
