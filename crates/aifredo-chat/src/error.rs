//! Chat client error types.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for chat client operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors surfaced by the chat session client.
///
/// Quota exhaustion and single-flight rejection are deliberate UX
/// states, not failures: the UI distinguishes them from transport and
/// protocol errors.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No gateway connection is established.
    #[error("not connected to the gateway")]
    NotConnected,

    /// A previous chat turn has not reached a terminal event yet.
    #[error("a chat turn is already in flight")]
    TurnInFlight,

    /// The daily message limit is used up for today.
    #[error("daily message limit reached")]
    QuotaExhausted,

    /// Message text was empty after trimming.
    #[error("message is empty")]
    EmptyMessage,

    /// Socket-level failure (connect refused, unexpected close, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame serialization failure.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Persisted-state backend failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ChatError::QuotaExhausted.to_string(),
            "daily message limit reached"
        );
        assert_eq!(
            ChatError::Transport("connection refused".to_string()).to_string(),
            "transport error: connection refused"
        );
    }
}
