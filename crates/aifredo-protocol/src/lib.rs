//! Canonical wire protocol types for the Aifredo gateway connection.
//!
//! The gateway speaks a small JSON frame protocol over a persistent
//! socket: outbound requests (`connect`, `chat.send`, `chat.abort`),
//! inbound responses correlated by request id, and uncorrelated chat
//! events that stream partial bot output. This crate owns the frame
//! shapes and the codec; it performs no I/O.

mod content;
mod frames;
mod keys;

pub use content::extract_text;
pub use frames::{
    AuthParams, ChatAbortParams, ChatEvent, ChatSendParams, ChatState, ClientInfo, ConnectParams,
    InboundFrame, Method, RequestFrame, ResponseFrame, decode,
};
pub use keys::{RequestIdGenerator, idempotency_key};

/// The single protocol version this client speaks. Sent as both the
/// minimum and maximum bound during the connect handshake.
pub const PROTOCOL_VERSION: u32 = 3;

/// Role requested during the connect handshake.
pub const OPERATOR_ROLE: &str = "operator";

/// Scopes requested during the connect handshake.
pub const OPERATOR_SCOPES: [&str; 2] = ["operator.read", "operator.write"];
