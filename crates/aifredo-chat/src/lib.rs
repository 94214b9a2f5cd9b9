//! Streaming chat session client for the Aifredo gateway.
//!
//! A `ChatSession` owns one persistent WebSocket connection to the
//! gateway, performs the connect handshake, dispatches chat turns
//! gated by the client-side daily quota, and reassembles streamed
//! partial responses into the conversation the surrounding UI renders.
//!
//! The contract the UI layer builds against is
//! [`ChatSession::connect`], [`ChatSession::send_message`],
//! [`ChatSession::abort_chat`], plus read access to the connection
//! status and the message list.

pub mod bots;
pub mod config;
pub mod conversation;
pub mod error;
pub mod quota;
pub mod reassembler;
pub mod session;
pub mod store;
pub mod transport;

mod handshake;

pub use bots::{BotProfile, fetch_bot_profile};
pub use config::GatewayConfig;
pub use conversation::{Conversation, Message, Role};
pub use error::{ChatError, ChatResult};
pub use quota::DailyQuota;
pub use reassembler::{StreamReassembler, TurnUpdate};
pub use session::{ChatSession, SessionEvent};
pub use store::{FileStore, KvStore, MemoryStore, StoreError};
pub use transport::ConnectionStatus;
