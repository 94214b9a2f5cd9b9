//! The chat session: connection lifecycle, dispatch, and the reader
//! task that feeds decoded frames through the reassembler.
//!
//! One `ChatSession` owns one gateway connection. All inbound frame
//! handling happens inside a single reader task and mutates session
//! state under one lock, so per-connection event processing is
//! serialized in arrival order. Failures never escape as panics; they
//! become connection state or appended messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use aifredo_protocol::{
    ChatAbortParams, ChatSendParams, InboundFrame, RequestFrame, RequestIdGenerator, decode,
    idempotency_key,
};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::config::GatewayConfig;
use crate::conversation::{Conversation, Message};
use crate::error::{ChatError, ChatResult};
use crate::handshake;
use crate::quota::DailyQuota;
use crate::reassembler::{StreamReassembler, TurnUpdate};
use crate::store::KvStore;
use crate::transport::{ConnectionStatus, Transport, WsReader};

/// Buffer size for the session event broadcast channel.
const EVENT_BUFFER_SIZE: usize = 256;

/// Notifications for a UI driving the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StatusChanged(ConnectionStatus),
    /// A delta extended the streaming bot message.
    Delta {
        message_id: String,
        /// The newly arrived fragment.
        fragment: String,
    },
    /// The current turn reached its `final` event.
    TurnFinished {
        message_id: Option<String>,
        text: String,
    },
    /// The current turn reached an `error` event.
    TurnFailed { text: String },
    /// The current turn was aborted locally.
    TurnAborted,
}

struct SessionState {
    conversation: Conversation,
    reassembler: StreamReassembler,
    /// Single-flight guard: true from dispatch until the terminal
    /// event (or a local abort).
    in_flight: bool,
    /// Request id of the pending connect handshake, if any.
    handshake_id: Option<String>,
}

struct SessionInner {
    state: StdMutex<SessionState>,
    status: watch::Sender<ConnectionStatus>,
    events: broadcast::Sender<SessionEvent>,
    transport: Transport,
    ids: RequestIdGenerator,
    /// Set during caller-initiated teardown so the reader does not
    /// report the close as a transport failure.
    closing: AtomicBool,
}

impl SessionInner {
    fn set_status(&self, status: ConnectionStatus) {
        let _ = self.events.send(SessionEvent::StatusChanged(status.clone()));
        self.status.send_replace(status);
    }
}

/// A streaming chat session against the Aifredo gateway.
pub struct ChatSession {
    config: GatewayConfig,
    quota: DailyQuota,
    inner: Arc<SessionInner>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl ChatSession {
    pub fn new(config: GatewayConfig, store: Arc<dyn KvStore>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        let quota = DailyQuota::new(store, config.daily_message_limit);
        Self {
            config,
            quota,
            inner: Arc::new(SessionInner {
                state: StdMutex::new(SessionState {
                    conversation: Conversation::new(),
                    reassembler: StreamReassembler::new(),
                    in_flight: false,
                    handshake_id: None,
                }),
                status,
                events,
                transport: Transport::new(),
                ids: RequestIdGenerator::new(),
                closing: AtomicBool::new(false),
            }),
            reader: StdMutex::new(None),
        }
    }

    /// Open the gateway connection and start the handshake. Any
    /// previous connection is torn down first. The session reports
    /// `Connecting` until the handshake response arrives.
    pub async fn connect(&self, endpoint: &str, token: &str) -> ChatResult<()> {
        self.teardown().await;
        self.inner.closing.store(false, Ordering::SeqCst);
        self.inner.set_status(ConnectionStatus::Connecting);

        let reader = match self.inner.transport.open(endpoint).await {
            Ok(reader) => reader,
            Err(err) => {
                self.inner.set_status(ConnectionStatus::Disconnected {
                    error: Some(err.to_string()),
                });
                return Err(err);
            }
        };

        let handshake_id = self.inner.ids.next_id();
        let frame = handshake::connect_request(&self.config, token, handshake_id.clone())?;
        self.lock_state().handshake_id = Some(handshake_id);
        if let Err(err) = self.inner.transport.send(&frame.to_json()?).await {
            self.inner.set_status(ConnectionStatus::Disconnected {
                error: Some(err.to_string()),
            });
            return Err(err);
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(reader_loop(reader, inner));
        *self.reader.lock().expect("reader lock poisoned") = Some(handle);
        Ok(())
    }

    /// Dispatch one chat turn. Rejects without side effects when not
    /// connected, when a turn is already in flight, or when the daily
    /// quota is used up. On accept the quota is counted before the
    /// network write and the user message is appended synchronously.
    pub async fn send_message(&self, text: &str) -> ChatResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.status().is_connected() {
            return Err(ChatError::NotConnected);
        }

        let frame = {
            let mut state = self.lock_state();
            if state.in_flight {
                return Err(ChatError::TurnInFlight);
            }
            if self.quota.is_exhausted() {
                return Err(ChatError::QuotaExhausted);
            }
            self.quota.increment()?;
            state.in_flight = true;
            state.reassembler.begin_turn();
            state.conversation.push_user(text);

            RequestFrame::chat_send(
                self.inner.ids.next_id(),
                &ChatSendParams {
                    session_key: self.config.session_key.clone(),
                    message: text.to_string(),
                    idempotency_key: idempotency_key(),
                },
            )?
            .to_json()?
        };

        if let Err(err) = self.inner.transport.send(&frame).await {
            self.lock_state().in_flight = false;
            self.inner.set_status(ConnectionStatus::Disconnected {
                error: Some(err.to_string()),
            });
            return Err(err);
        }
        Ok(())
    }

    /// Abort the in-flight turn: signal the gateway and immediately
    /// freeze the streaming message with whatever text has arrived.
    /// Partial content is never discarded. A no-op when idle.
    pub async fn abort_chat(&self) -> ChatResult<()> {
        let frame = {
            let mut state = self.lock_state();
            if !state.in_flight && !state.reassembler.is_streaming() {
                return Ok(());
            }
            let SessionState {
                conversation,
                reassembler,
                in_flight,
                ..
            } = &mut *state;
            reassembler.abort(conversation);
            *in_flight = false;

            RequestFrame::chat_abort(
                self.inner.ids.next_id(),
                &ChatAbortParams {
                    session_key: self.config.session_key.clone(),
                },
            )?
            .to_json()?
        };

        // Best-effort stop signal; the local state is already settled.
        if let Err(err) = self.inner.transport.send(&frame).await {
            warn!("abort signal not delivered: {err}");
        }
        let _ = self.inner.events.send(SessionEvent::TurnAborted);
        Ok(())
    }

    /// Tear the connection down. Idempotent.
    pub async fn close(&self) {
        self.teardown().await;
        self.inner
            .set_status(ConnectionStatus::Disconnected { error: None });
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    /// Watch connection status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Subscribe to session event notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.lock_state().conversation.messages().to_vec()
    }

    /// Whether a turn is currently streaming or awaiting its first
    /// event.
    pub fn is_streaming(&self) -> bool {
        self.lock_state().in_flight
    }

    /// Remaining daily allowance.
    pub fn quota_remaining(&self) -> u32 {
        self.quota.remaining()
    }

    pub fn quota_limit(&self) -> u32 {
        self.quota.limit()
    }

    /// Append an inline system notice to the conversation.
    pub fn push_notice(&self, text: &str) {
        self.lock_state().conversation.push_system(text);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.inner.state.lock().expect("session state lock poisoned")
    }

    async fn teardown(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.transport.close().await;
        if let Some(handle) = self.reader.lock().expect("reader lock poisoned").take() {
            handle.abort();
        }
        let mut state = self.lock_state();
        state.in_flight = false;
        state.handshake_id = None;
    }
}

/// Reader task: consumes inbound frames until the socket ends.
async fn reader_loop(mut reader: WsReader, inner: Arc<SessionInner>) {
    let mut close_error: Option<String> = None;
    while let Some(message) = reader.next().await {
        match message {
            Ok(WsMessage::Text(text)) => handle_frame(&inner, text.as_str()),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                close_error = Some(err.to_string());
                break;
            }
        }
    }

    if inner.closing.load(Ordering::SeqCst) {
        return;
    }

    // Unexpected close: revert to disconnected, no automatic reconnect.
    let error = close_error.unwrap_or_else(|| "connection closed unexpectedly".to_string());
    info!("gateway connection ended: {error}");
    {
        let mut state = inner.state.lock().expect("session state lock poisoned");
        state.in_flight = false;
        state.handshake_id = None;
    }
    inner.set_status(ConnectionStatus::Disconnected { error: Some(error) });
}

/// Process one raw inbound frame. Decode failures are swallowed; they
/// must never crash the session or corrupt the conversation.
fn handle_frame(inner: &SessionInner, raw: &str) {
    match decode(raw) {
        InboundFrame::Response(response) => {
            let is_handshake = {
                let mut state = inner.state.lock().expect("session state lock poisoned");
                match state.handshake_id.as_deref() {
                    Some(id) if id == response.id => {
                        state.handshake_id = None;
                        true
                    }
                    _ => false,
                }
            };
            if !is_handshake {
                debug!("ignoring response for request {}", response.id);
                return;
            }
            if handshake::accepted(&response) {
                info!("gateway connection established");
                inner.set_status(ConnectionStatus::Connected);
            } else {
                inner.set_status(ConnectionStatus::Disconnected {
                    error: Some(handshake::REJECTED_NOTICE.to_string()),
                });
            }
        }
        InboundFrame::Chat(event) => {
            let update = {
                let mut state = inner.state.lock().expect("session state lock poisoned");
                let SessionState {
                    conversation,
                    reassembler,
                    in_flight,
                    ..
                } = &mut *state;
                let update = reassembler.apply(&event, conversation);
                if matches!(update, TurnUpdate::Finished { .. } | TurnUpdate::Failed { .. }) {
                    *in_flight = false;
                }
                update
            };
            match update {
                TurnUpdate::Ignored => {}
                TurnUpdate::Delta {
                    message_id,
                    fragment,
                } => {
                    let _ = inner.events.send(SessionEvent::Delta {
                        message_id,
                        fragment,
                    });
                }
                TurnUpdate::Finished { message_id, text } => {
                    let _ = inner
                        .events
                        .send(SessionEvent::TurnFinished { message_id, text });
                }
                TurnUpdate::Failed { text, .. } => {
                    let _ = inner.events.send(SessionEvent::TurnFailed { text });
                }
            }
        }
        InboundFrame::Ignored => {
            debug!("ignoring unrecognized frame");
        }
    }
}
