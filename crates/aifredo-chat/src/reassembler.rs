//! Stream reassembly: the per-turn state machine.
//!
//! One chat turn is zero or more `delta` events followed by exactly
//! one terminal event (`final` or `error`). Deltas concatenate into a
//! buffer; the in-progress bot message is rewritten with the whole
//! buffer on every delta. A `final` with its own content overrides
//! the buffer; an `error` leaves the partial message in place and
//! appends the error text as a separate bot message. After a
//! user-initiated abort the remainder of the turn is drained without
//! touching the conversation.

use aifredo_protocol::{ChatEvent, ChatState};

use crate::conversation::Conversation;

/// Fallback shown when an error event carries no message of its own.
pub const GENERIC_ERROR_TEXT: &str = "Something went wrong.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum TurnState {
    /// No turn in progress.
    Idle,
    /// Deltas are accumulating into the message with this id.
    Streaming { message_id: String },
    /// The current turn was aborted locally; drop its remaining
    /// frames until the terminal event.
    Draining,
}

/// What a processed event did to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// Nothing changed (contentless delta, drained frame, ...).
    Ignored,
    /// A delta extended the streaming message.
    Delta {
        message_id: String,
        /// The newly arrived fragment, not the whole buffer.
        fragment: String,
    },
    /// The turn finished successfully. `message_id` is `None` for an
    /// empty turn that produced no message.
    Finished {
        message_id: Option<String>,
        text: String,
    },
    /// The turn failed; an error message was appended.
    Failed { message_id: String, text: String },
}

/// Reassembles streamed chat events into conversation messages.
#[derive(Debug)]
pub struct StreamReassembler {
    state: TurnState,
    buffer: String,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            buffer: String::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, TurnState::Streaming { .. })
    }

    /// Apply one decoded chat event to the conversation.
    pub fn apply(&mut self, event: &ChatEvent, conversation: &mut Conversation) -> TurnUpdate {
        match event.state {
            ChatState::Delta => self.on_delta(event, conversation),
            ChatState::Final => self.on_final(event, conversation),
            ChatState::Error => self.on_error(event, conversation),
        }
    }

    /// Local abort: freeze the streaming message with whatever text
    /// has accumulated (partial content is never discarded) and drain
    /// the rest of the turn.
    pub fn abort(&mut self, conversation: &mut Conversation) {
        if let TurnState::Streaming { message_id } = &self.state {
            conversation.clear_streaming(message_id);
        }
        self.buffer.clear();
        self.state = TurnState::Draining;
    }

    /// Begin a fresh turn: any still-draining previous turn stops
    /// suppressing events. Called by the dispatcher on each send.
    pub fn begin_turn(&mut self) {
        if self.state == TurnState::Draining {
            self.state = TurnState::Idle;
        }
    }

    fn on_delta(&mut self, event: &ChatEvent, conversation: &mut Conversation) -> TurnUpdate {
        let Some(fragment) = event.text() else {
            return TurnUpdate::Ignored;
        };
        match &self.state {
            TurnState::Draining => TurnUpdate::Ignored,
            TurnState::Idle => {
                self.buffer = fragment.clone();
                let message_id = conversation.push_streaming_bot(&self.buffer);
                self.state = TurnState::Streaming {
                    message_id: message_id.clone(),
                };
                TurnUpdate::Delta {
                    message_id,
                    fragment,
                }
            }
            TurnState::Streaming { message_id } => {
                self.buffer.push_str(&fragment);
                conversation.set_text(message_id, &self.buffer);
                TurnUpdate::Delta {
                    message_id: message_id.clone(),
                    fragment,
                }
            }
        }
    }

    fn on_final(&mut self, event: &ChatEvent, conversation: &mut Conversation) -> TurnUpdate {
        match std::mem::replace(&mut self.state, TurnState::Idle) {
            TurnState::Draining => {
                self.buffer.clear();
                TurnUpdate::Ignored
            }
            TurnState::Streaming { message_id } => {
                // Final content, when present, overrides the buffer.
                let text = event.text().unwrap_or_else(|| self.buffer.clone());
                conversation.finish(&message_id, &text);
                self.buffer.clear();
                TurnUpdate::Finished {
                    message_id: Some(message_id),
                    text,
                }
            }
            TurnState::Idle => match event.text() {
                // Empty response turn with content only in the final.
                Some(text) => {
                    let message_id = conversation.push_bot(&text);
                    TurnUpdate::Finished {
                        message_id: Some(message_id),
                        text,
                    }
                }
                None => TurnUpdate::Finished {
                    message_id: None,
                    text: String::new(),
                },
            },
        }
    }

    fn on_error(&mut self, event: &ChatEvent, conversation: &mut Conversation) -> TurnUpdate {
        let was_draining = self.state == TurnState::Draining;
        if let TurnState::Streaming { message_id } = &self.state {
            // Keep the partial message, just stop the cursor pulsing.
            conversation.clear_streaming(message_id);
        }
        self.buffer.clear();
        self.state = TurnState::Idle;

        if was_draining {
            return TurnUpdate::Ignored;
        }

        let text = event
            .error_message
            .clone()
            .unwrap_or_else(|| GENERIC_ERROR_TEXT.to_string());
        let message_id = conversation.push_bot(&text);
        TurnUpdate::Failed { message_id, text }
    }
}
