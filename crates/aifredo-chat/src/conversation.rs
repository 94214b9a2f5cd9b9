//! Conversation state: the ordered message list presented to the UI.
//!
//! Append-only, except that the single in-progress streaming message
//! is edited in place as deltas arrive.

use serde::Serialize;

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
    /// Inline notices only (rate-limit banners and the like).
    System,
}

/// A UI-visible chat message.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// True while deltas for this message are still arriving.
    pub streaming: bool,
}

/// Ordered list of messages for one connection.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The in-progress streaming message, if one exists.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.streaming)
    }

    /// Append a user message. User messages never mutate afterwards.
    pub fn push_user(&mut self, text: &str) -> String {
        self.push(Role::User, text, false)
    }

    /// Append a finished bot message.
    pub fn push_bot(&mut self, text: &str) -> String {
        self.push(Role::Bot, text, false)
    }

    /// Append a system notice.
    pub fn push_system(&mut self, text: &str) -> String {
        self.push(Role::System, text, false)
    }

    /// Append a bot message that is still streaming.
    pub fn push_streaming_bot(&mut self, text: &str) -> String {
        self.push(Role::Bot, text, true)
    }

    /// Replace the text of a message in place. Used for the streaming
    /// message so the UI always renders a consistent whole string.
    pub fn set_text(&mut self, id: &str, text: &str) {
        if let Some(msg) = self.get_mut(id) {
            msg.text = text.to_string();
        }
    }

    /// Freeze a streaming message with its definitive text.
    pub fn finish(&mut self, id: &str, text: &str) {
        if let Some(msg) = self.get_mut(id) {
            msg.text = text.to_string();
            msg.streaming = false;
        }
    }

    /// Clear the streaming flag without touching accumulated text.
    pub fn clear_streaming(&mut self, id: &str) {
        if let Some(msg) = self.get_mut(id) {
            msg.streaming = false;
        }
    }

    fn push(&mut self, role: Role, text: &str, streaming: bool) -> String {
        self.next_id += 1;
        let id = format!("msg-{}", self.next_id);
        self.messages.push(Message {
            id: id.clone(),
            role,
            text: text.to_string(),
            streaming,
        });
        id
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let mut conv = Conversation::new();
        let a = conv.push_user("hi");
        let b = conv.push_bot("hello");
        assert_ne!(a, b);
        assert_eq!(conv.messages()[0].id, a);
        assert_eq!(conv.messages()[1].id, b);
    }

    #[test]
    fn test_streaming_message_edits_in_place() {
        let mut conv = Conversation::new();
        let id = conv.push_streaming_bot("Hi");
        conv.set_text(&id, "Hi there");
        assert_eq!(conv.streaming_message().unwrap().text, "Hi there");

        conv.finish(&id, "Hi there!");
        assert!(conv.streaming_message().is_none());
        assert_eq!(conv.messages()[0].text, "Hi there!");
    }
}
