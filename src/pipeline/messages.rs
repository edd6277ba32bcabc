//! Conversation log entries.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Typed or spoken command.
    User,
    /// Assistant reply or announcement.
    Assistant,
}

/// One immutable entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Increasing id; later messages have larger ids.
    pub id: u64,
    /// Message text as displayed (may contain markdown).
    pub text: String,
    /// Author.
    pub sender: Sender,
    /// Creation time.
    pub created_at: DateTime<Local>,
}

/// Append-only, creation-ordered message log.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_id: u64,
}

impl MessageLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a copy of it.
    pub fn append(
        &mut self,
        text: impl Into<String>,
        sender: Sender,
        created_at: DateTime<Local>,
    ) -> Message {
        self.next_id += 1;
        let message = Message {
            id: self.next_id,
            text: text.into(),
            sender,
            created_at,
        };
        self.messages.push(message.clone());
        message
    }

    /// All messages in creation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
