//! Conversation Log
//!
//! The append-only message log and the parallel list of display records.
//! The log is what gets replayed to the assistant service; the display
//! records are what a surface renders.

use crate::messages::{DisplayRecord, Message, MessageMetadata, MessageRole, RecordId};

/// Message log plus display records for one conversation
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    display: Vec<DisplayRecord>,
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message
    pub fn push_user(&mut self, content: impl Into<String>, metadata: Option<MessageMetadata>) {
        self.messages.push(Message::user(content, metadata));
    }

    /// Append an assistant message
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Add a visible bubble, returning its ID
    pub fn push_display(&mut self, text: impl Into<String>, is_user: bool) -> RecordId {
        let record = DisplayRecord::new(text, is_user);
        let id = record.id.clone();
        self.display.push(record);
        id
    }

    /// The message log, oldest first
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Display records, oldest first
    #[must_use]
    pub fn display_records(&self) -> &[DisplayRecord] {
        &self.display
    }

    /// Number of messages in the log
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Number of assistant messages in the log
    #[must_use]
    pub fn assistant_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .count()
    }

    /// Most recent message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages and display records
    pub fn clear(&mut self) {
        self.messages.clear();
        self.display.clear();
    }
}
