//! Conversation Messages
//!
//! The records that make up a conversation with the assistant service:
//!
//! - [`Message`]: one entry of the message log. The full log is replayed to the
//!   service on every request, so it is the source of truth for context.
//! - [`MessageMetadata`]: capture context attached to a user message.
//! - [`DisplayRecord`]: one visible chat bubble. Display records are kept apart
//!   from the log because a streamed answer becomes visible before (or without)
//!   ever being committed to the log.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The local user
    User,
    /// The remote assistant
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Capture context attached to a user message
///
/// Never constructed empty: use [`MessageMetadata::from_parts`], which returns
/// `None` when every field is absent or blank.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Text recognized from a screen capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    /// Text the user had selected when the turn was started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
    /// URL of the focused browser tab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<String>,
}

impl MessageMetadata {
    /// Build metadata from optional capture fields
    ///
    /// Empty strings count as absent. Returns `None` if nothing remains.
    #[must_use]
    pub fn from_parts(
        ocr_text: Option<&str>,
        selected_text: Option<&str>,
        browser_url: Option<&str>,
    ) -> Option<Self> {
        fn keep(value: Option<&str>) -> Option<String> {
            value.filter(|s| !s.is_empty()).map(str::to_owned)
        }

        let metadata = Self {
            ocr_text: keep(ocr_text),
            selected_text: keep(selected_text),
            browser_url: keep(browser_url),
        };
        (!metadata.is_empty()).then_some(metadata)
    }

    /// True when no field carries a value
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ocr_text.is_none() && self.selected_text.is_none() && self.browser_url.is_none()
    }
}

/// One entry of the message log
///
/// Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message
    pub role: MessageRole,
    /// Message body
    pub content: String,
    /// Capture context (user messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// When the message was appended (Unix timestamp ms)
    pub created_at_ms: u64,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>, metadata: Option<MessageMetadata>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            metadata,
            created_at_ms: now_ms(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            metadata: None,
            created_at_ms: now_ms(),
        }
    }
}

/// Identifier of a display record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generate a new unique record ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One visible chat bubble
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRecord {
    /// Unique record ID
    pub id: RecordId,
    /// Bubble text
    pub text: String,
    /// Whether the bubble belongs to the user
    pub is_user: bool,
    /// When the bubble was created (Unix timestamp ms)
    pub created_at_ms: u64,
}

impl DisplayRecord {
    /// Create a record stamped with the current time
    pub fn new(text: impl Into<String>, is_user: bool) -> Self {
        Self {
            id: RecordId::new(),
            text: text.into(),
            is_user,
            created_at_ms: now_ms(),
        }
    }
}

/// Current Unix time in milliseconds
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
