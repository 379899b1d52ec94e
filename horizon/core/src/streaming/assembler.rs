//! Response Assembler
//!
//! Folds inbound frames into the current-response buffer for the open turn.

use serde::{Deserialize, Serialize};

/// Structured reply frame from the assistant service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    /// Full response text so far
    pub content: String,
    /// Whether this frame closes the turn
    #[serde(default)]
    pub is_complete: bool,
}

/// An inbound text payload after classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// Decoded as an [`AssistantReply`]
    Structured(AssistantReply),
    /// Anything else: a raw text delta
    Fragment(String),
}

impl InboundFrame {
    /// Classify a text payload
    ///
    /// Structured decode is attempted first. Any payload that does not decode
    /// as an object with a string `content` is a fragment, including valid JSON
    /// of another shape.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        match serde_json::from_str::<AssistantReply>(text) {
            Ok(reply) => Self::Structured(reply),
            Err(_) => Self::Fragment(text.to_owned()),
        }
    }
}

/// Uncommitted response text taken out of the assembler
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingResponse {
    /// The buffered response text
    pub content: String,
    /// Whether a completion frame of this turn already reached the log
    pub committed: bool,
}

/// Current-response buffer for the open turn
///
/// `receiving` is raised by [`begin_turn`](Self::begin_turn) and lowered by a
/// completion frame or by the first raw fragment of the turn. While it is up,
/// the next fragment replaces the buffer instead of extending it.
#[derive(Clone, Debug, Default)]
pub struct ResponseAssembler {
    buffer: String,
    receiving: bool,
    committed: bool,
}

impl ResponseAssembler {
    /// Create an idle assembler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new turn
    pub fn begin_turn(&mut self) {
        self.receiving = true;
        self.committed = false;
    }

    /// Lower the receiving flag without touching the buffer
    pub fn stop_receiving(&mut self) {
        self.receiving = false;
    }

    /// Fold one frame into the buffer
    ///
    /// Returns the response content when the frame completes the turn; the
    /// caller appends it to the message log.
    pub fn ingest(&mut self, frame: InboundFrame) -> Option<String> {
        match frame {
            InboundFrame::Structured(reply) => {
                self.buffer = reply.content;
                if reply.is_complete {
                    self.receiving = false;
                    self.committed = true;
                    return Some(self.buffer.clone());
                }
                None
            }
            InboundFrame::Fragment(text) => {
                if self.receiving {
                    self.buffer = text;
                    self.receiving = false;
                } else {
                    self.buffer.push_str(&text);
                    normalize_trailing_punctuation(&mut self.buffer);
                }
                // a turn commits to the log at most once; late text is display only
                None
            }
        }
    }

    /// Take the buffered response, leaving the buffer empty
    ///
    /// Returns `None` when there is nothing to flush.
    pub fn take_pending(&mut self) -> Option<PendingResponse> {
        if self.buffer.is_empty() {
            return None;
        }
        let pending = PendingResponse {
            content: std::mem::take(&mut self.buffer),
            committed: self.committed,
        };
        self.committed = false;
        Some(pending)
    }

    /// Current response text
    #[must_use]
    pub fn current(&self) -> &str {
        &self.buffer
    }

    /// Whether the turn is still waiting for its first fragment or completion
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Drop the buffered response
    ///
    /// The receiving flag belongs to the connection, so a turn still waiting
    /// for its first fragment keeps waiting.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.committed = false;
    }
}

/// Remove whitespace directly before a trailing `,` `'` `"` or `` ` ``
///
/// Only the end of the buffer is considered. A single final newline does not
/// count: `"a ,\n"` becomes `"a,\n"`.
pub fn normalize_trailing_punctuation(buffer: &mut String) {
    let end = buffer.strip_suffix('\n').map_or(buffer.len(), str::len);
    let Some(last) = buffer[..end].chars().next_back() else {
        return;
    };
    if !matches!(last, ',' | '\'' | '"' | '`') {
        return;
    }

    let head_len = end - last.len_utf8();
    let kept = buffer[..head_len].trim_end().len();
    if kept < head_len {
        buffer.replace_range(kept..head_len, "");
    }
}
