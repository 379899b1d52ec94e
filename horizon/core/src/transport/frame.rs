//! Wire Frames
//!
//! The request frame sent for each user turn and the raw payloads that come
//! back. Requests are a single JSON text frame:
//!
//! ```text
//! {
//!   "messages": [{"role": "user", "content": "...", "metadata": {...}}, ...],
//!   "image_bytes": "<base64>",            // omitted when there is no image
//!   "smarter_analysis_enabled": false
//! }
//! ```

use serde::Serialize;

use crate::messages::{Message, MessageMetadata, MessageRole};

/// A payload as received from the transport, before classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundPayload {
    /// Text frame
    Text(String),
    /// Binary frame, expected to hold UTF-8 text
    Binary(Vec<u8>),
}

impl InboundPayload {
    /// Decode the payload as text
    ///
    /// Binary payloads that are not valid UTF-8 are logged and dropped.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(
                        len = e.as_bytes().len(),
                        error = %e.utf8_error(),
                        "Dropping binary payload that is not valid UTF-8"
                    );
                    None
                }
            },
        }
    }
}

/// One message as it appears in a request
#[derive(Clone, Debug, Serialize)]
pub struct WireMessage<'a> {
    /// Author role
    pub role: MessageRole,
    /// Message body
    pub content: &'a str,
    /// Capture context, omitted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a MessageMetadata>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role,
            content: &message.content,
            metadata: message.metadata.as_ref(),
        }
    }
}

/// Request frame for one user turn
#[derive(Clone, Debug, Serialize)]
pub struct OutboundRequest<'a> {
    /// Full message log, oldest first
    pub messages: Vec<WireMessage<'a>>,
    /// Base64-encoded image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_bytes: Option<String>,
    /// Whether the service should run its deeper analysis pass
    pub smarter_analysis_enabled: bool,
}

impl<'a> OutboundRequest<'a> {
    /// Build a request from a log snapshot
    #[must_use]
    pub fn new(
        messages: &'a [Message],
        image_bytes: Option<String>,
        smarter_analysis_enabled: bool,
    ) -> Self {
        Self {
            messages: messages.iter().map(WireMessage::from).collect(),
            image_bytes,
            smarter_analysis_enabled,
        }
    }

    /// Serialize to the JSON text frame
    ///
    /// # Errors
    ///
    /// Returns the serializer error; this does not happen for well-formed logs.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let log = vec![
            Message::user(
                "what is this?",
                MessageMetadata::from_parts(Some("Error 42"), None, None),
            ),
            Message::assistant("An error code."),
            Message::user("thanks", None),
        ];

        let encoded = OutboundRequest::new(&log, None, true).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(
            value,
            json!({
                "messages": [
                    {"role": "user", "content": "what is this?", "metadata": {"ocr_text": "Error 42"}},
                    {"role": "assistant", "content": "An error code."},
                    {"role": "user", "content": "thanks"}
                ],
                "smarter_analysis_enabled": true
            })
        );
    }

    #[test]
    fn test_request_includes_image_when_present() {
        let log = vec![Message::user("look", None)];
        let encoded = OutboundRequest::new(&log, Some("aGk=".into()), false)
            .encode()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["image_bytes"], "aGk=");
        assert_eq!(value["smarter_analysis_enabled"], false);
    }

    #[test]
    fn test_binary_payload_decoding() {
        let ok = InboundPayload::Binary("héllo".as_bytes().to_vec());
        assert_eq!(ok.into_text().as_deref(), Some("héllo"));

        let bad = InboundPayload::Binary(vec![0xff, 0xfe, 0x00]);
        assert_eq!(bad.into_text(), None);

        let text = InboundPayload::Text("plain".into());
        assert_eq!(text.into_text().as_deref(), Some("plain"));
    }
}
