//! Desktop Collaborators
//!
//! The client does not capture screens, read clipboards or pop up
//! notifications itself. A host application plugs those in through
//! [`ContextProvider`] and [`NotificationSink`].

use async_trait::async_trait;

/// What the desktop looked like when the user started a turn
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedContext {
    /// Currently selected text
    pub selected_text: Option<String>,
    /// Text recognized in a screen capture
    pub ocr_text: Option<String>,
    /// URL of the focused browser tab
    pub browser_url: Option<String>,
    /// Raw image bytes of the screen capture
    pub image: Option<Vec<u8>>,
}

impl CapturedContext {
    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected_text.is_none()
            && self.ocr_text.is_none()
            && self.browser_url.is_none()
            && self.image.is_none()
    }
}

/// Captures desktop context for a turn
///
/// Capture is best effort: fields that could not be captured are `None`.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Capture the current context
    async fn capture(&self) -> CapturedContext;
}

/// Provider that always returns the same context
#[derive(Clone, Debug, Default)]
pub struct StaticContext(pub CapturedContext);

#[async_trait]
impl ContextProvider for StaticContext {
    async fn capture(&self) -> CapturedContext {
        self.0.clone()
    }
}

/// Shows short notices to the user
pub trait NotificationSink: Send + Sync {
    /// Show a notice
    fn notify(&self, title: &str, body: &str);
}

/// Sink that writes notices to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "Notification");
    }
}
