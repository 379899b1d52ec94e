//! Terminal rendering of the live response
//!
//! The client reports the whole current response on every update. Streamed
//! fragments usually extend what is already on screen, so only the new tail
//! is printed; a structured frame may rewrite the text, in which case the
//! line is started over.

use std::io::Write;

use horizon_core::ChatObserver;
use parking_lot::Mutex;

/// How the screen has to change to show `current`
#[derive(Debug, PartialEq, Eq)]
pub enum Delta<'a> {
    /// Nothing new
    Unchanged,
    /// Print this tail after what is shown
    Append(&'a str),
    /// Start a fresh line with the full text
    Replace(&'a str),
}

/// Compare what is shown with the new response text
pub fn delta<'a>(shown: &str, current: &'a str) -> Delta<'a> {
    if current == shown {
        Delta::Unchanged
    } else if let Some(tail) = current.strip_prefix(shown) {
        Delta::Append(tail)
    } else {
        Delta::Replace(current)
    }
}

/// Observer that writes the response to stdout and link changes to stderr
#[derive(Default)]
pub struct StdoutRenderer {
    shown: Mutex<String>,
}

impl StdoutRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// End the response line before the next prompt
    pub fn finish_turn(&self) {
        let mut shown = self.shown.lock();
        if !shown.is_empty() {
            println!();
            shown.clear();
        }
    }
}

impl ChatObserver for StdoutRenderer {
    fn on_message_update(&self, current: &str) {
        let mut shown = self.shown.lock();
        let mut out = std::io::stdout().lock();
        let written = match delta(&shown, current) {
            Delta::Unchanged => return,
            Delta::Append(tail) => write!(out, "{tail}"),
            Delta::Replace(text) if shown.is_empty() => write!(out, "{text}"),
            Delta::Replace(text) => write!(out, "\n{text}"),
        };
        if written.and_then(|()| out.flush()).is_ok() {
            current.clone_into(&mut *shown);
        }
    }

    fn on_connection_changed(&self, connected: bool) {
        if connected {
            eprintln!("[connected]");
        } else {
            eprintln!("[disconnected]");
        }
    }
}
