//! Toast-style notifications (success, error, warning, info).
//!
//! Only the latest message is kept; a new one replaces it.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);
pub const DEFAULT_ERROR_DURATION: Duration = Duration::from_millis(10_000);
pub const FALLBACK_ERROR_TEXT: &str = "Server Down! Try Again Later";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub kind: MessageKind,
    pub duration: Duration,
    /// Raw server payload behind an error, for detailed rendering.
    pub detail: Option<Value>,
}

impl Message {
    #[must_use]
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        let duration = if kind == MessageKind::Error { DEFAULT_ERROR_DURATION } else { DEFAULT_DURATION };
        Self { text: text.into(), kind, duration, detail: None }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Pull the human-readable text out of a backend error payload.
///
/// Backends report it as `errorMessage` or `message`; a bare JSON string is
/// used as-is.
#[must_use]
pub fn server_error_text(body: &Value) -> Option<String> {
    let text = match body {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => ["errorMessage", "message"]
            .into_iter()
            .find_map(|key| map.get(key).and_then(Value::as_str)),
        _ => None,
    };
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

pub struct MessageChannel {
    current: watch::Sender<Option<Message>>,
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageChannel {
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    pub fn show(&self, message: Message) {
        tracing::debug!(kind = ?message.kind, text = %message.text, "message");
        self.current.send_replace(Some(message));
    }

    pub fn success(&self, text: impl Into<String>) {
        self.show(Message::new(MessageKind::Success, text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.show(Message::new(MessageKind::Error, text));
    }

    /// Show an error built from a server payload, falling back to `fallback`.
    pub fn error_from_body(&self, body: &Value, fallback: &str) {
        let text = server_error_text(body).unwrap_or_else(|| fallback.to_owned());
        self.show(Message::new(MessageKind::Error, text).with_detail(body.clone()));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.show(Message::new(MessageKind::Warning, text));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.show(Message::new(MessageKind::Info, text));
    }

    pub fn clear(&self) {
        self.current.send_replace(None);
    }

    #[must_use]
    pub fn current(&self) -> Option<Message> {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Message>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
