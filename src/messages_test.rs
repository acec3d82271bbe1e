use serde_json::json;

use super::*;

#[test]
fn message_defaults_by_kind() {
    assert_eq!(Message::new(MessageKind::Success, "ok").duration, DEFAULT_DURATION);
    assert_eq!(Message::new(MessageKind::Error, "no").duration, DEFAULT_ERROR_DURATION);
}

#[test]
fn channel_keeps_only_latest() {
    let channel = MessageChannel::new();
    assert!(channel.current().is_none());

    channel.success("OTP sent successfully!");
    channel.warning("careful");
    let current = channel.current().unwrap();
    assert_eq!(current.kind, MessageKind::Warning);
    assert_eq!(current.text, "careful");

    channel.clear();
    assert!(channel.current().is_none());
}

#[test]
fn server_error_text_prefers_error_message() {
    let body = json!({ "errorMessage": "User blocked", "message": "Bad Request" });
    assert_eq!(server_error_text(&body).as_deref(), Some("User blocked"));

    let body = json!({ "message": "Invalid OTP" });
    assert_eq!(server_error_text(&body).as_deref(), Some("Invalid OTP"));

    assert_eq!(server_error_text(&json!("plain text")).as_deref(), Some("plain text"));
    assert_eq!(server_error_text(&json!({ "message": "  " })), None);
    assert_eq!(server_error_text(&Value::Null), None);
}

#[test]
fn error_from_body_falls_back_and_keeps_detail() {
    let channel = MessageChannel::new();
    channel.error_from_body(&json!({ "code": 17 }), FALLBACK_ERROR_TEXT);
    let current = channel.current().unwrap();
    assert_eq!(current.kind, MessageKind::Error);
    assert_eq!(current.text, FALLBACK_ERROR_TEXT);
    assert_eq!(current.detail, Some(json!({ "code": 17 })));
}

#[tokio::test]
async fn subscribers_are_notified() {
    let channel = MessageChannel::new();
    let mut rx = channel.subscribe();
    channel.info("hello");
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().as_ref().map(|m| m.text.clone()).as_deref(), Some("hello"));
}
