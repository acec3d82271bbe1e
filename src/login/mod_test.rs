use super::*;
use crate::http::loading::LoadingSignal;
use crate::http::transport::status_response;
use crate::http::{ApiRequest, ApiResponse, Middleware, Pipeline, Transport, TransportError};
use crate::messages::MessageKind;
use crate::test_helpers::{self, ScriptedTransport};
use serde_json::json;

const EMAIL: &str = "a@b.com";

/// Auth service fake: any email gets a code, `123456` signs in.
fn auth_service(req: &ApiRequest) -> Result<ApiResponse, TransportError> {
    let body = req.body.clone().unwrap_or_default();
    if req.url.ends_with("/sent/otp") {
        return Ok(ApiResponse::ok(json!({ "status": true, "message": "OTP sent successfully!" })));
    }
    if req.url.ends_with("/signIn") {
        if body["otp"] == "123456" {
            return Ok(ApiResponse::ok(json!({
                "status": true,
                "message": "Signed in",
                "jwt": "X",
                "refreshToken": "R",
                "role": "ROLE_ADMIN",
            })));
        }
        return Ok(status_response(400, json!({ "errorMessage": "Invalid OTP" })));
    }
    Ok(status_response(404, json!({})))
}

struct Fixture {
    flow: LoginFlow,
    transport: Arc<ScriptedTransport>,
    session: Arc<SessionStore>,
    messages: Arc<MessageChannel>,
    navigator: Arc<Navigator>,
}

fn fixture_with(transport: ScriptedTransport, resend_secs: u32) -> Fixture {
    let transport = Arc::new(transport);
    let session = test_helpers::signed_out();
    let (signals, navigator) = test_helpers::shell(&session);
    let messages = Arc::new(MessageChannel::new());
    let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(LoadingSignal::new(signals))];
    let wire: Arc<dyn Transport> = transport.clone();
    let client = ApiClient::new(Arc::new(Pipeline::new(stages, wire)));
    let mut config = AppConfig::default();
    config.otp_resend_secs = resend_secs;
    let flow = LoginFlow::new(client, &config, Arc::clone(&session), Arc::clone(&messages), Arc::clone(&navigator))
        .with_tick(Duration::from_millis(1));
    Fixture { flow, transport, session, messages, navigator }
}

fn fixture() -> Fixture {
    fixture_with(ScriptedTransport::new(auth_service), 60)
}

fn last_message(f: &Fixture) -> (MessageKind, String) {
    let message = f.messages.current().unwrap();
    (message.kind, message.text)
}

async fn wait_for_resend(flow: &LoginFlow) {
    let mut rx = flow.subscribe_cooldown();
    while !rx.borrow_and_update().can_resend() {
        rx.changed().await.unwrap();
    }
}

// =========================================================================
// request_otp
// =========================================================================

#[tokio::test]
async fn blank_email_is_rejected_locally() {
    let mut f = fixture();

    let err = f.flow.request_otp("   ").await.unwrap_err();

    assert!(matches!(err, LoginError::EmailRequired));
    assert_eq!(f.transport.calls(), 0);
    assert_eq!(last_message(&f), (MessageKind::Error, "Please enter your email".into()));
    assert_eq!(f.flow.state(), LoginState::Idle);
}

#[tokio::test]
async fn request_otp_success_starts_cooldown() {
    let mut f = fixture();

    f.flow.request_otp(" a@b.com ").await.unwrap();

    assert_eq!(f.flow.state(), LoginState::OtpRequested);
    assert_eq!(f.flow.email(), Some(EMAIL));
    assert_eq!(f.flow.cooldown().remaining(), 60);
    assert!(!f.flow.can_resend());
    assert_eq!(last_message(&f), (MessageKind::Success, "OTP sent successfully!".into()));
    assert_eq!(f.transport.requests()[0].body, Some(json!({ "email": EMAIL })));
}

#[tokio::test]
async fn request_otp_refused_keeps_state() {
    let transport = ScriptedTransport::ok(json!({ "status": false, "message": "Email not registered" }));
    let mut f = fixture_with(transport, 60);

    let err = f.flow.request_otp(EMAIL).await.unwrap_err();

    assert!(matches!(err, LoginError::Rejected(ref m) if m == "Email not registered"));
    assert_eq!(f.flow.state(), LoginState::Idle);
    assert!(f.flow.can_resend());
    assert_eq!(f.transport.calls(), 1);
}

#[tokio::test]
async fn request_otp_surfaces_server_message() {
    let transport = ScriptedTransport::new(|_| Ok(status_response(400, json!({ "errorMessage": "User blocked" }))));
    let mut f = fixture_with(transport, 60);

    let err = f.flow.request_otp(EMAIL).await.unwrap_err();

    assert!(matches!(err, LoginError::Api(_)));
    assert_eq!(last_message(&f), (MessageKind::Error, "User blocked".into()));
    assert_eq!(f.flow.state(), LoginState::Idle);
    assert_eq!(f.transport.calls(), 1);
}

#[tokio::test]
async fn request_otp_surfaces_network_failure() {
    let transport = ScriptedTransport::new(|_| Err(TransportError::Connect("connection refused".into())));
    let mut f = fixture_with(transport, 60);

    f.flow.request_otp(EMAIL).await.unwrap_err();

    assert_eq!(last_message(&f), (MessageKind::Error, "connection refused".into()));
}

// =========================================================================
// resend_otp
// =========================================================================

#[tokio::test]
async fn resend_before_request_is_refused() {
    let mut f = fixture();
    assert!(matches!(f.flow.resend_otp().await, Err(LoginError::NotRequested)));
    assert_eq!(f.transport.calls(), 0);
}

#[tokio::test]
async fn resend_blocked_while_cooldown_runs() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();

    let err = f.flow.resend_otp().await.unwrap_err();

    assert!(matches!(err, LoginError::CooldownActive { remaining: 60 }));
    assert_eq!(f.transport.calls(), 1);
}

#[tokio::test]
async fn resend_after_cooldown_requests_again_and_restarts() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();
    assert_eq!(f.flow.cooldown().remaining(), 60);

    wait_for_resend(&f.flow).await;
    assert!(f.flow.can_resend());

    f.flow.resend_otp().await.unwrap();

    assert_eq!(f.transport.calls(), 2);
    assert_eq!(f.transport.requests()[1].body, Some(json!({ "email": EMAIL })));
    assert_eq!(f.flow.cooldown().remaining(), 60);
}

#[tokio::test]
async fn cooldown_length_is_configurable() {
    let mut f = fixture_with(ScriptedTransport::new(auth_service), 3);
    f.flow.request_otp(EMAIL).await.unwrap();
    assert_eq!(f.flow.cooldown().remaining(), 3);
}

// =========================================================================
// verify_otp
// =========================================================================

#[tokio::test]
async fn malformed_codes_are_rejected_locally() {
    let mut f = fixture();
    for code in ["", "12345", "1234567", "12a456", "١٢٣٤٥٦", " 123456 ", "123456\n"] {
        let err = f.flow.verify_otp(EMAIL, code).await.unwrap_err();
        assert!(matches!(err, LoginError::InvalidCode), "{code:?}");
    }
    assert_eq!(f.transport.calls(), 0);
}

#[tokio::test]
async fn verify_success_signs_in_and_navigates() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();
    let mut authenticated = f.session.subscribe();

    f.flow.verify_otp(EMAIL, "123456").await.unwrap();

    assert_eq!(f.session.token().as_deref(), Some("X"));
    assert_eq!(f.session.refresh_token().as_deref(), Some("R"));
    assert_eq!(f.session.role().as_deref(), Some("ROLE_ADMIN"));
    assert!(authenticated.has_changed().unwrap());
    assert!(*authenticated.borrow_and_update());
    assert_eq!(f.flow.state(), LoginState::Authenticated);
    assert_eq!(f.navigator.current(), "/dashboard");
    assert_eq!(last_message(&f), (MessageKind::Success, "Login successful!".into()));
    assert_eq!(f.transport.requests()[1].body, Some(json!({ "email": EMAIL, "otp": "123456" })));
}

#[tokio::test]
async fn verify_without_prior_request() {
    let mut f = fixture();
    f.flow.verify_otp(EMAIL, "123456").await.unwrap();
    assert_eq!(f.session.token().as_deref(), Some("X"));
}

#[tokio::test]
async fn verify_success_cancels_countdown() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();

    f.flow.verify_otp(EMAIL, "123456").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(f.flow.cooldown().remaining(), 60);
}

#[tokio::test]
async fn verify_failure_clears_code_and_keeps_session() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();
    f.flow.input_mut().paste("654321");
    assert_eq!(f.flow.input().focused(), 5);

    let err = f.flow.verify_entered().await.unwrap_err();

    assert!(matches!(err, LoginError::Api(_)));
    assert_eq!(f.flow.input().value(), "");
    assert_eq!(f.flow.input().focused(), 0);
    assert_eq!(f.flow.state(), LoginState::OtpRequested);
    assert!(!f.session.is_authenticated());
    assert_eq!(last_message(&f), (MessageKind::Error, "Invalid OTP".into()));
}

#[tokio::test]
async fn verify_without_token_is_rejected() {
    let transport = ScriptedTransport::ok(json!({ "status": true, "message": "" }));
    let mut f = fixture_with(transport, 60);

    let err = f.flow.verify_otp(EMAIL, "123456").await.unwrap_err();

    assert!(matches!(err, LoginError::Rejected(_)));
    assert_eq!(f.flow.state(), LoginState::Idle);
    assert!(!f.session.is_authenticated());
}

#[tokio::test]
async fn verify_entered_uses_typed_digits() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();
    for ch in "123456".chars() {
        assert!(f.flow.input_mut().enter(ch));
    }

    f.flow.verify_entered().await.unwrap();

    assert!(f.session.is_authenticated());
}

#[tokio::test]
async fn verify_entered_requires_requested_email() {
    let mut f = fixture();
    assert!(matches!(f.flow.verify_entered().await, Err(LoginError::NotRequested)));
}

// =========================================================================
// teardown
// =========================================================================

#[tokio::test]
async fn teardown_stops_countdown() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();

    f.flow.teardown();
    let rx = f.flow.subscribe_cooldown();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!rx.has_changed().unwrap());
    assert!(f.flow.can_resend());
}

#[tokio::test]
async fn drop_aborts_countdown() {
    let mut f = fixture();
    f.flow.request_otp(EMAIL).await.unwrap();
    let rx = f.flow.subscribe_cooldown();
    let Fixture { flow, .. } = f;

    drop(flow);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The sender is gone once the aborted task releases it.
    assert!(rx.has_changed().is_err());
}

// =========================================================================
// ResendCooldown / OtpInput
// =========================================================================

#[test]
fn cooldown_permits_resend_exactly_at_zero() {
    let mut cooldown = ResendCooldown::start(3);
    assert!(!cooldown.can_resend());
    assert!(cooldown.tick());
    assert!(cooldown.tick());
    assert!(!cooldown.can_resend());
    assert!(!cooldown.tick());
    assert!(cooldown.can_resend());
    assert!(!cooldown.tick());
    assert_eq!(cooldown.remaining(), 0);
}

#[test]
fn sixty_simulated_seconds() {
    let mut cooldown = ResendCooldown::start(60);
    for _ in 0..59 {
        cooldown.tick();
        assert!(!cooldown.can_resend());
    }
    cooldown.tick();
    assert!(cooldown.can_resend());
}

#[test]
fn input_enter_advances_and_rejects_non_digits() {
    let mut input = OtpInput::new();
    assert!(input.enter('1'));
    assert!(!input.enter('x'));
    assert!(input.enter('2'));
    assert_eq!(input.value(), "12");
    assert_eq!(input.focused(), 2);
    assert!(!input.is_complete());
}

#[test]
fn input_focus_stays_on_last_cell() {
    let mut input = OtpInput::new();
    for ch in "1234567".chars() {
        input.enter(ch);
    }
    assert_eq!(input.value(), "123457");
    assert_eq!(input.focused(), OTP_LENGTH - 1);
    assert!(input.is_complete());
}

#[test]
fn input_paste_keeps_digits_only() {
    let mut input = OtpInput::new();
    assert_eq!(input.paste("12-34 5"), 5);
    assert_eq!(input.value(), "12345");
    assert_eq!(input.focused(), 5);
    assert_eq!(input.paste("no digits"), 0);
    assert_eq!(input.value(), "12345");
}

#[test]
fn input_backspace_steps_back() {
    let mut input = OtpInput::new();
    input.paste("12");
    input.backspace();
    assert_eq!(input.value(), "1");
    assert_eq!(input.focused(), 1);
    input.backspace();
    assert_eq!(input.value(), "");
    assert_eq!(input.focused(), 0);
    input.backspace();
    assert_eq!(input.focused(), 0);
}

#[test]
fn code_validation() {
    assert!(is_valid_code("000000"));
    assert!(!is_valid_code("00000"));
    assert!(!is_valid_code("00000a"));
}
