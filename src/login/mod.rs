//! Email + OTP sign-in flow.
//!
//! DESIGN
//! ======
//! ```text
//! Idle ──request_otp──► OtpRequested ──verify──► Verifying ──ok──► Authenticated
//!                            ▲                        │
//!                            └──────── failure ───────┘
//! ```
//! A failed request leaves the state where it was. A failed verification
//! returns to the state it started from, clears the entered code and moves
//! focus back to the first cell; the session is only written on success.
//!
//! The resend cooldown runs on a spawned task owned by the flow. It is
//! aborted on successful sign-in, on [`LoginFlow::teardown`], and on drop.
//!
//! ERROR HANDLING
//! ==============
//! Every failure is shown on the [`MessageChannel`] before it is returned,
//! so callers may ignore the `Err` without hiding anything from the user.

pub mod cooldown;
pub mod input;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use cooldown::ResendCooldown;
pub use input::{OTP_LENGTH, OtpInput, is_valid_code};

use crate::config::{AppConfig, Endpoint};
use crate::guard::DASHBOARD_PATH;
use crate::http::types::{OtpRequest, OtpResponse, SignInRequest, SignInResponse};
use crate::http::{ApiClient, ApiError};
use crate::messages::{FALLBACK_ERROR_TEXT, MessageChannel};
use crate::router::Navigator;
use crate::session::SessionStore;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    OtpRequested,
    Verifying,
    Authenticated,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("email is required")]
    EmailRequired,
    #[error("verification code must be 6 digits")]
    InvalidCode,
    #[error("resend available in {remaining}s")]
    CooldownActive { remaining: u32 },
    #[error("no verification code has been requested")]
    NotRequested,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct LoginFlow {
    client: ApiClient,
    send_otp_url: String,
    sign_in_url: String,
    session: Arc<SessionStore>,
    messages: Arc<MessageChannel>,
    navigator: Arc<Navigator>,
    state: watch::Sender<LoginState>,
    email: Option<String>,
    input: OtpInput,
    resend_secs: u32,
    cooldown: Arc<watch::Sender<ResendCooldown>>,
    countdown: Option<JoinHandle<()>>,
    tick: Duration,
}

impl LoginFlow {
    #[must_use]
    pub fn new(
        client: ApiClient,
        config: &AppConfig,
        session: Arc<SessionStore>,
        messages: Arc<MessageChannel>,
        navigator: Arc<Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(LoginState::Idle);
        let (cooldown, _) = watch::channel(ResendCooldown::idle());
        Self {
            client,
            send_otp_url: config.endpoint_url(Endpoint::SendOtp),
            sign_in_url: config.endpoint_url(Endpoint::SignIn),
            session,
            messages,
            navigator,
            state,
            email: None,
            input: OtpInput::new(),
            resend_secs: config.otp_resend_secs,
            cooldown: Arc::new(cooldown),
            countdown: None,
            tick: TICK,
        }
    }

    /// Length of one countdown step. One second unless overridden.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    #[must_use]
    pub fn state(&self) -> LoginState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn cooldown(&self) -> ResendCooldown {
        *self.cooldown.borrow()
    }

    #[must_use]
    pub fn subscribe_cooldown(&self) -> watch::Receiver<ResendCooldown> {
        self.cooldown.subscribe()
    }

    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.cooldown().can_resend()
    }

    /// Email the last successful OTP request went to.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn input(&self) -> &OtpInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut OtpInput {
        &mut self.input
    }

    fn set_state(&self, next: LoginState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = ?prev, to = ?next, "login state");
        }
    }

    /// Ask the auth service to email a code to `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if `email` is blank, the service refuses, or the call fails.
    pub async fn request_otp(&mut self, email: &str) -> Result<(), LoginError> {
        let email = email.trim();
        if email.is_empty() {
            self.messages.error("Please enter your email");
            return Err(LoginError::EmailRequired);
        }

        let body = OtpRequest { email };
        match self.client.post_json::<_, OtpResponse>(&self.send_otp_url, &body).await {
            Ok(response) if response.status => {
                tracing::info!(%email, "otp requested");
                self.email = Some(email.to_owned());
                self.input.clear();
                self.set_state(LoginState::OtpRequested);
                let text = non_empty(response.message).unwrap_or_else(|| format!("OTP sent to {email}"));
                self.messages.success(text);
                self.start_cooldown();
                Ok(())
            }
            Ok(response) => {
                let text = non_empty(response.message).unwrap_or_else(|| FALLBACK_ERROR_TEXT.to_owned());
                tracing::warn!(%email, reason = %text, "otp request refused");
                self.messages.error(text.clone());
                Err(LoginError::Rejected(text))
            }
            Err(e) => {
                tracing::warn!(%email, error = %e, "otp request failed");
                self.show_api_error(&e);
                Err(e.into())
            }
        }
    }

    /// Re-request a code for the same email once the cooldown has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::CooldownActive`] without any network call while
    /// the cooldown runs; otherwise see [`LoginFlow::request_otp`].
    pub async fn resend_otp(&mut self) -> Result<(), LoginError> {
        let Some(email) = self.email.clone() else {
            return Err(LoginError::NotRequested);
        };
        let cooldown = self.cooldown();
        if !cooldown.can_resend() {
            return Err(LoginError::CooldownActive { remaining: cooldown.remaining() });
        }
        self.request_otp(&email).await
    }

    /// Exchange `email` + `code` for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is malformed, the service refuses it, or
    /// the call fails.
    pub async fn verify_otp(&mut self, email: &str, code: &str) -> Result<(), LoginError> {
        let email = email.trim();
        if email.is_empty() {
            self.messages.error("Please enter your email");
            return Err(LoginError::EmailRequired);
        }
        if !is_valid_code(code) {
            self.messages.error("Please enter the 6-digit verification code");
            return Err(LoginError::InvalidCode);
        }

        let prior = self.state();
        self.set_state(LoginState::Verifying);
        let body = SignInRequest { email, otp: code };
        let result = self.client.post_json::<_, SignInResponse>(&self.sign_in_url, &body).await;

        match result {
            Ok(response) => {
                let Some(token) = response.access_token() else {
                    let text = non_empty(response.message.clone()).unwrap_or_else(|| "Invalid verification code".to_owned());
                    self.reject(prior);
                    self.messages.error(text.clone());
                    return Err(LoginError::Rejected(text));
                };
                self.session
                    .set_auth(token, response.refresh_token.clone(), response.role.clone());
                self.email = Some(email.to_owned());
                self.set_state(LoginState::Authenticated);
                self.stop_countdown();
                self.input.clear();
                self.messages.success("Login successful!");
                self.navigator.navigate(DASHBOARD_PATH);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%email, error = %e, "otp verification failed");
                self.reject(prior);
                self.show_api_error(&e);
                Err(e.into())
            }
        }
    }

    /// Verify the code currently held by [`LoginFlow::input`].
    ///
    /// # Errors
    ///
    /// See [`LoginFlow::verify_otp`]; also fails if no code was requested yet.
    pub async fn verify_entered(&mut self) -> Result<(), LoginError> {
        let Some(email) = self.email.clone() else {
            return Err(LoginError::NotRequested);
        };
        let code = self.input.value();
        self.verify_otp(&email, &code).await
    }

    /// Cancel the countdown; the flow may be reused afterwards.
    pub fn teardown(&mut self) {
        self.stop_countdown();
        self.cooldown.send_replace(ResendCooldown::idle());
    }

    fn reject(&mut self, prior: LoginState) {
        self.input.clear();
        self.set_state(prior);
    }

    fn show_api_error(&self, error: &ApiError) {
        match error.body() {
            Some(body) => self.messages.error_from_body(body, FALLBACK_ERROR_TEXT),
            None => self.messages.error(error.user_message(FALLBACK_ERROR_TEXT)),
        }
    }

    fn start_cooldown(&mut self) {
        self.stop_countdown();
        self.cooldown.send_replace(ResendCooldown::start(self.resend_secs));
        if self.resend_secs > 0 {
            self.countdown = Some(cooldown::spawn_countdown(Arc::clone(&self.cooldown), self.tick));
        }
    }

    fn stop_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }
}

impl Drop for LoginFlow {
    fn drop(&mut self) {
        self.stop_countdown();
    }
}

fn non_empty(text: String) -> Option<String> {
    Some(text).filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
