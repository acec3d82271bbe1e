//! Bearer stamping and the 401 refresh-and-retry protocol.
//!
//! ARCHITECTURE
//! ============
//! [`AuthStamper`] attaches the current token to every non-public request.
//! [`AuthFailureHandler`] sits outside it and watches the outcome:
//!
//! - 401: refresh the token once, then retry the request once through the
//!   inner stages (re-stamped with the new token, counted as a new load).
//! - other failures: classify and publish on the signal bus.
//!
//! REFRESH GATE
//! ============
//! Concurrent 401s share one refresh. The first request to hit the gate
//! becomes the leader and calls the refresher; the rest wait on the gate's
//! `watch` channel and retry once the leader publishes `Refreshed`. A 401
//! for a request sent with a token that has since been rotated skips the
//! gate and retries directly.
//!
//! A 401 on a retried request is terminal: the session is cleared and the
//! user is sent to login. Refreshes never cascade.

use std::sync::{Arc, Weak};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tokio::sync::watch;

use super::classify::{FailureKind, classify};
use super::types::{RefreshRequest, SignInResponse};
use super::{ApiError, ApiRequest, ApiResponse, Middleware, Next, SKIP_ERROR_HEADER, Transport};
use crate::guard::LOGIN_PATH;
use crate::router::Navigator;
use crate::session::SessionStore;
use crate::signals::{ErrorCode, RetryAction, SignalBus};

const JSON: &str = "application/json";

/// URL fragments that never carry a bearer token.
pub const DEFAULT_PUBLIC_PATTERNS: [&str; 6] = ["/sent/otp", "/signIn", "/refresh/token", "/assets/", ".json", "i18n/"];

// =============================================================================
// PUBLIC ENDPOINTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicEndpoints {
    patterns: Vec<String>,
}

impl Default for PublicEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATTERNS)
    }
}

impl PublicEndpoints {
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { patterns: patterns.into_iter().map(Into::into).collect() }
    }

    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| url.contains(p.as_str()))
    }
}

// =============================================================================
// STAMPER
// =============================================================================

pub struct AuthStamper {
    session: Arc<SessionStore>,
    public: PublicEndpoints,
}

impl AuthStamper {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, public: PublicEndpoints) -> Self {
        Self { session, public }
    }

    fn stamp(&self, request: &mut ApiRequest) {
        let Some(token) = self.session.token() else {
            tracing::debug!(request_id = %request.id, "no token; sending unauthenticated");
            return;
        };
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                request.headers.insert(AUTHORIZATION, value);
                request.headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
                request.headers.insert(ACCEPT, HeaderValue::from_static(JSON));
            }
            Err(_) => tracing::warn!(request_id = %request.id, "token is not a valid header value; not stamped"),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthStamper {
    async fn handle(&self, mut request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, ApiError> {
        if !self.public.matches(&request.url) {
            self.stamp(&mut request);
        }
        next.run(request).await
    }
}

// =============================================================================
// TOKEN REFRESH
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// `None` keeps the current refresh token.
    pub refresh_token: Option<String>,
}

/// Exchanges a refresh token for a new access token.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the refresh token was rejected or the call failed.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ApiError>;
}

/// Calls the auth service directly on the transport, bypassing the pipeline.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    url: String,
}

impl HttpTokenRefresher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self { transport, url: url.into() }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ApiError> {
        let body = serde_json::to_value(RefreshRequest { refresh_token })?;
        let request = ApiRequest::post(&self.url, body).with_header(CONTENT_TYPE.as_str(), JSON);
        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                message: response.server_message(),
                body: response.body,
            });
        }
        let parsed: SignInResponse = serde_json::from_value(response.body.clone())?;
        let Some(access_token) = parsed.access_token().map(str::to_owned) else {
            return Err(ApiError::Status {
                status: StatusCode::UNAUTHORIZED,
                message: Some(parsed.message).filter(|m| !m.is_empty()),
                body: response.body,
            });
        };
        Ok(RefreshedTokens { access_token, refresh_token: parsed.refresh_token })
    }
}

// =============================================================================
// REFRESH GATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum RefreshState {
    Idle,
    InFlight,
    Refreshed,
    Failed,
}

struct RefreshGate {
    state: watch::Sender<RefreshState>,
}

enum Ticket<'a> {
    Leader(RefreshLease<'a>),
    Follower(watch::Receiver<RefreshState>),
}

impl RefreshGate {
    fn new() -> Self {
        let (state, _) = watch::channel(RefreshState::Idle);
        Self { state }
    }

    /// Claim the refresh, or join the one already running.
    fn enter(&self) -> Ticket<'_> {
        let mut leader = false;
        self.state.send_if_modified(|state| {
            if *state == RefreshState::InFlight {
                return false;
            }
            *state = RefreshState::InFlight;
            leader = true;
            true
        });
        if leader {
            Ticket::Leader(RefreshLease { gate: self, settled: false })
        } else {
            Ticket::Follower(self.state.subscribe())
        }
    }

    async fn outcome(mut rx: watch::Receiver<RefreshState>) -> RefreshState {
        loop {
            {
                let state = rx.borrow_and_update();
                if *state != RefreshState::InFlight {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return RefreshState::Failed;
            }
        }
    }
}

/// Leader's hold on the gate. Dropping it unsettled (e.g. the leader's
/// future was cancelled) releases waiters with `Failed`.
struct RefreshLease<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl RefreshLease<'_> {
    fn settle(mut self, outcome: RefreshState) {
        self.gate.state.send_replace(outcome);
        self.settled = true;
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.state.send_replace(RefreshState::Failed);
        }
    }
}

// =============================================================================
// FAILURE HANDLER
// =============================================================================

pub struct AuthFailureHandler {
    session: Arc<SessionStore>,
    signals: Arc<SignalBus>,
    navigator: Arc<Navigator>,
    refresher: Arc<dyn TokenRefresher>,
    public: PublicEndpoints,
    gate: RefreshGate,
}

impl AuthFailureHandler {
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        signals: Arc<SignalBus>,
        navigator: Arc<Navigator>,
        refresher: Arc<dyn TokenRefresher>,
        public: PublicEndpoints,
    ) -> Self {
        Self { session, signals, navigator, refresher, public, gate: RefreshGate::new() }
    }

    async fn recover(
        &self,
        request: &ApiRequest,
        sent_with: Option<String>,
        publish: bool,
        next: Next<'_>,
    ) -> Result<ApiResponse, ApiError> {
        let current = self.session.token();
        if current.is_some() && current != sent_with {
            tracing::debug!(request_id = %request.id, "token rotated while in flight; retrying");
            return self.retry_once(request, publish, next).await;
        }

        match self.gate.enter() {
            Ticket::Follower(rx) => {
                tracing::debug!(request_id = %request.id, "waiting for in-flight token refresh");
                match RefreshGate::outcome(rx).await {
                    RefreshState::Refreshed => self.retry_once(request, publish, next).await,
                    _ => {
                        if self.session.is_authenticated() {
                            self.expire("token refresh abandoned", publish);
                        }
                        Err(ApiError::SessionExpired)
                    }
                }
            }
            Ticket::Leader(lease) => {
                let Some(refresh_token) = self.session.refresh_token() else {
                    lease.settle(RefreshState::Failed);
                    self.expire("no refresh token available", publish);
                    return Err(ApiError::SessionExpired);
                };
                tracing::info!(request_id = %request.id, "access token rejected; refreshing");
                match self.refresher.refresh(&refresh_token).await {
                    Ok(tokens) => {
                        if !self.session.replace_tokens(&refresh_token, tokens.access_token, tokens.refresh_token) {
                            lease.settle(RefreshState::Failed);
                            return Err(ApiError::SessionExpired);
                        }
                        lease.settle(RefreshState::Refreshed);
                        self.retry_once(request, publish, next).await
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "token refresh failed");
                        lease.settle(RefreshState::Failed);
                        self.expire("token refresh failed", publish);
                        Err(ApiError::SessionExpired)
                    }
                }
            }
        }
    }

    async fn retry_once(&self, request: &ApiRequest, publish: bool, next: Next<'_>) -> Result<ApiResponse, ApiError> {
        let response = next.run(request.clone()).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            self.expire("retried request still unauthorized", publish);
            return Err(ApiError::SessionExpired);
        }
        Ok(response)
    }

    /// Full logout: clear the session and send the user to login.
    fn expire(&self, reason: &str, publish: bool) {
        tracing::warn!(reason, "session expired; logging out");
        self.session.clear();
        self.navigator.navigate(LOGIN_PATH);
        if publish {
            self.signals.show_error_with_title(
                Some("Session Expired".to_owned()),
                "Your session has expired. Please log in again.",
                Some(ErrorCode::Status(StatusCode::UNAUTHORIZED.as_u16())),
                None,
            );
        }
    }

    fn publish(&self, request: &ApiRequest, kind: FailureKind, server_message: Option<String>) {
        let category = classify(kind, request.is_idempotent_read(), server_message);
        tracing::error!(
            request_id = %request.id,
            method = %request.method,
            url = %request.url,
            code = %category.code,
            "{}: {}",
            category.title,
            category.message
        );
        let retry = category.retryable.then(|| self.reload_action());
        self.signals
            .show_error_with_title(Some(category.title), category.message, Some(category.code), retry);
    }

    fn reload_action(&self) -> RetryAction {
        let navigator: Weak<Navigator> = Arc::downgrade(&self.navigator);
        Arc::new(move || {
            if let Some(navigator) = navigator.upgrade() {
                navigator.reload();
            }
        })
    }
}

#[async_trait::async_trait]
impl Middleware for AuthFailureHandler {
    async fn handle(&self, mut request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, ApiError> {
        if self.public.matches(&request.url) {
            return next.run(request).await;
        }
        let publish = !request.take_header(SKIP_ERROR_HEADER);
        let sent_with = self.session.token();

        let response = match next.run(request.clone()).await {
            Ok(response) if response.status == StatusCode::UNAUTHORIZED => {
                self.recover(&request, sent_with, publish, next).await
            }
            other => other,
        };

        match response {
            Ok(response) => {
                if publish && !response.status.is_success() {
                    let kind = FailureKind::from_status(response.status.as_u16());
                    self.publish(&request, kind, response.server_message());
                }
                Ok(response)
            }
            Err(ApiError::SessionExpired) => Err(ApiError::SessionExpired),
            Err(e) => {
                if publish {
                    let kind = match &e {
                        ApiError::Timeout => FailureKind::Timeout,
                        other => FailureKind::from_status(other.status_code().unwrap_or(0)),
                    };
                    self.publish(&request, kind, None);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
