//! Shared fakes for the transport and refresh seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use crate::http::auth::{RefreshedTokens, TokenRefresher};
use crate::http::transport::status_response;
use crate::http::{ApiError, ApiRequest, ApiResponse, Transport, TransportError};
use crate::router::Navigator;
use crate::session::{MemoryStorage, PersistedSession, SessionStore};
use crate::signals::SignalBus;

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

// =========================================================================
// ScriptedTransport
// =========================================================================

/// Answers every request with `handler` and records what it was sent.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    delay: Duration,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Self { handler: Box::new(handler), delay: Duration::ZERO, requests: Mutex::new(Vec::new()) }
    }

    /// Always answer `200` with `body`.
    pub fn ok(body: Value) -> Self {
        Self::new(move |_| Ok(ApiResponse::ok(body.clone())))
    }

    /// Always answer with `status`.
    pub fn status(status: u16) -> Self {
        Self::new(move |_| Ok(status_response(status, json!({}))))
    }

    /// Answer `200` only for requests bearing `Bearer {token}`; `401` otherwise.
    pub fn requiring_token(token: &'static str) -> Self {
        Self::new(move |req| {
            if req.bearer() == Some(token) {
                Ok(ApiResponse::ok(json!({ "ok": true })))
            } else {
                Ok(status_response(401, json!({ "message": "Unauthorized" })))
            }
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn bearers(&self) -> Vec<Option<String>> {
        self.requests().iter().map(|r| r.bearer().map(str::to_owned)).collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(&request)
    }
}

// =========================================================================
// MockRefresher
// =========================================================================

/// Issues a fixed token pair, or fails, after an optional delay.
pub struct MockRefresher {
    result: Result<RefreshedTokens, u16>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockRefresher {
    pub fn issuing(access: &str, refresh: Option<&str>) -> Self {
        Self {
            result: Ok(RefreshedTokens {
                access_token: access.to_owned(),
                refresh_token: refresh.map(str::to_owned),
            }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self { result: Err(status), ..Self::issuing("", None) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TokenRefresher for MockRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(refresh_token.to_owned());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.result {
            Ok(tokens) => Ok(tokens.clone()),
            Err(status) => Err(ApiError::Status {
                status: reqwest::StatusCode::from_u16(*status).unwrap(),
                message: Some("refresh rejected".into()),
                body: json!({}),
            }),
        }
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// A session already signed in with `token` / `refresh`.
pub fn signed_in(token: &str, refresh: Option<&str>) -> Arc<SessionStore> {
    let storage = MemoryStorage::with_session(PersistedSession {
        jwt: Some(token.to_owned()),
        refresh_token: refresh.map(str::to_owned),
        role: Some("ADMIN".to_owned()),
    });
    Arc::new(SessionStore::new(Arc::new(storage)))
}

pub fn signed_out() -> Arc<SessionStore> {
    Arc::new(SessionStore::in_memory())
}

/// Signal bus and navigator sharing `session`.
pub fn shell(session: &Arc<SessionStore>) -> (Arc<SignalBus>, Arc<Navigator>) {
    let signals = Arc::new(SignalBus::new());
    let navigator = Arc::new(Navigator::new(Arc::clone(session), Arc::clone(&signals)));
    (signals, navigator)
}
