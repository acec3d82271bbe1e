//! Request pipeline: typed requests, middleware chain, and the API client.
//!
//! ARCHITECTURE
//! ============
//! ```text
//! ApiClient ─► AuthFailureHandler ─► AuthStamper ─► LoadingSignal ─► Transport
//! ```
//! Each stage implements [`Middleware`] and receives the request plus a
//! [`Next`] continuation for the rest of the chain. `Next` is `Copy`, so a
//! stage may dispatch more than once; the failure handler uses that to
//! retry after a refresh, and the retry is re-stamped and re-counted by the
//! inner stages like any new request.
//!
//! ERROR HANDLING
//! ==============
//! The transport reports every HTTP status as a response. Stages inspect
//! statuses; only [`ApiClient`] turns a non-2xx into [`ApiError::Status`].

pub mod auth;
pub mod classify;
pub mod loading;
pub mod transport;
pub mod types;

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

pub use transport::{ReqwestTransport, Transport, TransportError};

use crate::messages::server_error_text;
use crate::signals::{CodedError, ErrorCode};

/// Opt a request out of the loading counter.
pub const SKIP_LOADING_HEADER: &str = "x-skip-loading";
/// Opt a request out of publishing failures to the signal bus.
pub const SKIP_ERROR_HEADER: &str = "x-skip-error";

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Correlates log lines for one logical call, retries included.
    pub id: Uuid,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), method, url: url.into(), headers: HeaderMap::new(), body: None }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header. Invalid names or values are dropped with a warning.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "dropping invalid request header"),
        }
        self
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Remove a marker header, reporting whether it was present.
    pub fn take_header(&mut self, name: &str) -> bool {
        self.headers.remove(name).is_some()
    }

    /// Bearer token carried in `Authorization`, if any.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Safe methods; only these get a reload offered on failure.
    #[must_use]
    pub fn is_idempotent_read(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        server_error_text(&self.body)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or("request failed"))]
    Status { status: StatusCode, message: Option<String>, body: Value },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("session expired")]
    SessionExpired,
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Connect(msg) => Self::Network(msg),
        }
    }
}

impl ApiError {
    /// HTTP status behind the error; network failures report `0`.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            Self::Network(_) => Some(0),
            Self::Timeout => Some(StatusCode::GATEWAY_TIMEOUT.as_u16()),
            Self::SessionExpired => Some(StatusCode::UNAUTHORIZED.as_u16()),
            Self::Decode(_) => None,
        }
    }

    /// Text suitable for a toast: the server's own message when it sent one.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Status { message: Some(message), .. } => message.clone(),
            Self::Network(msg) if !msg.is_empty() => msg.clone(),
            Self::SessionExpired => "Your session has expired. Please log in again.".to_owned(),
            _ => fallback.to_owned(),
        }
    }

    /// Raw server payload, when the failure carried one.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl CodedError for ApiError {
    fn error_code(&self) -> Option<ErrorCode> {
        self.status_code().map(ErrorCode::Status)
    }

    fn error_message(&self) -> String {
        self.user_message(&self.to_string())
    }
}

// =============================================================================
// MIDDLEWARE CHAIN
// =============================================================================

/// One stage of the request pipeline.
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    /// Handle `request`, forwarding to `next` zero or more times.
    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, ApiError>;
}

/// Continuation for the remainder of the pipeline.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn run(self, request: ApiRequest) -> BoxFuture<'a, Result<ApiResponse, ApiError>> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(request, Next { stages: rest, transport: self.transport }),
            None => {
                let transport = self.transport;
                Box::pin(async move { transport.send(request).await.map_err(ApiError::from) })
            }
        }
    }
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    /// Build a pipeline; `stages` run outermost first.
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn Middleware>>, transport: Arc<dyn Transport>) -> Self {
        Self { stages, transport }
    }

    /// Dispatch `request` through every stage.
    ///
    /// # Errors
    ///
    /// Returns whatever error a stage or the transport produced.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        Next { stages: &self.stages, transport: self.transport.as_ref() }
            .run(request)
            .await
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<Pipeline>,
}

impl ApiClient {
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Send a request; non-2xx statuses become [`ApiError::Status`].
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, expired sessions, and non-2xx statuses.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let method = request.method.clone();
        let url = request.url.clone();
        let response = self.pipeline.dispatch(request).await?;
        if !response.status.is_success() {
            tracing::debug!(%method, %url, status = response.status.as_u16(), "request failed");
            return Err(ApiError::Status {
                status: response.status,
                message: response.server_message(),
                body: response.body,
            });
        }
        Ok(response)
    }

    /// `GET` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`]; also fails if the body does not decode as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::get(url)).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// `POST` a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`]; also fails if the body does not decode as `T`.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self.send(ApiRequest::post(url, body)).await?;
        Ok(serde_json::from_value(response.body)?)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
