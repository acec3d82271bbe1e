//! Bottom of the pipeline: the actual HTTP call.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use super::{ApiRequest, ApiResponse};
use crate::config::HttpTimeouts;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Connect(String),
    #[error("timed out")]
    Timeout,
}

/// Sends one request and reports whatever status came back.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform the HTTP exchange.
    ///
    /// # Errors
    ///
    /// Returns an error only when no HTTP response was received.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend fails to initialize.
    pub fn new(timeouts: HttpTimeouts) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let ApiRequest { id, method, url, headers, body } = request;
        tracing::debug!(request_id = %id, %method, %url, "sending request");

        let mut builder = self.http.request(method, &url).headers(headers);
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;
        let body = decode_body(&text);

        tracing::debug!(request_id = %id, status = status.as_u16(), "received response");
        Ok(ApiResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(err.to_string())
    }
}

/// JSON when it parses, the raw text otherwise, `Null` when empty.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

/// Convenience for transports and tests that synthesize responses.
#[must_use]
pub fn status_response(status: u16, body: Value) -> ApiResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    ApiResponse { status, body }
}
