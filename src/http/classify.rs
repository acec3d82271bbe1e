//! Map failed requests onto user-facing error categories.

use crate::signals::ErrorCode;

/// What went wrong, as far as the user needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Forbidden,
    NotFound,
    Connection,
    ServerError,
    Timeout,
    Unavailable,
    Other(u16),
}

impl FailureKind {
    /// `status` of `0` means no response reached the client.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            0 => Self::Connection,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::ServerError,
            503 => Self::Unavailable,
            504 => Self::Timeout,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn code(self) -> ErrorCode {
        match self {
            Self::Connection => ErrorCode::Label("UNKNOWN_ERROR".to_owned()),
            Self::Forbidden => ErrorCode::Status(403),
            Self::NotFound => ErrorCode::Status(404),
            Self::ServerError => ErrorCode::Status(500),
            Self::Unavailable => ErrorCode::Status(503),
            Self::Timeout => ErrorCode::Status(504),
            Self::Other(status) => ErrorCode::Status(status),
        }
    }

    /// Failures a reload can plausibly fix.
    fn transient(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout | Self::Unavailable | Self::Other(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCategory {
    pub kind: FailureKind,
    pub title: String,
    pub message: String,
    pub code: ErrorCode,
    /// Offer a manual reload.
    pub retryable: bool,
}

/// Classify a failure.
///
/// `server_message` only feeds the catch-all category; the named categories
/// use fixed wording. A reload is offered for transient failures of safe
/// (read-only) requests.
#[must_use]
pub fn classify(kind: FailureKind, idempotent: bool, server_message: Option<String>) -> ErrorCategory {
    let (title, message) = match kind {
        FailureKind::Forbidden => (
            "Access Denied".to_owned(),
            "You do not have permission to access this resource.".to_owned(),
        ),
        FailureKind::NotFound => ("Not Found".to_owned(), "The requested resource was not found.".to_owned()),
        FailureKind::Connection => (
            "Connection Error".to_owned(),
            "Unable to connect to the server. Please check your internet connection and try again.".to_owned(),
        ),
        FailureKind::ServerError => (
            "Server Error".to_owned(),
            "An unexpected server error occurred. Please try again later.".to_owned(),
        ),
        FailureKind::Timeout => (
            "Request Timeout".to_owned(),
            "The server is taking too long to respond. Please try again later.".to_owned(),
        ),
        FailureKind::Unavailable => (
            "Service Unavailable".to_owned(),
            "The service is currently unavailable. Please try again later.".to_owned(),
        ),
        FailureKind::Other(status) => (
            format!("Error {status}"),
            server_message.unwrap_or_else(|| "An unexpected error occurred. Please try again.".to_owned()),
        ),
    };
    ErrorCategory { kind, title, message, code: kind.code(), retryable: idempotent && kind.transient() }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
