//! Global loading and error signals rendered by the UI overlay.
//!
//! DESIGN
//! ======
//! Loading is a reference count, not a flag: every in-flight request holds
//! one increment. Observers only see `true` on the 0→1 edge and `false` on
//! the 1→0 edge.
//!
//! At most one error is visible. Showing an error ends the perceived loading
//! state, so the counter is zeroed; decrements from requests that were still
//! in flight then fall through as no-ops.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred. Please try again later.";
pub const UNHANDLED_ERROR_MESSAGE: &str = "Server Is Down!";

/// User-triggered follow-up attached to an error (e.g. reload the page).
pub type RetryAction = Arc<dyn Fn() + Send + Sync>;

/// Re-runnable operation wrapped by [`SignalBus::with_loading`].
type Operation<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Failures that can be shown on the error overlay.
pub trait CodedError: fmt::Display {
    /// Code displayed next to the message.
    fn error_code(&self) -> Option<ErrorCode> {
        None
    }

    fn error_message(&self) -> String {
        self.to_string()
    }
}

impl CodedError for String {}

/// Error code shown next to a message: an HTTP status or a symbolic label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Status(u16),
    Label(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{code}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(code: u16) -> Self {
        Self::Status(code)
    }
}

impl From<&str> for ErrorCode {
    fn from(label: &str) -> Self {
        Self::Label(label.to_owned())
    }
}

#[derive(Clone, Default)]
pub struct ErrorState {
    pub visible: bool,
    pub title: Option<String>,
    pub message: String,
    pub code: Option<ErrorCode>,
    pub retry: Option<RetryAction>,
}

impl ErrorState {
    #[must_use]
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Observers only care about what is displayed; the retry closure is ignored.
    fn same_display(&self, other: &Self) -> bool {
        self.visible == other.visible
            && self.title == other.title
            && self.message == other.message
            && self.code == other.code
    }
}

impl fmt::Debug for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorState")
            .field("visible", &self.visible)
            .field("title", &self.title)
            .field("message", &self.message)
            .field("code", &self.code)
            .field("retry", &self.retry.is_some())
            .finish()
    }
}

// =============================================================================
// SIGNAL BUS
// =============================================================================

pub struct SignalBus {
    count: Mutex<usize>,
    loading: watch::Sender<bool>,
    error: watch::Sender<ErrorState>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    #[must_use]
    pub fn new() -> Self {
        let (loading, _) = watch::channel(false);
        let (error, _) = watch::channel(ErrorState::hidden());
        Self { count: Mutex::new(0), loading, error }
    }

    fn count(&self) -> std::sync::MutexGuard<'_, usize> {
        self.count
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_loading(&self, value: bool) {
        self.loading.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Register one more in-flight operation. Clears any visible error.
    pub fn show_loading(&self) {
        {
            let mut count = self.count();
            if *count == 0 {
                self.set_loading(true);
            }
            *count += 1;
        }
        self.clear_error();
    }

    /// Show loading until the returned guard is dropped.
    #[must_use = "loading ends when the guard is dropped"]
    pub fn track(&self) -> LoadingGuard<'_> {
        self.show_loading();
        LoadingGuard { bus: self }
    }

    /// Release one in-flight operation. Extra calls are ignored.
    pub fn hide_loading(&self) {
        let mut count = self.count();
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.set_loading(false);
            }
        }
    }

    /// Replace the visible error and end the loading state.
    pub fn show_error(&self, message: impl Into<String>, code: Option<ErrorCode>, retry: Option<RetryAction>) {
        self.show_error_with_title(None, message, code, retry);
    }

    pub fn show_error_with_title(
        &self,
        title: Option<String>,
        message: impl Into<String>,
        code: Option<ErrorCode>,
        retry: Option<RetryAction>,
    ) {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = DEFAULT_ERROR_MESSAGE.to_owned();
        }
        {
            let mut count = self.count();
            *count = 0;
            self.set_loading(false);
        }
        let next = ErrorState { visible: true, title, message, code, retry };
        tracing::debug!(error = ?next, "showing error");
        self.error.send_if_modified(|current| {
            let changed = !current.same_display(&next);
            *current = next;
            changed
        });
    }

    /// Surface an error that escaped every HTTP-level handler. No retry is offered.
    pub fn report_unhandled(&self, error: &dyn std::error::Error) {
        tracing::error!(%error, "unhandled application error");
        let message = error.to_string();
        let message = if message.trim().is_empty() { UNHANDLED_ERROR_MESSAGE.to_owned() } else { message };
        self.show_error(message, None, None);
    }

    /// Hide the current error without touching the loading counter.
    pub fn clear_error(&self) {
        self.error.send_if_modified(|current| {
            if !current.visible {
                return false;
            }
            *current = ErrorState::hidden();
            true
        });
    }

    /// Run the visible error's retry action, if any, after hiding it.
    ///
    /// Returns whether an action ran.
    pub fn retry(&self) -> bool {
        let action = self.error.borrow().retry.clone();
        self.clear_error();
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Drop all loading and error state, e.g. on a navigation boundary.
    pub fn reset(&self) {
        {
            let mut count = self.count();
            *count = 0;
            self.set_loading(false);
        }
        self.clear_error();
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    #[must_use]
    pub fn loading_count(&self) -> usize {
        *self.count()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.borrow().visible
    }

    #[must_use]
    pub fn error(&self) -> ErrorState {
        self.error.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    #[must_use]
    pub fn subscribe_error(&self) -> watch::Receiver<ErrorState> {
        self.error.subscribe()
    }

    /// Run `operation` with loading shown; a failure is published as the error.
    ///
    /// The published error carries the failure's code and a retry action that
    /// runs the operation again on a spawned task, under the same loading and
    /// error handling. `error_message` overrides the failure's own text.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error after publishing it.
    pub async fn with_loading<T, E, F, Fut>(self: &Arc<Self>, operation: F, error_message: Option<&str>) -> Result<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: CodedError + Send + 'static,
    {
        let operation: Operation<T, E> = Arc::new(move || operation().boxed());
        Self::run_tracked(Arc::clone(self), operation, error_message.map(str::to_owned)).await
    }

    fn run_tracked<T, E>(
        bus: Arc<Self>,
        operation: Operation<T, E>,
        error_message: Option<String>,
    ) -> BoxFuture<'static, Result<T, E>>
    where
        T: Send + 'static,
        E: CodedError + Send + 'static,
    {
        async move {
            let result = {
                let _guard = bus.track();
                operation().await
            };
            if let Err(e) = &result {
                let message = error_message.clone().unwrap_or_else(|| e.error_message());
                let retry = Self::rerun_action(&bus, operation, error_message);
                bus.show_error(message, e.error_code(), Some(retry));
            }
            result
        }
        .boxed()
    }

    fn rerun_action<T, E>(bus: &Arc<Self>, operation: Operation<T, E>, error_message: Option<String>) -> RetryAction
    where
        T: Send + 'static,
        E: CodedError + Send + 'static,
    {
        let bus = Arc::downgrade(bus);
        Arc::new(move || {
            let Some(bus) = bus.upgrade() else {
                return;
            };
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                tracing::warn!("retry requested outside the async runtime; ignoring");
                return;
            };
            runtime.spawn(Self::run_tracked(bus, Arc::clone(&operation), error_message.clone()));
        })
    }
}

/// One loading increment; released exactly once on drop, including when the
/// owning future is cancelled.
pub struct LoadingGuard<'a> {
    bus: &'a SignalBus,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.bus.hide_loading();
    }
}

#[cfg(test)]
#[path = "signals_test.rs"]
mod tests;
