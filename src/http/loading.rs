//! Loading-signal stage: one counter increment per dispatched request.

use std::sync::Arc;

use super::{ApiError, ApiRequest, ApiResponse, Middleware, Next, SKIP_LOADING_HEADER};
use crate::signals::SignalBus;

pub struct LoadingSignal {
    signals: Arc<SignalBus>,
}

impl LoadingSignal {
    #[must_use]
    pub fn new(signals: Arc<SignalBus>) -> Self {
        Self { signals }
    }
}

#[async_trait::async_trait]
impl Middleware for LoadingSignal {
    async fn handle(&self, mut request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, ApiError> {
        if request.take_header(SKIP_LOADING_HEADER) {
            return next.run(request).await;
        }
        // The guard decrements on every exit path, including cancellation.
        let _loading = self.signals.track();
        next.run(request).await
    }
}

#[cfg(test)]
#[path = "loading_test.rs"]
mod tests;
