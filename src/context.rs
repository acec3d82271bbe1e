//! Application context: one instance of every session-layer service.
//!
//! DESIGN
//! ======
//! `AppContext` is built once at startup and cloned into whatever drives the
//! UI. All fields are `Arc`-wrapped or cheap to clone, so clones share the
//! same session, signals and caches.
//!
//! The request pipeline is assembled here, outermost first:
//! failure handler, stamper, loading signal. Token refresh bypasses the
//! pipeline and talks to the transport directly.

use std::sync::Arc;

use crate::config::{AppConfig, Endpoint};
use crate::guard::LOGIN_PATH;
use crate::http::auth::{AuthFailureHandler, AuthStamper, HttpTokenRefresher, PublicEndpoints, TokenRefresher};
use crate::http::loading::LoadingSignal;
use crate::http::{ApiClient, Middleware, Pipeline, ReqwestTransport, Transport};
use crate::login::LoginFlow;
use crate::messages::MessageChannel;
use crate::navbar::NavbarService;
use crate::router::Navigator;
use crate::session::{SessionStorage, SessionStore};
use crate::signals::SignalBus;

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub session: Arc<SessionStore>,
    pub signals: Arc<SignalBus>,
    pub messages: Arc<MessageChannel>,
    pub navigator: Arc<Navigator>,
    pub client: ApiClient,
    pub navbar: Arc<NavbarService>,
}

impl AppContext {
    /// Wire the services over `transport`, refreshing tokens against the
    /// configured auth service.
    #[must_use]
    pub fn new(config: AppConfig, storage: Arc<dyn SessionStorage>, transport: Arc<dyn Transport>) -> Self {
        let refresher = Arc::new(HttpTokenRefresher::new(
            Arc::clone(&transport),
            config.endpoint_url(Endpoint::RefreshToken),
        ));
        Self::with_refresher(config, storage, transport, refresher)
    }

    /// Build over a real HTTP transport with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn connect(config: AppConfig, storage: Arc<dyn SessionStorage>) -> Result<Self, reqwest::Error> {
        let transport = Arc::new(ReqwestTransport::new(config.timeouts)?);
        Ok(Self::new(config, storage, transport))
    }

    #[must_use]
    pub fn with_refresher(
        config: AppConfig,
        storage: Arc<dyn SessionStorage>,
        transport: Arc<dyn Transport>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let session = Arc::new(SessionStore::new(storage));
        let signals = Arc::new(SignalBus::new());
        let messages = Arc::new(MessageChannel::new());
        let navigator = Arc::new(Navigator::new(Arc::clone(&session), Arc::clone(&signals)));

        let public = PublicEndpoints::default();
        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(AuthFailureHandler::new(
                Arc::clone(&session),
                Arc::clone(&signals),
                Arc::clone(&navigator),
                refresher,
                public.clone(),
            )),
            Arc::new(AuthStamper::new(Arc::clone(&session), public)),
            Arc::new(LoadingSignal::new(Arc::clone(&signals))),
        ];
        let client = ApiClient::new(Arc::new(Pipeline::new(stages, transport)));
        let navbar = Arc::new(NavbarService::new(client.clone(), &config, Arc::clone(&session)));

        tracing::debug!(authenticated = session.is_authenticated(), "app context ready");
        Self { config, session, signals, messages, navigator, client, navbar }
    }

    /// Land on the first page: the dashboard when signed in, login otherwise.
    pub fn start(&self) -> String {
        self.navigator.navigate("")
    }

    /// A sign-in flow bound to this context.
    #[must_use]
    pub fn login_flow(&self) -> LoginFlow {
        LoginFlow::new(
            self.client.clone(),
            &self.config,
            Arc::clone(&self.session),
            Arc::clone(&self.messages),
            Arc::clone(&self.navigator),
        )
    }

    /// Drop the session and every cache derived from it.
    pub fn logout(&self) {
        self.session.clear();
        self.navbar.clear_cache();
        self.messages.clear();
        self.navigator.navigate(LOGIN_PATH);
    }

    /// Release UI-facing state before the context goes away.
    pub fn teardown(&self) {
        self.signals.reset();
        self.messages.clear();
        tracing::debug!("app context torn down");
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
