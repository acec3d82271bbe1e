//! Route table and the navigator that applies the guard.
//!
//! DESIGN
//! ======
//! The navigator holds the current path in a `watch` channel that the UI
//! renders from. Every navigation resolves the route table, runs the
//! [`guard`](crate::guard) against a sampled auth state, and resets the
//! signal bus so overlays from the previous page do not leak onto the next.

use std::sync::Arc;

use tokio::sync::watch;

use crate::guard::{self, GuardDecision, LOGIN_PATH};
use crate::session::SessionStore;
use crate::signals::SignalBus;

/// Pages behind the authenticated layout.
pub const PROTECTED_ROUTES: [&str; 4] = ["/dashboard", "/users", "/reports", "/settings"];

/// Map a requested path onto the route table.
///
/// The empty path and unknown paths land on the login page.
#[must_use]
pub fn resolve_route(path: &str) -> &str {
    let bare = path.split(['?', '#']).next().unwrap_or_default();
    let bare = if bare.len() > 1 { bare.trim_end_matches('/') } else { bare };
    if guard::is_login_path(bare) || PROTECTED_ROUTES.contains(&bare) {
        return path;
    }
    LOGIN_PATH
}

pub struct Navigator {
    session: Arc<SessionStore>,
    signals: Arc<SignalBus>,
    current: watch::Sender<String>,
}

impl Navigator {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, signals: Arc<SignalBus>) -> Self {
        let (current, _) = watch::channel(LOGIN_PATH.to_owned());
        Self { session, signals, current }
    }

    /// Navigate to `target`, returning the path actually landed on.
    pub fn navigate(&self, target: &str) -> String {
        let route = resolve_route(target);
        let decision = guard::check::<std::convert::Infallible>(route, Ok(self.session.is_authenticated()));
        let landed = decision.destination(route).to_owned();
        if let GuardDecision::Redirect(to) = decision {
            tracing::info!(%target, redirect = to, "navigation redirected");
        } else {
            tracing::debug!(%target, "navigation allowed");
        }
        self.signals.reset();
        self.current.send_replace(landed.clone());
        landed
    }

    /// Re-enter the current page, re-running the guard.
    pub fn reload(&self) -> String {
        let current = self.current();
        self.navigate(&current)
    }

    #[must_use]
    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.current.subscribe()
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
