//! Route guard evaluated once per navigation attempt.
//!
//! The authenticated state is sampled by the caller, never subscribed to,
//! so one navigation sees one consistent answer.

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

impl GuardDecision {
    /// Path the router should land on for `target`.
    #[must_use]
    pub fn destination<'a>(&self, target: &'a str) -> &'a str {
        match *self {
            Self::Allow => target,
            Self::Redirect(path) => path,
        }
    }
}

/// Whether `path` addresses the login page (query string and sub-paths included).
#[must_use]
pub fn is_login_path(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path == LOGIN_PATH || path.starts_with("/login/")
}

/// Decide whether navigation to `target` may proceed.
///
/// Any failure to read the authenticated state redirects to the login page.
pub fn check<E>(target: &str, authenticated: Result<bool, E>) -> GuardDecision
where
    E: std::fmt::Display,
{
    let authenticated = match authenticated {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, %target, "auth state unreadable; redirecting to login");
            return GuardDecision::Redirect(LOGIN_PATH);
        }
    };
    let login_page = is_login_path(target);

    if authenticated && login_page {
        return GuardDecision::Redirect(DASHBOARD_PATH);
    }
    if !authenticated && !login_page {
        return GuardDecision::Redirect(LOGIN_PATH);
    }
    GuardDecision::Allow
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
