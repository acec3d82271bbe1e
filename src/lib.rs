//! # admin-console
//!
//! Session and request guard for the admin console front-end.
//!
//! The crate owns everything between a UI action and the HTTP transport:
//! email + OTP sign-in, the persisted session, route protection, bearer
//! stamping with single-flight token refresh, and the global loading/error
//! signals the UI renders as overlays and toasts.
//!
//! DESIGN
//! ======
//! No ambient singletons. [`context::AppContext`] wires one instance of each
//! service and hands out `Arc`s; UI layers (the `admin-cli` binary, or a
//! browser shell) subscribe to the `watch` channels those services expose.

pub mod config;
pub mod context;
pub mod guard;
pub mod http;
pub mod login;
pub mod messages;
pub mod navbar;
pub mod router;
pub mod session;
pub mod signals;

#[cfg(test)]
pub(crate) mod test_helpers;
