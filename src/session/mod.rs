//! Session store: the current credentials and the authenticated signal.
//!
//! DESIGN
//! ======
//! Credentials live behind a short-held mutex and are written through to a
//! [`SessionStorage`] backend. The authenticated boolean is a `watch`
//! channel, so new subscribers see the latest value immediately.
//!
//! Every mutation republishes `authenticated`, derived from the token
//! rather than tracked separately, so the two can never disagree.
//!
//! Storage failures are logged and swallowed: losing persistence degrades to
//! an in-memory session, it never blocks sign-in.

pub mod storage;

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

pub use storage::{FileStorage, MemoryStorage, PersistedSession, SessionStorage, StorageError};

#[derive(Debug, Default)]
struct Credentials {
    access_token: Option<String>,
    refresh_token: Option<String>,
    role: Option<String>,
    /// Set once storage has been read successfully, or after the one lazy retry.
    hydrated: bool,
}

impl Credentials {
    fn absorb(&mut self, persisted: PersistedSession) {
        self.access_token = persisted.jwt.filter(|t| !t.is_empty());
        self.refresh_token = persisted.refresh_token.filter(|t| !t.is_empty());
        self.role = persisted.role;
    }

    fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            jwt: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            role: self.role.clone(),
        }
    }
}

pub struct SessionStore {
    credentials: Mutex<Credentials>,
    storage: Arc<dyn SessionStorage>,
    authenticated: watch::Sender<bool>,
}

impl SessionStore {
    /// Create a store and hydrate it from `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let mut credentials = Credentials::default();
        match storage.load() {
            Ok(persisted) => {
                credentials.absorb(persisted);
                credentials.hydrated = true;
            }
            Err(e) => tracing::warn!(error = %e, "session storage unreadable at startup"),
        }
        let (authenticated, _) = watch::channel(credentials.access_token.is_some());
        tracing::debug!(authenticated = *authenticated.borrow(), "session store hydrated");
        Self { credentials: Mutex::new(credentials), storage, authenticated }
    }

    /// Create an empty store backed by process memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Credentials> {
        self.credentials
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current bearer token.
    ///
    /// Falls back to one lazy storage read if startup hydration failed.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        let mut creds = self.lock();
        if creds.access_token.is_none() && !creds.hydrated {
            creds.hydrated = true;
            match self.storage.load() {
                Ok(persisted) => {
                    creds.absorb(persisted);
                    self.publish(&creds);
                }
                Err(e) => tracing::warn!(error = %e, "session storage still unreadable"),
            }
        }
        creds.access_token.clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.lock().refresh_token.clone()
    }

    #[must_use]
    pub fn role(&self) -> Option<String> {
        self.lock().role.clone()
    }

    /// Sampled authenticated state.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    /// Replay-latest stream of the authenticated state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    /// Store freshly issued credentials and mark the session authenticated.
    pub fn set_auth(&self, token: impl Into<String>, refresh_token: Option<String>, role: Option<String>) {
        let mut creds = self.lock();
        creds.access_token = Some(token.into());
        creds.refresh_token = refresh_token;
        creds.role = role;
        creds.hydrated = true;
        self.persist(&creds);
        self.publish(&creds);
        tracing::info!(role = creds.role.as_deref().unwrap_or("-"), "session authenticated");
    }

    /// Swap in a refreshed token pair, keeping the role.
    ///
    /// Only applies while the stored refresh token is still `expected`, so a
    /// session cleared or replaced during the refresh stays that way. A `None`
    /// refresh token keeps the current one. Returns whether the swap happened.
    pub fn replace_tokens(&self, expected: &str, token: impl Into<String>, refresh_token: Option<String>) -> bool {
        let mut creds = self.lock();
        if creds.refresh_token.as_deref() != Some(expected) {
            tracing::info!("session changed during refresh; discarding rotated tokens");
            return false;
        }
        creds.access_token = Some(token.into());
        if refresh_token.is_some() {
            creds.refresh_token = refresh_token;
        }
        self.persist(&creds);
        self.publish(&creds);
        tracing::debug!("session tokens rotated");
        true
    }

    /// Forget all credentials, in memory and in storage.
    pub fn clear(&self) {
        let mut creds = self.lock();
        creds.access_token = None;
        creds.refresh_token = None;
        creds.role = None;
        creds.hydrated = true;
        if let Err(e) = self.storage.erase() {
            tracing::warn!(error = %e, "failed to erase persisted session");
        }
        self.publish(&creds);
        tracing::info!("session cleared");
    }

    fn persist(&self, creds: &Credentials) {
        if let Err(e) = self.storage.save(&creds.to_persisted()) {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    fn publish(&self, creds: &Credentials) {
        self.authenticated.send_replace(creds.access_token.is_some());
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let creds = self.lock();
        f.debug_struct("SessionStore")
            .field("authenticated", &creds.access_token.is_some())
            .field("role", &creds.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
