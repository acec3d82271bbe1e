//! Navigation tree for the authenticated layout.
//!
//! The tree is fetched once per session and served from memory afterwards.
//! Failures degrade to an empty menu; the request pipeline has already put
//! the error on the signal bus.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, Endpoint};
use crate::http::ApiClient;
use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavbarItem {
    pub id: String,
    #[serde(rename = "menuName")]
    pub label: String,
    #[serde(rename = "menuLink", default)]
    pub link: Option<String>,
    #[serde(rename = "svgFileDataLink", default)]
    pub icon: Option<String>,
    #[serde(rename = "listOfSubMenu", default)]
    pub children: Vec<NavbarItem>,
    #[serde(rename = "doHaveRedirectionLink", default)]
    pub has_redirect: bool,
}

impl NavbarItem {
    /// Items with children render as a dropdown instead of a link.
    #[must_use]
    pub fn is_expandable(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct NavbarResponse {
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Vec<NavbarItem>>,
}

pub struct NavbarService {
    client: ApiClient,
    url: String,
    session: Arc<SessionStore>,
    cache: Mutex<Option<Vec<NavbarItem>>>,
}

impl NavbarService {
    #[must_use]
    pub fn new(client: ApiClient, config: &AppConfig, session: Arc<SessionStore>) -> Self {
        Self {
            client,
            url: config.endpoint_url(Endpoint::NavbarList),
            session,
            cache: Mutex::new(None),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<Vec<NavbarItem>>> {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Menu for the current session; empty when signed out or on failure.
    pub async fn items(&self) -> Vec<NavbarItem> {
        if !self.session.is_authenticated() {
            self.clear_cache();
            return Vec::new();
        }
        if let Some(items) = self.cache().clone() {
            return items;
        }

        match self.client.get_json::<NavbarResponse>(&self.url).await {
            Ok(NavbarResponse { status: true, data: Some(items), .. }) => {
                tracing::debug!(count = items.len(), "navbar loaded");
                *self.cache() = Some(items.clone());
                items
            }
            Ok(response) => {
                tracing::warn!(message = %response.message, "navbar response without data");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "navbar fetch failed");
                Vec::new()
            }
        }
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache().is_some()
    }

    pub fn clear_cache(&self) {
        *self.cache() = None;
    }
}

#[cfg(test)]
#[path = "navbar_test.rs"]
mod tests;
