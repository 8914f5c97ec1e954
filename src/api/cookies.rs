//! Credential cookie jar
//!
//! The blog API authenticates with a short-lived session cookie plus a
//! refresh cookie. [`CredentialJar`] is the reqwest cookie provider of the
//! transport and can be snapshotted to JSON, so the credential outlives the
//! process alongside the persisted session.

use anyhow::{anyhow, Result};
use cookie_store::CookieStore as Store;
use reqwest::header::HeaderValue;
use reqwest::Url;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cookie store shared between the HTTP client and the session store
#[derive(Debug, Default)]
pub struct CredentialJar {
    store: RwLock<Store>,
}

impl CredentialJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize every cookie, session cookies included
    pub fn to_json(&self) -> Result<String> {
        let mut buffer = Vec::new();
        cookie_store::serde::json::save_incl_expired_and_nonpersistent(&self.read(), &mut buffer)
            .map_err(|e| anyhow!("Failed to serialize cookies: {}", e))?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Replace the jar contents with a snapshot from [`to_json`](Self::to_json)
    ///
    /// Cookies that have expired since the snapshot are dropped.
    pub fn load_json(&self, json: &str) -> Result<()> {
        let store = cookie_store::serde::json::load(json.as_bytes())
            .map_err(|e| anyhow!("Failed to load cookies: {}", e))?;
        *self.write() = store;
        Ok(())
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of live cookies
    pub fn len(&self) -> usize {
        self.read().iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl reqwest::cookie::CookieStore for CredentialJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut store = self.write();
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            if let Err(e) = store.parse(raw, url) {
                tracing::debug!("Ignoring cookie from {}: {}", url, e);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .read()
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}
