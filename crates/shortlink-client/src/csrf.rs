//! CSRF token cache
//!
//! A single process-wide slot holding the last known anti-forgery token and the
//! moment it was obtained. The slot is filled lazily, trusted for a fixed TTL
//! and cleared whenever the session changes.

use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Name of the cookie the server sets alongside the token.
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// Header attached to state-changing requests.
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";

#[derive(Clone, Debug)]
struct CachedToken {
    value: String,
    fetched_at: Instant,
}

/// Single-slot, last-writer-wins token cache
#[derive(Debug)]
pub struct CsrfTokenCache {
    ttl: Duration,
    slot: RwLock<Option<CachedToken>>,
}

impl CsrfTokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Cached token, if present and younger than the TTL.
    pub fn get_fresh(&self) -> Option<String> {
        let guard = self.slot.read();
        guard
            .as_ref()
            .filter(|t| t.fetched_at.elapsed() < self.ttl)
            .map(|t| t.value.clone())
    }

    /// Store a token and restart its TTL.
    pub fn store(&self, value: String) {
        *self.slot.write() = Some(CachedToken {
            value,
            fetched_at: Instant::now(),
        });
    }

    pub fn clear(&self) {
        if self.slot.write().take().is_some() {
            debug!("CSRF token cache cleared");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().is_none()
    }
}

/// Extract a cookie value from a `Cookie` header (`a=1; csrftoken=xyz`).
pub fn parse_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
