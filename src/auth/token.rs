//! Bearer token cache with proactive refresh

use std::fmt;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Tokens are replaced this long before they expire
pub const REFRESH_MARGIN: Duration = Duration::from_secs(3 * 60);

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// A bearer token and its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CachedToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Usable while `now` is earlier than expiry minus the refresh margin
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - margin()
    }
}

fn margin() -> chrono::Duration {
    chrono::Duration::seconds(REFRESH_MARGIN.as_secs() as i64)
}

/// Single-entry token cache shared by the requests of one client
#[derive(Debug, Default)]
pub struct TokenCache {
    entry: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry, usable or not
    pub fn cached(&self) -> Option<CachedToken> {
        self.entry
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn invalidate(&self) {
        *self.entry.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Return a usable token, calling `refresh` only when the cache is stale.
    ///
    /// The write path re-checks the entry so concurrent callers that all saw
    /// a stale cache trigger a single refresh. A failed refresh keeps the
    /// previous entry.
    pub fn get_or_refresh<E, F>(&self, now: DateTime<Utc>, refresh: F) -> Result<CachedToken, E>
    where
        F: FnOnce() -> Result<CachedToken, E>,
    {
        {
            let guard = self.entry.read().unwrap_or_else(|p| p.into_inner());
            if let Some(entry) = guard.as_ref() {
                if entry.is_usable(now) {
                    return Ok(entry.clone());
                }
            }
        }

        let mut guard = self.entry.write().unwrap_or_else(|p| p.into_inner());
        if let Some(entry) = guard.as_ref() {
            if entry.is_usable(now) {
                return Ok(entry.clone());
            }
        }

        let fresh = refresh()?;
        tracing::debug!(expires_at = %fresh.expires_at, "cached new bearer token");
        *guard = Some(fresh.clone());
        Ok(fresh)
    }
}
