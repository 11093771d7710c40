//! Session token cache
//!
//! The session token is not returned in a JSON body: the bootstrap response
//! sets a `_m_h5_tk` cookie whose value looks like `<token>_<expiry>`.

use crate::error::{Result, XiamiError};
use std::sync::Mutex;
use tracing::{debug, info};

/// Name of the cookie carrying the session token
pub const TOKEN_COOKIE: &str = "_m_h5_tk";

/// Action used to bootstrap a session token. Side-effect free.
pub const BOOTSTRAP_ACTION: &str = "mtop.alimusic.music.songservice.getsongdetail";

/// Song id requested by the bootstrap call
pub const BOOTSTRAP_SONG_ID: &str = "1";

/// Extracts the session token from a `_m_h5_tk` cookie value
///
/// ```
/// use pmoxiami::api::token::token_from_cookie;
/// assert_eq!(token_from_cookie("ABC123_XYZ"), "ABC123");
/// ```
pub fn token_from_cookie(value: &str) -> &str {
    value.split('_').next().unwrap_or(value)
}

/// Holds the session token shared by all calls of one client
///
/// `ensure` and `refresh` keep the lock for the whole check-fetch-store
/// sequence, so concurrent callers wait for a single bootstrap instead of
/// starting their own.
#[derive(Debug, Default)]
pub struct TokenManager {
    token: Mutex<Option<String>>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, if any
    pub fn current(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Replaces the cached token
    pub fn set(&self, token: Option<String>) {
        *self.lock() = token;
    }

    /// Returns the cached token, running `bootstrap` only when none is cached
    ///
    /// `bootstrap` receives the token it should sign with (`None` here).
    pub fn ensure<F>(&self, bootstrap: F) -> Result<String>
    where
        F: FnOnce(Option<&str>) -> Result<String>,
    {
        let mut guard = self.lock();
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let token = bootstrap(None)?;
        info!("Acquired Xiami session token");
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Always re-runs `bootstrap` and overwrites the cached token
    ///
    /// `bootstrap` receives the stale token so the bootstrap request is
    /// signed the way the server expects it.
    pub fn refresh<F>(&self, bootstrap: F) -> Result<String>
    where
        F: FnOnce(Option<&str>) -> Result<String>,
    {
        let mut guard = self.lock();
        debug!("Refreshing Xiami session token");

        let token = bootstrap(guard.as_deref())?;
        info!("Refreshed Xiami session token");
        *guard = Some(token.clone());
        Ok(token)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A panic while holding the lock leaves a plain Option behind
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Picks the session token out of the bootstrap response cookies
pub(crate) fn extract_token(cookie: Option<&str>) -> Result<String> {
    let value = cookie.ok_or(XiamiError::MissingTokenCookie)?;
    Ok(token_from_cookie(value).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_token_from_cookie() {
        assert_eq!(token_from_cookie("ABC123_XYZ"), "ABC123");
        assert_eq!(token_from_cookie("TOKEN_REST_MORE"), "TOKEN");
        assert_eq!(token_from_cookie("NOSEPARATOR"), "NOSEPARATOR");
    }

    #[test]
    fn test_extract_token_missing_cookie() {
        assert!(matches!(
            extract_token(None),
            Err(XiamiError::MissingTokenCookie)
        ));
        assert_eq!(extract_token(Some("a_b")).unwrap(), "a");
    }

    #[test]
    fn test_ensure_is_noop_when_cached() {
        let manager = TokenManager::new();
        let calls = Cell::new(0);

        let first = manager
            .ensure(|stale| {
                assert!(stale.is_none());
                calls.set(calls.get() + 1);
                Ok("T1".to_string())
            })
            .unwrap();
        let second = manager
            .ensure(|_| {
                calls.set(calls.get() + 1);
                Ok("T2".to_string())
            })
            .unwrap();

        assert_eq!(first, "T1");
        assert_eq!(second, "T1");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_refresh_always_overwrites() {
        let manager = TokenManager::new();
        manager.set(Some("OLD".to_string()));

        let token = manager
            .refresh(|stale| {
                assert_eq!(stale, Some("OLD"));
                Ok("NEW".to_string())
            })
            .unwrap();

        assert_eq!(token, "NEW");
        assert_eq!(manager.current().as_deref(), Some("NEW"));
    }

    #[test]
    fn test_failed_bootstrap_keeps_previous_token() {
        let manager = TokenManager::new();
        manager.set(Some("OLD".to_string()));

        let result = manager.refresh(|_| Err(XiamiError::MissingTokenCookie));

        assert!(result.is_err());
        assert_eq!(manager.current().as_deref(), Some("OLD"));
    }
}
