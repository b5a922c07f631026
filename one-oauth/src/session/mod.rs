//! Session cookies
//!
//! After a successful login the proxy issues a signed session cookie holding
//! the provider user ID under the configured `cookie_user_key`. There is no
//! server-side session table: the cookie is the session, and it is valid
//! until its embedded expiry passes.
//!
//! Flow code depends on the [`SessionStore`] trait; [`CookieSessionStore`] is
//! the production implementation.

pub mod cookies;
pub mod store;

pub use cookies::{append_set_cookie, CookieSettings, SignedCookies};
pub use store::{CookieSessionStore, MAX_COOKIE_BYTES};

use cookie::Cookie;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::oauth2::types::OAuthError;

/// Session cookie errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Rendered cookie exceeds what browsers store
    #[error("session cookie is {0} bytes, over the 4096 byte limit")]
    TooLarge(usize),

    /// Payload could not be serialized
    #[error("failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),

    /// Cookie could not be signed
    #[error("failed to sign cookie `{0}`")]
    Signing(String),

    /// Cookie is not a valid header value
    #[error("cookie `{0}` is not a valid header value")]
    Header(String),
}

impl From<SessionError> for OAuthError {
    fn from(error: SessionError) -> Self {
        Self::SessionWriteFailed(error.to_string())
    }
}

/// Payload of a session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Configured key the user ID is stored under, e.g. `googleID`
    #[serde(rename = "k")]
    pub user_key: String,

    /// Provider user ID
    #[serde(rename = "v")]
    pub user_id: String,

    /// Expiry as a Unix timestamp
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SessionRecord {
    /// Record expiring `ttl_secs` from now
    #[must_use]
    pub fn new(user_key: &str, user_id: &str, ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Self {
            user_key: user_key.to_string(),
            user_id: user_id.to_string(),
            expires_at: OffsetDateTime::now_utc().unix_timestamp().saturating_add(ttl),
        }
    }

    /// Whether the record has expired at `now`
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Issues and reads session cookies for one provider
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Session cookie name
    fn cookie_name(&self) -> &str;

    /// Session cookie for a freshly authenticated user
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the cookie cannot be encoded, signed or
    /// fits no browser cookie jar
    fn issue(&self, user_id: &str) -> Result<Cookie<'static>, SessionError>;

    /// Valid session carried by the request, if any
    ///
    /// Absent, tampered, expired and foreign cookies all read as `None`.
    fn load(&self, headers: &HeaderMap) -> Option<SessionRecord>;

    /// Cookie that removes the session from the browser
    fn destroy(&self) -> Cookie<'static>;
}
