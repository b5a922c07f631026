//! Login state tokens
//!
//! The login handler mints a random state token, sends it to the provider in
//! the authorization URL and binds it to the browser with a short-lived
//! signed cookie. The callback is accepted only when the `state` query
//! parameter matches the cookie.

use cookie::Cookie;
use http::HeaderMap;
use rand::Rng;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use crate::config::STATE_COOKIE_SUFFIX;
use crate::oauth2::types::OAuthError;
use crate::session::{CookieSettings, SessionError, SignedCookies};

/// Random bytes in a state token
pub const STATE_TOKEN_BYTES: usize = 32;

/// Unguessable per-login token, hex encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken(String);

impl StateToken {
    /// Fresh token from the thread-local CSPRNG
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; STATE_TOKEN_BYTES] = rand::rng().random();
        Self(hex::encode(bytes))
    }

    /// Token text as sent in the `state` parameter
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signed cookie binding a state token to the browser
#[derive(Debug, Clone)]
pub struct StateCookie {
    name: String,
    max_age_secs: u64,
    cookies: SignedCookies,
}

impl StateCookie {
    /// State cookie for the provider whose session cookie is `session_cookie`
    #[must_use]
    pub fn new(
        session_cookie: &str,
        secret: &str,
        settings: CookieSettings,
        max_age_secs: u64,
    ) -> Self {
        Self {
            name: format!("{session_cookie}{STATE_COOKIE_SUFFIX}"),
            max_age_secs,
            cookies: SignedCookies::new(secret, settings),
        }
    }

    /// Cookie name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mint a token and the cookie that carries it
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if the cookie cannot be signed
    pub fn issue(&self) -> Result<(StateToken, Cookie<'static>), SessionError> {
        let token = StateToken::generate();
        let ttl = i64::try_from(self.max_age_secs).unwrap_or(i64::MAX);
        let expires_at = OffsetDateTime::now_utc().unix_timestamp().saturating_add(ttl);

        let cookie = self.cookies.seal(
            &self.name,
            format!("{}.{expires_at}", token.as_str()),
            time::Duration::seconds(ttl),
        )?;
        Ok((token, cookie))
    }

    /// Check the presented `state` against the cookie
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::StateMismatch`] if the parameter or cookie is
    /// missing, the cookie is tampered or expired, or the tokens differ
    pub fn verify(&self, headers: &HeaderMap, presented: Option<&str>) -> Result<StateToken, OAuthError> {
        let presented = presented
            .filter(|state| !state.is_empty())
            .ok_or(OAuthError::StateMismatch)?;

        let value = self
            .cookies
            .open(headers, &self.name)
            .ok_or(OAuthError::StateMismatch)?;
        let (token, expires_at) = value.split_once('.').ok_or(OAuthError::StateMismatch)?;
        let expires_at: i64 = expires_at.parse().map_err(|_| OAuthError::StateMismatch)?;

        if OffsetDateTime::now_utc().unix_timestamp() >= expires_at {
            return Err(OAuthError::StateMismatch);
        }

        if bool::from(token.as_bytes().ct_eq(presented.as_bytes())) {
            Ok(StateToken(token.to_string()))
        } else {
            Err(OAuthError::StateMismatch)
        }
    }

    /// Cookie that removes the state from the browser
    #[must_use]
    pub fn clear(&self) -> Cookie<'static> {
        self.cookies.removal(&self.name)
    }
}
