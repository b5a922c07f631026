//! Signed cookie codec
//!
//! Session and state cookies are both HMAC-signed with a key derived from
//! the provider's `cookie_secret`. The signature covers the cookie name, so a
//! value signed for one cookie never verifies under another.

use std::fmt;

use axum::response::Response;
use cookie::{Cookie, CookieJar, Key, SameSite};
use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use sha2::{Digest, Sha256};

use super::SessionError;
use crate::config::SecuritySettings;

/// Cookie attributes shared by every cookie the proxy writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    /// `Secure` attribute
    pub secure: bool,
    /// `SameSite` attribute
    pub same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

impl From<&SecuritySettings> for CookieSettings {
    fn from(security: &SecuritySettings) -> Self {
        Self {
            secure: security.secure_cookies,
            same_site: security.same_site.into(),
        }
    }
}

/// Signs and verifies cookies with one secret
#[derive(Clone)]
pub struct SignedCookies {
    key: Key,
    settings: CookieSettings,
}

impl fmt::Debug for SignedCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedCookies")
            .field("key", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}

impl SignedCookies {
    /// Derive the signing key from `secret`
    ///
    /// Secrets of any length are accepted; the SHA-256 digest is expanded
    /// into the signing key.
    #[must_use]
    pub fn new(secret: &str, settings: CookieSettings) -> Self {
        let master = Sha256::digest(secret.as_bytes());
        Self {
            key: Key::derive_from(&master),
            settings,
        }
    }

    /// Cookie attributes in use
    #[must_use]
    pub const fn settings(&self) -> CookieSettings {
        self.settings
    }

    /// Build a signed, `HttpOnly` cookie valid for `max_age`
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if the signed cookie cannot be read
    /// back from the jar
    pub fn seal(
        &self,
        name: &str,
        value: String,
        max_age: time::Duration,
    ) -> Result<Cookie<'static>, SessionError> {
        let cookie = self.base(name, value).max_age(max_age).build();

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(cookie);
        jar.get(name)
            .cloned()
            .ok_or_else(|| SessionError::Signing(name.to_string()))
    }

    /// Verified value of cookie `name` from the request headers
    ///
    /// Returns `None` when the cookie is absent or its signature is invalid.
    #[must_use]
    pub fn open(&self, headers: &HeaderMap, name: &str) -> Option<String> {
        let mut jar = CookieJar::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(header).flatten() {
                if cookie.name() == name {
                    jar.add_original(cookie.into_owned());
                }
            }
        }

        jar.signed(&self.key)
            .get(name)
            .map(|cookie| cookie.value().to_string())
    }

    /// Cookie that instructs the browser to delete `name`
    #[must_use]
    pub fn removal(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.base(name, String::new()).build();
        cookie.make_removal();
        cookie
    }

    fn base(&self, name: &str, value: String) -> cookie::CookieBuilder<'static> {
        Cookie::build((name.to_string(), value))
            .path("/")
            .http_only(true)
            .secure(self.settings.secure)
            .same_site(self.settings.same_site)
    }
}

/// Append a `Set-Cookie` header for `cookie`
///
/// # Errors
///
/// Returns [`SessionError::Header`] if the rendered cookie is not a valid
/// header value
pub fn append_set_cookie(response: &mut Response, cookie: &Cookie<'_>) -> Result<(), SessionError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|_| SessionError::Header(cookie.name().to_string()))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}
