//! Signed-cookie session store

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cookie::Cookie;
use http::HeaderMap;
use time::OffsetDateTime;

use super::{CookieSettings, SessionError, SessionRecord, SessionStore, SignedCookies};
use crate::oauth2::types::ProviderConfig;

/// Largest `Set-Cookie` value browsers are required to store
pub const MAX_COOKIE_BYTES: usize = 4096;

/// Session store backed entirely by a signed cookie
///
/// The payload is base64url-encoded JSON, signed with the provider's
/// `cookie_secret`.
#[derive(Debug, Clone)]
pub struct CookieSessionStore {
    name: String,
    user_key: String,
    max_age_secs: u64,
    cookies: SignedCookies,
}

impl CookieSessionStore {
    /// Store for one provider
    #[must_use]
    pub fn new(config: &ProviderConfig, settings: CookieSettings, max_age_secs: u64) -> Self {
        Self {
            name: config.cookie_name.clone(),
            user_key: config.cookie_user_key.clone(),
            max_age_secs,
            cookies: SignedCookies::new(&config.cookie_secret, settings),
        }
    }

    fn encode(record: &SessionRecord) -> Result<String, SessionError> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(record)?))
    }

    fn decode(value: &str) -> Option<SessionRecord> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl SessionStore for CookieSessionStore {
    fn cookie_name(&self) -> &str {
        &self.name
    }

    fn issue(&self, user_id: &str) -> Result<Cookie<'static>, SessionError> {
        let record = SessionRecord::new(&self.user_key, user_id, self.max_age_secs);
        let max_age = time::Duration::seconds(i64::try_from(self.max_age_secs).unwrap_or(i64::MAX));

        let cookie = self
            .cookies
            .seal(&self.name, Self::encode(&record)?, max_age)?;

        let size = cookie.to_string().len();
        if size > MAX_COOKIE_BYTES {
            return Err(SessionError::TooLarge(size));
        }

        tracing::debug!(cookie = %self.name, "session cookie issued");
        Ok(cookie)
    }

    fn load(&self, headers: &HeaderMap) -> Option<SessionRecord> {
        let value = self.cookies.open(headers, &self.name)?;
        let record = Self::decode(&value)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();

        (record.user_key == self.user_key
            && !record.user_id.is_empty()
            && !record.is_expired_at(now))
        .then_some(record)
    }

    fn destroy(&self) -> Cookie<'static> {
        self.cookies.removal(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, COOKIE};

    fn config() -> ProviderConfig {
        ProviderConfig {
            cookie_name: "example-google-app".to_string(),
            cookie_secret: "example cookie signing secret".to_string(),
            cookie_user_key: "googleID".to_string(),
            ..ProviderConfig::default()
        }
    }

    fn store() -> CookieSessionStore {
        CookieSessionStore::new(&config(), CookieSettings::default(), 3600)
    }

    fn headers(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{name}={value}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_issue_then_load() {
        let store = store();
        let cookie = store.issue("1098").unwrap();

        assert_eq!(cookie.name(), "example-google-app");
        assert!(!cookie.value().contains("1098"));

        let record = store.load(&headers(cookie.name(), cookie.value())).unwrap();
        assert_eq!(record.user_key, "googleID");
        assert_eq!(record.user_id, "1098");
    }

    #[test]
    fn test_load_without_cookie() {
        assert!(store().load(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_load_rejects_other_provider_secret() {
        let mut other = config();
        other.cookie_secret = "a different secret".to_string();
        let foreign = CookieSessionStore::new(&other, CookieSettings::default(), 3600)
            .issue("1098")
            .unwrap();

        assert!(store().load(&headers(foreign.name(), foreign.value())).is_none());
    }

    #[test]
    fn test_load_rejects_other_user_key() {
        let mut other = config();
        other.cookie_user_key = "githubID".to_string();
        let cookie = CookieSessionStore::new(&other, CookieSettings::default(), 3600)
            .issue("1098")
            .unwrap();

        assert!(store().load(&headers(cookie.name(), cookie.value())).is_none());
    }

    #[test]
    fn test_expired_session_reads_as_absent() {
        let store = CookieSessionStore::new(&config(), CookieSettings::default(), 0);
        let cookie = store.issue("1098").unwrap();

        assert!(store.load(&headers(cookie.name(), cookie.value())).is_none());
    }

    #[test]
    fn test_oversized_session_rejected() {
        let err = store().issue(&"9".repeat(MAX_COOKIE_BYTES)).unwrap_err();
        assert!(matches!(err, SessionError::TooLarge(_)));
    }

    #[test]
    fn test_destroy_clears_cookie() {
        let removal = store().destroy();
        assert_eq!(removal.name(), "example-google-app");
        assert_eq!(removal.max_age(), Some(time::Duration::ZERO));
    }
}
