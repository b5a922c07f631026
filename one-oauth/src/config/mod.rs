//! Configuration management for one-oauth
//!
//! Configuration is layered with `figment`, highest priority last:
//!
//! 1. Hardcoded defaults
//! 2. The configuration file (`.toml` or `.json`)
//! 3. Environment variables (`ONE_OAUTH_` prefix, `__` separates nesting)
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! port = 4999
//! outbound_timeout_ms = 10000
//!
//! [security]
//! secure_cookies = false
//! state_max_age_secs = 60
//!
//! [providers.google]
//! credentials_file = "google-creds.json"
//! redirect_url = "http://localhost:5000/auth/google/callback"
//! upstream_success_redirect_url = "http://localhost:5000/auth/google/success/callback"
//! scopes = ["profile", "email"]
//! cookie_name = "example-google-app"
//! cookie_secret = "example cookie signing secret"
//! cookie_user_key = "googleID"
//! ```
//!
//! `ONE_OAUTH_PROVIDERS__GOOGLE__CLIENT_SECRET=...` overrides a single value.
//! The loaded configuration is validated once and never mutated afterwards.

use figment::providers::{Env, Format, Json, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::oauth2::types::{ProviderConfig, UnknownProvider};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ONE_OAUTH_";

/// Suffix appended to a session cookie name to name its state cookie
pub const STATE_COOKIE_SUFFIX: &str = "_oauth_state";

/// Startup configuration errors
///
/// All of these are fatal: the proxy refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file does not exist
    #[error("configuration file not found: {0}")]
    Missing(PathBuf),

    /// Layered configuration could not be extracted
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Credential file could not be read
    #[error("failed to read credentials file {path}: {source}")]
    CredentialsRead {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Credential file is not valid JSON of a known shape
    #[error("malformed credentials file {path}: {source}")]
    CredentialsParse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Provider name is not a known provider
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),

    /// Provider registered twice
    #[error("provider `{0}` is registered more than once")]
    DuplicateProvider(String),

    /// Two providers would share a cookie
    #[error("cookie name `{cookie_name}` is used by both `{first}` and `{second}`")]
    DuplicateCookieName {
        /// Shared cookie name
        cookie_name: String,
        /// Provider that registered it first
        first: String,
        /// Provider that collided
        second: String,
    },

    /// Provider configuration violates an invariant
    #[error("provider `{provider}`: {reason}")]
    InvalidProvider {
        /// Provider name
        provider: String,
        /// What is wrong
        reason: String,
    },

    /// Cookie security settings would keep the state cookie from round-tripping
    #[error("security: {0}")]
    InvalidSecurity(String),

    /// Outbound HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Load(Box::new(error))
    }
}

/// Listener and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Deadline for a whole inbound request in milliseconds
    pub request_timeout_ms: u64,

    /// Deadline for each call to a provider in milliseconds
    pub outbound_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4999,
            request_timeout_ms: 30_000,
            outbound_timeout_ms: 10_000,
        }
    }
}

impl ServerSettings {
    /// `host:port` bind address
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Inbound request deadline
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Outbound call deadline
    #[must_use]
    pub const fn outbound_timeout(&self) -> Duration {
        Duration::from_millis(self.outbound_timeout_ms)
    }
}

/// Cookie security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Mark cookies `Secure` (HTTPS only)
    pub secure_cookies: bool,

    /// Cookie SameSite policy
    pub same_site: SameSitePolicy,

    /// Lifetime of the login state cookie in seconds
    pub state_max_age_secs: u64,

    /// Lifetime of the session cookie in seconds
    pub session_max_age_secs: u64,
}

impl SecuritySettings {
    /// Reject settings under which browsers drop or withhold the state cookie
    ///
    /// The provider returns to the callback through a cross-site top-level
    /// redirect, so a `Strict` state cookie is never sent back. `None`
    /// cookies without `Secure` are refused by browsers outright.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSecurity`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.same_site {
            SameSitePolicy::Strict => Err(ConfigError::InvalidSecurity(
                "same_site = \"strict\" blocks the provider redirect back to the callback"
                    .to_string(),
            )),
            SameSitePolicy::None if !self.secure_cookies => Err(ConfigError::InvalidSecurity(
                "same_site = \"none\" requires secure_cookies = true".to_string(),
            )),
            SameSitePolicy::Lax | SameSitePolicy::None => Ok(()),
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            secure_cookies: !cfg!(debug_assertions),
            same_site: SameSitePolicy::Lax,
            state_max_age_secs: 60,
            session_max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Cookie SameSite policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    /// Strict SameSite policy (rejected at startup)
    Strict,
    /// Lax SameSite policy (recommended; the provider redirect is a top-level GET)
    Lax,
    /// None SameSite policy (requires secure cookies)
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => Self::Strict,
            SameSitePolicy::Lax => Self::Lax,
            SameSitePolicy::None => Self::None,
        }
    }
}

/// Complete proxy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Cookie security settings
    #[serde(default)]
    pub security: SecuritySettings,

    /// Provider name to provider configuration
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl ProxyConfig {
    /// Layered figment for an optional configuration file
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            figment = if path.extension().is_some_and(|ext| ext == "json") {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load, resolve credential files, and validate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing or malformed, a
    /// credentials file cannot be read, or validation fails
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
        }

        let mut config: Self = Self::figment(path).extract()?;

        let base_dir = path
            .and_then(Path::parent)
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.resolve_credentials(&base_dir)?;
        config.validate()?;

        tracing::debug!(providers = ?config.providers.keys().collect::<Vec<_>>(), "configuration loaded");
        Ok(config)
    }

    /// Fill empty client credentials from each provider's `credentials_file`
    ///
    /// Relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CredentialsRead`] or [`ConfigError::CredentialsParse`]
    pub fn resolve_credentials(&mut self, base_dir: &Path) -> Result<(), ConfigError> {
        for provider in self.providers.values_mut() {
            let Some(file) = &provider.credentials_file else {
                continue;
            };

            let path = base_dir.join(file);
            let credentials = ClientCredentials::from_file(&path)?;

            if provider.client_id.is_empty() {
                provider.client_id = credentials.client_id;
            }
            if provider.client_secret.is_empty() {
                provider.client_secret = credentials.client_secret;
            }
        }
        Ok(())
    }

    /// Check every provider and cross-provider invariant
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.security.validate()?;

        let mut cookies = CookieNames::default();
        for (name, provider) in &self.providers {
            validate_provider(name, provider)?;
            cookies.claim(name, &provider.cookie_name)?;
        }
        Ok(())
    }
}

/// Tracks cookie names claimed by providers
///
/// Each provider claims its session cookie and the derived state cookie.
#[derive(Debug, Default)]
pub struct CookieNames {
    owners: BTreeMap<String, String>,
}

impl CookieNames {
    /// Claim the session and state cookie names for `provider`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateCookieName`] if either name is taken
    pub fn claim(&mut self, provider: &str, cookie_name: &str) -> Result<(), ConfigError> {
        let names = [
            cookie_name.to_string(),
            format!("{cookie_name}{STATE_COOKIE_SUFFIX}"),
        ];

        for name in &names {
            if let Some(first) = self.owners.get(name) {
                return Err(ConfigError::DuplicateCookieName {
                    cookie_name: name.clone(),
                    first: first.clone(),
                    second: provider.to_string(),
                });
            }
        }
        for name in names {
            self.owners.insert(name, provider.to_string());
        }
        Ok(())
    }

    /// Names claimed so far
    #[must_use]
    pub fn claimed(&self) -> BTreeSet<&str> {
        self.owners.keys().map(String::as_str).collect()
    }
}

/// Validate a single provider configuration
///
/// # Errors
///
/// Returns [`ConfigError::InvalidProvider`] naming the first violation
pub fn validate_provider(name: &str, config: &ProviderConfig) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidProvider {
        provider: name.to_string(),
        reason: reason.to_string(),
    };

    if config.client_id.trim().is_empty() {
        return Err(invalid("client_id is empty"));
    }
    if config.client_secret.trim().is_empty() {
        return Err(invalid("client_secret is empty"));
    }
    if !is_absolute_url(&config.redirect_url) {
        return Err(invalid("redirect_url must be an absolute URL"));
    }
    if !is_absolute_url(&config.upstream_success_redirect_url) {
        return Err(invalid("upstream_success_redirect_url must be an absolute URL"));
    }
    if config.scopes.iter().any(|scope| scope.trim().is_empty()) {
        return Err(invalid("scopes must not contain empty values"));
    }
    if !is_cookie_token(&config.cookie_name) {
        return Err(invalid("cookie_name must be a non-empty cookie token"));
    }
    if config.cookie_secret.is_empty() {
        return Err(invalid("cookie_secret is empty"));
    }
    if config.cookie_user_key.trim().is_empty() {
        return Err(invalid("cookie_user_key is empty"));
    }
    for url in [&config.auth_url, &config.token_url, &config.userinfo_url]
        .into_iter()
        .flatten()
    {
        if !is_absolute_url(url) {
            return Err(invalid("endpoint overrides must be absolute URLs"));
        }
    }
    Ok(())
}

fn is_absolute_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
    })
}

/// RFC 6265 cookie-name token
fn is_cookie_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"'
                        | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}'
                )
        })
}

/// Client ID and secret from a provider-issued credential file
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
}

/// Accepted credential file layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsFile {
    Web { web: ClientCredentials },
    Installed { installed: ClientCredentials },
    Flat(ClientCredentials),
}

impl ClientCredentials {
    /// Parse a credential file
    ///
    /// Accepts the Google console layouts (`{"web": {...}}`,
    /// `{"installed": {...}}`) and a flat `{"client_id", "client_secret"}`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CredentialsRead`] or [`ConfigError::CredentialsParse`]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::CredentialsRead {
            path: path.to_path_buf(),
            source,
        })?;

        let file: CredentialsFile =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::CredentialsParse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(match file {
            CredentialsFile::Web { web } => web,
            CredentialsFile::Installed { installed } => installed,
            CredentialsFile::Flat(credentials) => credentials,
        })
    }
}
