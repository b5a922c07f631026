//! Core OAuth2 types and configuration
//!
//! This module defines the foundational types for the login proxy:
//! provider identifiers, per-provider configuration, endpoint descriptors,
//! the canonical identity record, and the flow error taxonomy.

use oauth2::basic::BasicClient;
use oauth2::{EndpointNotSet, EndpointSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Type alias for a configured OAuth2 client with auth and token endpoints set
///
/// The type parameters indicate which endpoints are configured:
/// - `EndpointSet` for `HasAuthUrl` - Authorization endpoint is configured
/// - `EndpointNotSet` for `HasDeviceAuthUrl` - Device auth not used
/// - `EndpointNotSet` for `HasIntrospectionUrl` - Token introspection not used
/// - `EndpointNotSet` for `HasRevocationUrl` - Token revocation not used
/// - `EndpointSet` for `HasTokenUrl` - Token exchange endpoint is configured
pub type ConfiguredClient = BasicClient<
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Built-in OAuth2 provider identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    /// Google OAuth2
    Google,
    /// GitHub OAuth2
    GitHub,
    /// Facebook OAuth2
    Facebook,
}

impl OAuthProvider {
    /// All built-in providers
    pub const ALL: [Self; 3] = [Self::Google, Self::GitHub, Self::Facebook];

    /// Get the provider as a string (lowercase)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
            Self::Facebook => "facebook",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider name that matches no built-in provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider `{0}`")]
pub struct UnknownProvider(pub String);

impl FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::GitHub),
            "facebook" => Ok(Self::Facebook),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// How client credentials are presented to the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthStyle {
    /// HTTP Basic authorization header
    BasicAuth,
    /// `client_id` / `client_secret` form fields
    RequestBody,
}

/// Provider OAuth2 endpoint descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// User-info endpoint
    pub userinfo_url: String,
}

impl Endpoints {
    /// Build a descriptor from static URLs
    #[must_use]
    pub fn new(auth_url: &str, token_url: &str, userinfo_url: &str) -> Self {
        Self {
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
            userinfo_url: userinfo_url.to_string(),
        }
    }

    /// Replace any endpoint that has a configured override
    #[must_use]
    pub fn with_overrides(mut self, config: &ProviderConfig) -> Self {
        if let Some(url) = &config.auth_url {
            self.auth_url.clone_from(url);
        }
        if let Some(url) = &config.token_url {
            self.token_url.clone_from(url);
        }
        if let Some(url) = &config.userinfo_url {
            self.userinfo_url.clone_from(url);
        }
        self
    }
}

/// Configuration for one OAuth2 provider
///
/// Deserialized from a `[providers.<name>]` table. Secrets are redacted from
/// the `Debug` representation.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Callback URL registered with the provider
    pub redirect_url: String,
    /// Where the browser is sent after a successful login
    pub upstream_success_redirect_url: String,
    /// OAuth2 scopes to request; empty means the provider defaults
    pub scopes: Vec<String>,
    /// Session cookie name, unique across providers
    pub cookie_name: String,
    /// Session cookie signing secret
    pub cookie_secret: String,
    /// Key under which the provider user ID is stored in the session
    pub cookie_user_key: String,
    /// Provider-issued JSON credential file supplying client ID/secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,
    /// Authorization endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    /// Token endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    /// User-info endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_url: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field(
                "upstream_success_redirect_url",
                &self.upstream_success_redirect_url,
            )
            .field("scopes", &self.scopes)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secret", &"<redacted>")
            .field("cookie_user_key", &self.cookie_user_key)
            .field("credentials_file", &self.credentials_file)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .finish()
    }
}

/// Canonical result of a successful provider login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Provider-namespaced user ID, never empty
    pub provider_user_id: String,
    /// Email address (may be empty)
    pub email: String,
    /// Display name (may be empty)
    pub display_name: String,
    /// Every mapped field, forwarded upstream as query parameters
    pub attributes: BTreeMap<String, String>,
}

impl ProviderIdentity {
    /// Build an identity from the mapped attribute table
    ///
    /// The `id`, `email` and `name` attributes populate the typed fields.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::IdentityMappingFailed`] if `id` is absent or empty
    pub fn from_attributes(attributes: BTreeMap<String, String>) -> Result<Self, OAuthError> {
        let provider_user_id = attributes
            .get("id")
            .filter(|id| !id.trim().is_empty())
            .cloned()
            .ok_or_else(|| {
                OAuthError::IdentityMappingFailed("user-info response has no id".to_string())
            })?;

        Ok(Self {
            provider_user_id,
            email: attributes.get("email").cloned().unwrap_or_default(),
            display_name: attributes.get("name").cloned().unwrap_or_default(),
            attributes,
        })
    }
}

/// OAuth2 access token
#[derive(Clone)]
pub struct OAuthToken {
    /// Access token
    pub access_token: String,
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// OAuth2 flow errors
///
/// Each variant is local to one request. The `Display` text is meant for
/// logs; responses use [`OAuthError::public_message`].
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// State token missing, expired, tampered or mismatched
    #[error("OAuth2 state token mismatch (potential CSRF attack)")]
    StateMismatch,

    /// Authorization code exchange failed
    #[error("Failed to exchange authorization code for token: {0}")]
    TokenExchangeFailed(String),

    /// Failed to fetch user info
    #[error("Failed to fetch user information: {0}")]
    UserInfoFetchFailed(String),

    /// User-info response lacks required fields
    #[error("Failed to map user information: {0}")]
    IdentityMappingFailed(String),

    /// Session cookie could not be written
    #[error("Failed to write session: {0}")]
    SessionWriteFailed(String),

    /// Provider redirected back with an `error` parameter
    #[error("OAuth2 provider returned error: {0}")]
    ProviderDenied(String),

    /// Callback carried no authorization code
    #[error("OAuth2 callback is missing the authorization code")]
    MissingCode,

    /// Invalid client or endpoint configuration
    #[error("OAuth2 error: {0}")]
    Generic(String),
}

impl OAuthError {
    /// Terse, non-sensitive message suitable for a response body
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::StateMismatch => "invalid login state",
            Self::TokenExchangeFailed(_) => "token exchange failed",
            Self::UserInfoFetchFailed(_) => "could not fetch user information",
            Self::IdentityMappingFailed(_) => "incomplete user information",
            Self::SessionWriteFailed(_) => "could not issue session",
            Self::ProviderDenied(_) => "login was denied by the provider",
            Self::MissingCode => "missing authorization code",
            Self::Generic(_) => "authentication error",
        }
    }

    /// Whether the failure was caused by malformed client input
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::ProviderDenied(_) | Self::MissingCode)
    }
}
