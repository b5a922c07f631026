//! OAuth2 provider implementations
//!
//! This module contains the identity-provider adapters:
//! - Google OAuth2
//! - GitHub OAuth2
//! - Facebook OAuth2
//!
//! Each adapter owns its endpoint descriptor, default scopes and the mapping
//! from the provider's user-info document to a [`ProviderIdentity`]. The
//! shared login/callback flow only talks to the [`ProviderAdapter`] trait, so
//! a new provider is a new adapter and nothing else.

pub mod facebook;
pub mod github;
pub mod google;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::oauth2::http::OutboundClient;
use crate::oauth2::types::{ClientAuthStyle, Endpoints, OAuthError, OAuthProvider, ProviderIdentity};

pub use facebook::FacebookProvider;
pub use github::GitHubProvider;
pub use google::GoogleProvider;

/// Provider-specific half of the login flow
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    /// Route segment and log name, e.g. `google`
    fn name(&self) -> &str;

    /// Default endpoint descriptor
    fn endpoints(&self) -> Endpoints;

    /// Scopes requested when the configuration lists none
    fn default_scopes(&self) -> &'static [&'static str];

    /// How client credentials are sent to the token endpoint
    fn client_auth_style(&self) -> ClientAuthStyle {
        ClientAuthStyle::RequestBody
    }

    /// Map a raw user-info document to the canonical identity
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::IdentityMappingFailed`] if the user ID is missing
    fn map_identity(&self, raw: &Value) -> Result<ProviderIdentity, OAuthError>;

    /// Fetch and map the user-info document
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UserInfoFetchFailed`] if the request fails and
    /// [`OAuthError::IdentityMappingFailed`] if the document is incomplete
    async fn fetch_identity(
        &self,
        http: &OutboundClient,
        userinfo_url: &str,
        access_token: &str,
    ) -> Result<ProviderIdentity, OAuthError> {
        let raw = http.get_json(userinfo_url, access_token, None).await?;
        self.map_identity(&raw)
    }
}

/// The closed set of built-in providers
#[derive(Debug, Clone)]
pub enum BuiltinProvider {
    /// Google
    Google(GoogleProvider),
    /// GitHub
    GitHub(GitHubProvider),
    /// Facebook
    Facebook(FacebookProvider),
}

impl BuiltinProvider {
    /// Adapter for a built-in provider
    #[must_use]
    pub const fn new(kind: OAuthProvider) -> Self {
        match kind {
            OAuthProvider::Google => Self::Google(GoogleProvider),
            OAuthProvider::GitHub => Self::GitHub(GitHubProvider),
            OAuthProvider::Facebook => Self::Facebook(FacebookProvider),
        }
    }

    /// Provider identifier
    #[must_use]
    pub const fn kind(&self) -> OAuthProvider {
        match self {
            Self::Google(_) => OAuthProvider::Google,
            Self::GitHub(_) => OAuthProvider::GitHub,
            Self::Facebook(_) => OAuthProvider::Facebook,
        }
    }

    fn adapter(&self) -> &dyn ProviderAdapter {
        match self {
            Self::Google(p) => p,
            Self::GitHub(p) => p,
            Self::Facebook(p) => p,
        }
    }
}

#[async_trait]
impl ProviderAdapter for BuiltinProvider {
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn endpoints(&self) -> Endpoints {
        self.adapter().endpoints()
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        self.adapter().default_scopes()
    }

    fn client_auth_style(&self) -> ClientAuthStyle {
        self.adapter().client_auth_style()
    }

    fn map_identity(&self, raw: &Value) -> Result<ProviderIdentity, OAuthError> {
        self.adapter().map_identity(raw)
    }

    async fn fetch_identity(
        &self,
        http: &OutboundClient,
        userinfo_url: &str,
        access_token: &str,
    ) -> Result<ProviderIdentity, OAuthError> {
        self.adapter()
            .fetch_identity(http, userinfo_url, access_token)
            .await
    }
}

/// Render a user-info field as a query-string value
///
/// Strings pass through, numbers and booleans use their JSON text, and
/// absent or null fields become the empty string.
pub(crate) fn field_as_string(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Copy `(source, target)` field pairs out of a user-info document
pub(crate) fn map_fields(raw: &Value, fields: &[(&str, &str)]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(source, target)| ((*target).to_string(), field_as_string(raw, source)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_as_string() {
        let raw = json!({"s": "x", "n": 12345, "b": true, "z": null});
        assert_eq!(field_as_string(&raw, "s"), "x");
        assert_eq!(field_as_string(&raw, "n"), "12345");
        assert_eq!(field_as_string(&raw, "b"), "true");
        assert_eq!(field_as_string(&raw, "z"), "");
        assert_eq!(field_as_string(&raw, "missing"), "");
    }

    #[test]
    fn test_builtin_names_match_kind() {
        for kind in OAuthProvider::ALL {
            let provider = BuiltinProvider::new(kind);
            assert_eq!(provider.name(), kind.as_str());
            assert_eq!(provider.kind(), kind);
            assert!(!provider.default_scopes().is_empty());
        }
    }
}
