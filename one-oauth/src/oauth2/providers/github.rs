//! GitHub OAuth2 provider implementation
//!
//! This module implements OAuth2 authentication with GitHub using their REST API.
//! Users who keep their email private get it from `/user/emails` instead.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{map_fields, ProviderAdapter};
use crate::oauth2::http::OutboundClient;
use crate::oauth2::types::{Endpoints, OAuthError, ProviderIdentity};

const AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USERINFO_URL: &str = "https://api.github.com/user";

const FIELDS: &[(&str, &str)] = &[
    ("email", "email"),
    ("name", "name"),
    ("id", "id"),
    ("avatar_url", "picture"),
    ("company", "company"),
    ("location", "location"),
    ("bio", "bio"),
    ("url", "url"),
];

/// GitHub OAuth2 provider
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubProvider;

/// GitHub email response
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    verified: bool,
    primary: bool,
}

impl GitHubProvider {
    /// Pick the primary verified address, then any verified one
    fn preferred_email(emails: &[GitHubEmail]) -> Option<&str> {
        emails
            .iter()
            .find(|e| e.primary && e.verified)
            .or_else(|| emails.iter().find(|e| e.verified))
            .map(|e| e.email.as_str())
    }
}

#[async_trait]
impl ProviderAdapter for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn endpoints(&self) -> Endpoints {
        Endpoints::new(AUTH_URL, TOKEN_URL, USERINFO_URL)
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &["read:user", "user:email"]
    }

    fn map_identity(&self, raw: &Value) -> Result<ProviderIdentity, OAuthError> {
        ProviderIdentity::from_attributes(map_fields(raw, FIELDS))
    }

    async fn fetch_identity(
        &self,
        http: &OutboundClient,
        userinfo_url: &str,
        access_token: &str,
    ) -> Result<ProviderIdentity, OAuthError> {
        let raw = http.get_json(userinfo_url, access_token, None).await?;
        let mut identity = self.map_identity(&raw)?;

        if identity.email.is_empty() {
            let emails_url = format!("{}/emails", userinfo_url.trim_end_matches('/'));
            let emails = match http.get_json(&emails_url, access_token, None).await {
                Ok(body) => serde_json::from_value::<Vec<GitHubEmail>>(body).unwrap_or_else(|e| {
                    tracing::debug!(error = %e, "GitHub email list unparseable");
                    Vec::new()
                }),
                Err(e) => {
                    tracing::debug!(error = %e, "GitHub email lookup failed");
                    Vec::new()
                }
            };

            if let Some(email) = Self::preferred_email(&emails) {
                identity.email = email.to_string();
                identity
                    .attributes
                    .insert("email".to_string(), email.to_string());
            }
        }

        Ok(identity)
    }
}
