//! Google OAuth2 provider implementation
//!
//! Identity comes from the `oauth2/v2/userinfo` endpoint.

use serde_json::Value;

use super::{map_fields, ProviderAdapter};
use crate::oauth2::types::{Endpoints, OAuthError, ProviderIdentity};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Fields copied verbatim from the user-info document
const FIELDS: &[(&str, &str)] = &[
    ("email", "email"),
    ("name", "name"),
    ("family_name", "family_name"),
    ("gender", "gender"),
    ("given_name", "given_name"),
    ("hd", "hd"),
    ("id", "id"),
    ("link", "link"),
    ("locale", "locale"),
    ("picture", "picture"),
];

/// Google OAuth2 provider
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleProvider;

impl ProviderAdapter for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn endpoints(&self) -> Endpoints {
        Endpoints::new(AUTH_URL, TOKEN_URL, USERINFO_URL)
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &["profile", "email"]
    }

    fn map_identity(&self, raw: &Value) -> Result<ProviderIdentity, OAuthError> {
        let mut attributes = map_fields(raw, FIELDS);

        let verified = matches!(raw.get("verified_email"), Some(Value::Bool(true)));
        attributes.insert("verified_email".to_string(), verified.to_string());

        ProviderIdentity::from_attributes(attributes)
    }
}
