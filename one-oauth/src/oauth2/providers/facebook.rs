//! Facebook OAuth2 provider implementation

use serde_json::Value;

use super::{map_fields, ProviderAdapter};
use crate::oauth2::types::{Endpoints, OAuthError, ProviderIdentity};

const AUTH_URL: &str = "https://www.facebook.com/v3.2/dialog/oauth";
const TOKEN_URL: &str = "https://graph.facebook.com/v3.2/oauth/access_token";
const USERINFO_URL: &str = "https://graph.facebook.com/me?fields=id,name,email";

const FIELDS: &[(&str, &str)] = &[("email", "email"), ("name", "name"), ("id", "id")];

/// Facebook OAuth2 provider
#[derive(Debug, Clone, Copy, Default)]
pub struct FacebookProvider;

impl ProviderAdapter for FacebookProvider {
    fn name(&self) -> &str {
        "facebook"
    }

    fn endpoints(&self) -> Endpoints {
        Endpoints::new(AUTH_URL, TOKEN_URL, USERINFO_URL)
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &["email", "public_profile"]
    }

    fn map_identity(&self, raw: &Value) -> Result<ProviderIdentity, OAuthError> {
        ProviderIdentity::from_attributes(map_fields(raw, FIELDS))
    }
}
