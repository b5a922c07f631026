//! Per-provider OAuth2 client
//!
//! [`ProviderClient`] wraps the `oauth2` crate client for one configured
//! provider: it renders the authorization URL for a given state token and
//! exchanges authorization codes at the provider's token endpoint.

use std::sync::Arc;

use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};

use crate::oauth2::http::OutboundClient;
use crate::oauth2::providers::ProviderAdapter;
use crate::oauth2::types::{
    ClientAuthStyle, ConfiguredClient, Endpoints, OAuthError, OAuthToken, ProviderConfig,
    ProviderIdentity,
};

/// OAuth2 client bound to one provider and its configuration
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: ConfiguredClient,
    adapter: Arc<dyn ProviderAdapter>,
    endpoints: Endpoints,
    scopes: Vec<String>,
    http: OutboundClient,
}

impl ProviderClient {
    /// Create a new provider client
    ///
    /// Endpoint overrides in `config` replace the adapter defaults and an empty
    /// scope list falls back to the adapter's default scopes.
    ///
    /// # Errors
    ///
    /// Returns error if any endpoint or the redirect URL is invalid
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        config: &ProviderConfig,
        http: OutboundClient,
    ) -> Result<Self, OAuthError> {
        let endpoints = adapter.endpoints().with_overrides(config);

        let auth_type = match adapter.client_auth_style() {
            ClientAuthStyle::BasicAuth => AuthType::BasicAuth,
            ClientAuthStyle::RequestBody => AuthType::RequestBody,
        };

        // oauth2 5.0 API: BasicClient::new() only takes ClientId
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(endpoints.auth_url.clone())
                    .map_err(|e| OAuthError::Generic(format!("Invalid auth URL: {e}")))?,
            )
            .set_token_uri(
                TokenUrl::new(endpoints.token_url.clone())
                    .map_err(|e| OAuthError::Generic(format!("Invalid token URL: {e}")))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| OAuthError::Generic(format!("Invalid redirect URL: {e}")))?,
            )
            .set_auth_type(auth_type);

        let scopes = if config.scopes.is_empty() {
            adapter
                .default_scopes()
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        } else {
            config.scopes.clone()
        };

        Ok(Self {
            client,
            adapter,
            endpoints,
            scopes,
            http,
        })
    }

    /// Provider name
    #[must_use]
    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    /// Effective endpoint descriptor
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Effective scopes
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Authorization URL carrying `client_id`, `redirect_uri`, `scope` and `state`
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let state = state.to_string();
        let (auth_url, _csrf_state) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url();

        auth_url.to_string()
    }

    /// Exchange authorization code for access token
    ///
    /// A single attempt; no retries.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::TokenExchangeFailed`] on network failure, timeout,
    /// non-2xx response or an unparseable token body
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken, OAuthError> {
        let http = self.http.clone();
        let send = move |request: oauth2::HttpRequest| http.clone().send_oauth(request);

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&send)
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(describe_token_error(&e)))?;

        Ok(OAuthToken {
            access_token: token_response.access_token().secret().clone(),
        })
    }

    /// Fetch the user-info document and map it to an identity
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UserInfoFetchFailed`] or
    /// [`OAuthError::IdentityMappingFailed`]
    pub async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity, OAuthError> {
        self.adapter
            .fetch_identity(&self.http, &self.endpoints.userinfo_url, access_token)
            .await
    }
}

/// Summarise a token error without echoing the response body
fn describe_token_error<RE, T>(error: &RequestTokenError<RE, T>) -> String
where
    RE: std::error::Error + 'static,
    T: oauth2::ErrorResponse + std::fmt::Display + 'static,
{
    match error {
        RequestTokenError::ServerResponse(response) => {
            format!("provider rejected the code: {response}")
        }
        RequestTokenError::Request(e) => format!("request failed: {e}"),
        RequestTokenError::Parse(e, _) => format!("unparseable token response: {e}"),
        RequestTokenError::Other(msg) => msg.clone(),
    }
}
