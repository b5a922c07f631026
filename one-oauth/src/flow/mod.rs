//! Login flow
//!
//! One [`AuthFlowController`] per configured provider drives the
//! authorization-code flow:
//!
//! ```text
//! Idle -> LoginIssued -> AwaitingCallback -> StateVerified
//!      -> TokenExchanged -> IdentityResolved -> SessionIssued
//! ```
//!
//! Any step after `Idle` may end in `Failed`. Nothing about a flow is kept
//! on the server; the state lives in the browser's state cookie between the
//! login and callback requests.

pub mod guard;
pub mod handlers;
pub mod state;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::header::{HeaderValue, LOCATION};
use http::{HeaderMap, Method, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::{ConfigError, SecuritySettings};
use crate::oauth2::client::ProviderClient;
use crate::oauth2::http::OutboundClient;
use crate::oauth2::providers::ProviderAdapter;
use crate::oauth2::types::{OAuthError, ProviderConfig, ProviderIdentity};
use crate::session::{append_set_cookie, CookieSessionStore, CookieSettings, SessionStore};

pub use guard::{verify_state, VerifiedState};
pub use state::{StateCookie, StateToken};

/// Position of a login within the authorization-code flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Nothing has happened yet
    Idle,
    /// State minted and redirect to the provider built
    LoginIssued,
    /// Browser sent to the provider
    AwaitingCallback,
    /// Callback state matched the state cookie
    StateVerified,
    /// Authorization code exchanged for a token
    TokenExchanged,
    /// User-info fetched and mapped
    IdentityResolved,
    /// Session cookie issued
    SessionIssued,
    /// Flow aborted with the given public reason
    Failed(&'static str),
}

impl FlowState {
    /// Next state on the happy path
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::LoginIssued),
            Self::LoginIssued => Some(Self::AwaitingCallback),
            Self::AwaitingCallback => Some(Self::StateVerified),
            Self::StateVerified => Some(Self::TokenExchanged),
            Self::TokenExchanged => Some(Self::IdentityResolved),
            Self::IdentityResolved => Some(Self::SessionIssued),
            Self::SessionIssued | Self::Failed(_) => None,
        }
    }

    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::SessionIssued | Self::Failed(_))
    }

    /// Whether `next` is a legal transition from `self`
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        match next {
            Self::Failed(_) => !self.is_terminal() && self != Self::Idle,
            _ => self.successor() == Some(next),
        }
    }

    /// Name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoginIssued => "login_issued",
            Self::AwaitingCallback => "awaiting_callback",
            Self::StateVerified => "state_verified",
            Self::TokenExchanged => "token_exchanged",
            Self::IdentityResolved => "identity_resolved",
            Self::SessionIssued => "session_issued",
            Self::Failed(_) => "failed",
        }
    }
}

/// Tracks and logs one request's progress through [`FlowState`]
#[derive(Debug)]
pub struct FlowTrace<'a> {
    provider: &'a str,
    state: FlowState,
}

impl<'a> FlowTrace<'a> {
    /// Trace starting at `state`
    #[must_use]
    pub const fn new(provider: &'a str, state: FlowState) -> Self {
        Self { provider, state }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> FlowState {
        self.state
    }

    /// Move to `next`; illegal transitions are logged and ignored
    pub fn advance(&mut self, next: FlowState) {
        if self.state.can_advance_to(next) {
            tracing::debug!(
                provider = self.provider,
                from = self.state.as_str(),
                to = next.as_str(),
                "login flow advanced"
            );
            self.state = next;
        } else {
            tracing::warn!(
                provider = self.provider,
                from = self.state.as_str(),
                to = next.as_str(),
                "illegal login flow transition ignored"
            );
        }
    }

    /// Move to `Failed` for `error`
    pub fn fail(&mut self, error: &OAuthError) {
        tracing::warn!(
            provider = self.provider,
            step = self.state.as_str(),
            error = %error,
            "login flow failed"
        );
        self.advance(FlowState::Failed(error.public_message()));
    }
}

/// Query parameters of the provider callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// State token echoed by the provider
    pub state: Option<String>,
    /// Provider error code, e.g. `access_denied`
    pub error: Option<String>,
    /// Provider error description
    pub error_description: Option<String>,
}

/// Drives the login flow for one provider
pub struct AuthFlowController {
    client: ProviderClient,
    upstream: Url,
    state_cookie: StateCookie,
    sessions: Arc<dyn SessionStore>,
}

impl fmt::Debug for AuthFlowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFlowController")
            .field("provider", &self.name())
            .field("upstream", &self.upstream.as_str())
            .field("state_cookie", &self.state_cookie.name())
            .field("session_cookie", &self.sessions.cookie_name())
            .finish_non_exhaustive()
    }
}

impl AuthFlowController {
    /// Controller for one provider using the signed-cookie session store
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProvider`] if an endpoint, the redirect
    /// URL or the upstream URL does not parse
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        config: &ProviderConfig,
        security: &SecuritySettings,
        http: OutboundClient,
    ) -> Result<Self, ConfigError> {
        let provider = adapter.name().to_string();
        let invalid = |reason: String| ConfigError::InvalidProvider {
            provider: provider.clone(),
            reason,
        };

        let client = ProviderClient::new(adapter, config, http).map_err(|e| invalid(e.to_string()))?;
        let upstream = Url::parse(&config.upstream_success_redirect_url)
            .map_err(|e| invalid(format!("upstream_success_redirect_url: {e}")))?;

        let settings = CookieSettings::from(security);
        let state_cookie = StateCookie::new(
            &config.cookie_name,
            &config.cookie_secret,
            settings,
            security.state_max_age_secs,
        );
        let sessions = Arc::new(CookieSessionStore::new(
            config,
            settings,
            security.session_max_age_secs,
        ));

        Ok(Self {
            client,
            upstream,
            state_cookie,
            sessions,
        })
    }

    /// Replace the session store
    #[must_use]
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Provider name
    #[must_use]
    pub fn name(&self) -> &str {
        self.client.name()
    }

    /// OAuth2 client
    #[must_use]
    pub const fn client(&self) -> &ProviderClient {
        &self.client
    }

    /// State cookie codec
    #[must_use]
    pub const fn state_cookie(&self) -> &StateCookie {
        &self.state_cookie
    }

    /// Session store
    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// Start a login: redirect to the provider and set the state cookie
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Generic`] if the state cookie cannot be built
    pub fn login(&self) -> Result<Response, OAuthError> {
        let mut trace = FlowTrace::new(self.name(), FlowState::Idle);

        let (token, cookie) = self
            .state_cookie
            .issue()
            .map_err(|e| OAuthError::Generic(e.to_string()))?;
        let mut response = found(&self.client.authorization_url(token.as_str()))?;
        append_set_cookie(&mut response, &cookie).map_err(|e| OAuthError::Generic(e.to_string()))?;
        trace.advance(FlowState::LoginIssued);

        trace.advance(FlowState::AwaitingCallback);
        Ok(response)
    }

    /// Finish a login whose state has already been verified
    ///
    /// # Errors
    ///
    /// Returns the [`OAuthError`] of the first failing step
    pub async fn callback(&self, params: &CallbackParams) -> Result<Response, OAuthError> {
        let mut trace = FlowTrace::new(self.name(), FlowState::StateVerified);

        match self.complete(params, &mut trace).await {
            Ok(response) => Ok(response),
            Err(err) => {
                trace.fail(&err);
                Err(err)
            }
        }
    }

    async fn complete(
        &self,
        params: &CallbackParams,
        trace: &mut FlowTrace<'_>,
    ) -> Result<Response, OAuthError> {
        if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(OAuthError::ProviderDenied(error.to_string()));
        }
        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(OAuthError::MissingCode)?;

        let token = self.client.exchange_code(code).await?;
        trace.advance(FlowState::TokenExchanged);

        let identity = self.client.fetch_identity(&token.access_token).await?;
        trace.advance(FlowState::IdentityResolved);

        let cookie = self.sessions.issue(&identity.provider_user_id)?;
        let location = upstream_location(&self.upstream, &identity);
        let mut response = found(location.as_str())?;
        append_set_cookie(&mut response, &cookie)?;
        trace.advance(FlowState::SessionIssued);

        tracing::info!(provider = self.name(), "login completed");
        Ok(response)
    }

    /// End the session; only `POST` clears the cookie
    #[must_use]
    pub fn logout(&self, method: &Method) -> Response {
        let mut response = StatusCode::OK.into_response();
        if method == Method::POST {
            if let Err(err) = append_set_cookie(&mut response, &self.sessions.destroy()) {
                tracing::error!(provider = self.name(), error = %err, "failed to clear session cookie");
            }
        }
        response
    }

    /// `200 OK` with a valid session, `407` otherwise
    #[must_use]
    pub fn is_authenticated(&self, headers: &HeaderMap) -> StatusCode {
        if self.sessions.load(headers).is_some() {
            StatusCode::OK
        } else {
            StatusCode::PROXY_AUTHENTICATION_REQUIRED
        }
    }
}

/// Upstream URL with the identity attributes merged into its query
///
/// Identity attributes replace existing parameters of the same name and the
/// query is written in key order.
#[must_use]
pub fn upstream_location(upstream: &Url, identity: &ProviderIdentity) -> Url {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in upstream.query_pairs() {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    for (key, value) in &identity.attributes {
        params.insert(key.clone(), vec![value.clone()]);
    }

    let mut location = upstream.clone();
    location.set_query(None);
    if !params.is_empty() {
        let mut query = location.query_pairs_mut();
        for (key, values) in &params {
            for value in values {
                query.append_pair(key, value);
            }
        }
    }
    location
}

/// `302 Found` to `location`
fn found(location: &str) -> Result<Response, OAuthError> {
    let location = HeaderValue::from_str(location)
        .map_err(|_| OAuthError::Generic("redirect target is not a valid header".to_string()))?;

    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(LOCATION, location);
    Ok(response)
}
