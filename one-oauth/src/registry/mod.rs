//! Provider registry and routing
//!
//! The registry owns one [`AuthFlowController`] per provider and mounts the
//! same four routes for each under `/auth/{provider}`:
//!
//! | Method | Path                            |
//! |--------|---------------------------------|
//! | GET    | `/auth/{provider}/login`        |
//! | GET    | `/auth/{provider}/callback`     |
//! | ANY    | `/auth/{provider}/logout`       |
//! | GET    | `/auth/{provider}/authenticated`|
//!
//! Built-in providers come from configuration; other providers are added
//! with [`Registry::register`] and a custom [`ProviderAdapter`].

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{any, get},
    Router,
};

use crate::config::{validate_provider, ConfigError, CookieNames, ProxyConfig, SecuritySettings};
use crate::error::not_found;
use crate::flow::{handlers, verify_state, AuthFlowController};
use crate::health::health_check;
use crate::oauth2::http::OutboundClient;
use crate::oauth2::providers::{BuiltinProvider, ProviderAdapter};
use crate::oauth2::types::{OAuthProvider, ProviderConfig};

/// Route suffixes mounted for every provider
pub const PROVIDER_ROUTES: [(&str, &str); 4] = [
    ("GET", "login"),
    ("GET", "callback"),
    ("ANY", "logout"),
    ("GET", "authenticated"),
];

/// Immutable-after-startup set of provider flows
#[derive(Debug)]
pub struct Registry {
    flows: BTreeMap<String, Arc<AuthFlowController>>,
    cookies: CookieNames,
    security: SecuritySettings,
    http: OutboundClient,
}

impl Registry {
    /// Empty registry
    #[must_use]
    pub fn new(security: SecuritySettings, http: OutboundClient) -> Self {
        Self {
            flows: BTreeMap::new(),
            cookies: CookieNames::default(),
            security,
            http,
        }
    }

    /// Registry with every provider in `config`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown provider name or any provider
    /// that fails validation
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let http = OutboundClient::new(config.server.outbound_timeout())?;
        let mut registry = Self::new(config.security.clone(), http);

        for (name, provider) in &config.providers {
            let kind: OAuthProvider = name.parse()?;
            registry.register(Arc::new(BuiltinProvider::new(kind)), provider)?;
        }

        Ok(registry)
    }

    /// Register a provider adapter with its configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the name is taken or malformed, the
    /// configuration is invalid, or its cookie names collide with another
    /// provider's
    pub fn register(
        &mut self,
        adapter: Arc<dyn ProviderAdapter>,
        config: &ProviderConfig,
    ) -> Result<&mut Self, ConfigError> {
        let name = adapter.name().to_string();
        validate_provider(&name, config)?;

        let flow = AuthFlowController::new(adapter, config, &self.security, self.http.clone())?;
        self.register_flow(flow)
    }

    /// Register a fully built controller
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the name is taken or malformed or the
    /// controller's cookie names collide with another provider's
    pub fn register_flow(&mut self, flow: AuthFlowController) -> Result<&mut Self, ConfigError> {
        let name = flow.name().to_string();
        if !is_route_segment(&name) {
            return Err(ConfigError::InvalidProvider {
                provider: name,
                reason: "name must be lowercase letters, digits, `-` or `_`".to_string(),
            });
        }
        if self.flows.contains_key(&name) {
            return Err(ConfigError::DuplicateProvider(name));
        }

        self.cookies.claim(&name, flow.sessions().cookie_name())?;
        tracing::debug!(provider = %name, "provider registered");
        self.flows.insert(name, Arc::new(flow));
        Ok(self)
    }

    /// Registered provider names in route order
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    /// Controller for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<AuthFlowController>> {
        self.flows.get(name)
    }

    /// Every mounted route as `METHOD /path`
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        let mut routes = vec!["GET /health".to_string()];
        for name in self.flows.keys() {
            for (method, suffix) in PROVIDER_ROUTES {
                routes.push(format!("{method} /auth/{name}/{suffix}"));
            }
        }
        routes
    }

    /// Router serving every registered provider plus `/health`
    #[must_use]
    pub fn router(&self) -> Router {
        let names: Arc<[String]> = self.flows.keys().cloned().collect();
        let mut router = Router::new()
            .route("/health", get(health_check))
            .with_state(names);

        for (name, flow) in &self.flows {
            router = router.nest(&format!("/auth/{name}"), provider_routes(Arc::clone(flow)));
        }
        router.fallback(not_found)
    }
}

fn provider_routes(flow: Arc<AuthFlowController>) -> Router {
    Router::new()
        .route("/login", get(handlers::login))
        .route(
            "/callback",
            get(handlers::callback).route_layer(middleware::from_fn_with_state(
                Arc::clone(&flow),
                verify_state,
            )),
        )
        .route("/logout", any(handlers::logout))
        .route("/authenticated", get(handlers::authenticated))
        .with_state(flow)
}

fn is_route_segment(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}
