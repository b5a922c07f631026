//! one-oauth: multi-provider OAuth2 login proxy
//!
//! one-oauth sits in front of an application and performs the OAuth2
//! authorization-code login against Google, GitHub and Facebook. After a
//! successful login it sets a signed session cookie and redirects the
//! browser to the application with the user's profile in the query string.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use one_oauth::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     one_oauth::observability::init()?;
//!
//!     let config = ProxyConfig::load(Some(std::path::Path::new("one-oauth.toml")))?;
//!     one_oauth::server::serve(&config).await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`config`]: figment-layered configuration and validation
//! - [`oauth2`]: provider adapters, OAuth2 client and outbound HTTP
//! - [`session`]: signed session and state cookies
//! - [`flow`]: the per-provider login state machine and its handlers
//! - [`registry`]: provider registration and routing
//! - [`server`]: listener, middleware and graceful shutdown

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod flow;
pub mod health;
pub mod oauth2;
pub mod observability;
pub mod registry;
pub mod server;
pub mod session;

/// Prelude module for convenient imports
///
/// ```rust
/// use one_oauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigError, ProxyConfig, SecuritySettings, ServerSettings};
    pub use crate::error::ProxyError;
    pub use crate::flow::{AuthFlowController, CallbackParams, FlowState};
    pub use crate::oauth2::{
        BuiltinProvider, OAuthError, OAuthProvider, OutboundClient, ProviderAdapter,
        ProviderConfig, ProviderIdentity,
    };
    pub use crate::registry::Registry;
    pub use crate::session::{CookieSessionStore, SessionRecord, SessionStore};
}
