//! OAuth2 provider integration
//!
//! Provider adapters, the per-provider `oauth2` client wrapper and the
//! outbound HTTP client used for token exchange and user-info calls.

pub mod client;
pub mod http;
pub mod providers;
pub mod types;

pub use client::ProviderClient;
pub use http::OutboundClient;
pub use providers::{BuiltinProvider, FacebookProvider, GitHubProvider, GoogleProvider, ProviderAdapter};
pub use types::{
    ClientAuthStyle, Endpoints, OAuthError, OAuthProvider, OAuthToken, ProviderConfig,
    ProviderIdentity, UnknownProvider,
};
