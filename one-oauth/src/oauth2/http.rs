//! Shared outbound HTTP client for OAuth2 providers
//!
//! Every call to a provider (token exchange and user-info fetch) goes through
//! one [`OutboundClient`]. The client is built once at startup with a bounded
//! per-request deadline so a slow provider cannot hold a request open forever.

use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT};

use crate::oauth2::types::OAuthError;

/// Default deadline for a single outbound call
pub const DEFAULT_OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound HTTP client with redirects disabled and a fixed deadline
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct OutboundClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl OutboundClient {
    /// Build a client whose requests fail after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the TLS backend cannot be initialised
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(concat!("one-oauth/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { inner, timeout })
    }

    /// Configured per-request deadline
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute an `oauth2` crate request
    ///
    /// Used as the `AsyncHttpClient` for token exchange. Redirects are not
    /// followed, headers are forwarded as-is and the body is fully buffered.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the request cannot be sent, times out, or
    /// the response body cannot be read
    pub async fn send_oauth(
        self,
        request: oauth2::HttpRequest,
    ) -> Result<oauth2::HttpResponse, reqwest::Error> {
        let (parts, body) = request.into_parts();

        let response = self
            .inner
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        let mut http_response = http::Response::new(body);
        *http_response.status_mut() = status;
        *http_response.headers_mut() = headers;
        Ok(http_response)
    }

    /// GET a JSON document with bearer authentication
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UserInfoFetchFailed`] if the request fails, times
    /// out, returns a non-success status, or the body is not JSON
    pub async fn get_json(
        &self,
        url: &str,
        access_token: &str,
        headers: Option<HeaderMap>,
    ) -> Result<serde_json::Value, OAuthError> {
        let mut request = self
            .inner
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json");

        if let Some(headers) = headers {
            request = request.headers(headers);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OAuthError::UserInfoFetchFailed("request timed out".to_string())
            } else {
                OAuthError::UserInfoFetchFailed(e.without_url().to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(OAuthError::UserInfoFetchFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::UserInfoFetchFailed(format!("Failed to parse JSON: {e}")))
    }
}
