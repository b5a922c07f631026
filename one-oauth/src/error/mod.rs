//! Error types and error handling
//!
//! [`ProxyError`] is what handlers return. Response bodies carry only a terse
//! public message; the full error is logged.

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::oauth2::types::OAuthError;

/// Proxy error type
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Login flow error
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Not Found (404)
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ProxyError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::OAuth(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OAuth(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body text
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::OAuth(err) => err.public_message(),
            Self::NotFound(_) => "not found",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, self.public_message()).into_response()
    }
}

/// Fallback for paths outside `/health` and the mounted providers
pub async fn not_found(uri: Uri) -> ProxyError {
    ProxyError::NotFound(uri.path().to_string())
}
