//! State verification middleware
//!
//! Wraps the callback route: the request only reaches the callback handler
//! once its `state` parameter matches the state cookie. Whatever the outcome,
//! the response clears the state cookie so a state is never accepted twice
//! by the same browser.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::state::StateToken;
use super::AuthFlowController;
use crate::error::ProxyError;
use crate::session::append_set_cookie;

/// Request extension inserted once the state has been verified
#[derive(Debug, Clone)]
pub struct VerifiedState(pub StateToken);

/// Reject callbacks whose state does not match the state cookie
///
/// Runs before the inner handler, so a mismatched request never reaches the
/// token endpoint.
pub async fn verify_state(
    State(flow): State<Arc<AuthFlowController>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
    });

    let verdict = flow
        .state_cookie()
        .verify(request.headers(), presented.as_deref());

    let mut response = match verdict {
        Ok(token) => {
            request.extensions_mut().insert(VerifiedState(token));
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(provider = flow.name(), "login state rejected");
            ProxyError::from(err).into_response()
        }
    };

    if let Err(err) = append_set_cookie(&mut response, &flow.state_cookie().clear()) {
        tracing::error!(provider = flow.name(), error = %err, "failed to clear state cookie");
    }
    response
}
