//! Axum handlers for the per-provider routes
//!
//! Each handler receives its provider's [`AuthFlowController`] as router
//! state; the routes are mounted under `/auth/{provider}` by the registry.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::Response,
    Extension,
};

use super::{AuthFlowController, CallbackParams, VerifiedState};
use crate::error::ProxyError;

/// `GET /auth/{provider}/login`
///
/// # Errors
///
/// Returns error if the state cookie cannot be issued
pub async fn login(State(flow): State<Arc<AuthFlowController>>) -> Result<Response, ProxyError> {
    Ok(flow.login()?)
}

/// `GET /auth/{provider}/callback`
///
/// Only reachable through [`super::verify_state`], which inserts
/// [`VerifiedState`].
///
/// # Errors
///
/// Returns error if the provider denied the login or any step of the
/// code-for-session exchange fails
pub async fn callback(
    State(flow): State<Arc<AuthFlowController>>,
    Extension(_verified): Extension<VerifiedState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ProxyError> {
    Ok(flow.callback(&params).await?)
}

/// `ANY /auth/{provider}/logout`
pub async fn logout(State(flow): State<Arc<AuthFlowController>>, method: Method) -> Response {
    flow.logout(&method)
}

/// `GET /auth/{provider}/authenticated`
pub async fn authenticated(
    State(flow): State<Arc<AuthFlowController>>,
    headers: HeaderMap,
) -> StatusCode {
    flow.is_authenticated(&headers)
}
