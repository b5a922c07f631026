//! OAuth2 login flow integration tests
//!
//! Runs the proxy in-process with `axum-test` and stands in for each
//! provider's token and user-info endpoints with `wiremock`:
//! - Login redirect and state cookie
//! - State verification ahead of the token exchange
//! - Session issuance and the upstream redirect
//! - Logout and the authentication check
//! - Isolation between providers

use axum::http::{header, StatusCode};
use axum_test::{TestResponse, TestServer};
use cookie::Cookie;
use one_oauth::config::ProxyConfig;
use one_oauth::oauth2::types::ProviderConfig;
use one_oauth::registry::Registry;
use one_oauth::server::app;
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UPSTREAM: &str = "http://localhost:5000/auth/success/callback";

/// Provider configuration pointing token and user-info calls at `stub`
fn provider_config(name: &str, stub: &MockServer) -> ProviderConfig {
    ProviderConfig {
        client_id: format!("{name}-client-id"),
        client_secret: format!("{name}-client-secret"),
        redirect_url: format!("http://localhost:4999/auth/{name}/callback"),
        upstream_success_redirect_url: UPSTREAM.to_string(),
        cookie_name: format!("example-{name}-app"),
        cookie_secret: format!("{name} cookie signing secret"),
        cookie_user_key: format!("{name}ID"),
        token_url: Some(format!("{}/{name}/token", stub.uri())),
        userinfo_url: Some(format!("{}/{name}/user", stub.uri())),
        ..ProviderConfig::default()
    }
}

fn proxy_config(providers: &[&str], stub: &MockServer) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    for name in providers {
        config
            .providers
            .insert((*name).to_string(), provider_config(name, stub));
    }
    config
}

fn test_server(config: &ProxyConfig) -> TestServer {
    let registry = Registry::from_config(config).unwrap();
    TestServer::new(app(&registry, &config.server)).unwrap()
}

async fn stub_token(stub: &MockServer, provider: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{provider}/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "stub-access-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(calls)
        .mount(stub)
        .await;
}

async fn stub_user(stub: &MockServer, provider: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{provider}/user")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(stub)
        .await;
}

fn set_cookies(response: &TestResponse) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| Cookie::parse(value.to_str().unwrap().to_string()).unwrap())
        .collect()
}

fn location(response: &TestResponse) -> Url {
    Url::parse(response.header(header::LOCATION).to_str().unwrap()).unwrap()
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Start a login and return the state and the state cookie
async fn login(server: &TestServer, provider: &str) -> (String, Cookie<'static>) {
    let response = server.get(&format!("/auth/{provider}/login")).await;
    response.assert_status(StatusCode::FOUND);

    let state = query_value(&location(&response), "state").unwrap();
    let cookie = response.cookie(&format!("example-{provider}-app_oauth_state"));
    (state, cookie)
}

/// Complete a login and return the callback response
async fn callback(
    server: &TestServer,
    provider: &str,
    state: &str,
    state_cookie: Cookie<'static>,
) -> TestResponse {
    server
        .get(&format!("/auth/{provider}/callback?code=auth-code&state={state}"))
        .add_cookie(state_cookie)
        .await
}

fn google_user() -> serde_json::Value {
    json!({
        "id": "1098",
        "email": "ada@example.com",
        "verified_email": true,
        "name": "Ada & Co",
        "given_name": "Ada",
        "family_name": "Lovelace",
        "picture": "https://lh3.googleusercontent.com/a.png",
        "locale": "en"
    })
}

#[tokio::test]
async fn test_login_redirects_every_provider() {
    let stub = MockServer::start().await;
    let server = test_server(&proxy_config(&["google", "github", "facebook"], &stub));

    for provider in ["google", "github", "facebook"] {
        let response = server.get(&format!("/auth/{provider}/login")).await;
        response.assert_status(StatusCode::FOUND);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1, "{provider} sets one cookie");
        assert_eq!(cookies[0].name(), format!("example-{provider}-app_oauth_state"));
        assert_eq!(cookies[0].http_only(), Some(true));

        let url = location(&response);
        assert_eq!(
            query_value(&url, "client_id").as_deref(),
            Some(format!("{provider}-client-id").as_str())
        );
        assert_eq!(
            query_value(&url, "redirect_uri").as_deref(),
            Some(format!("http://localhost:4999/auth/{provider}/callback").as_str())
        );
        assert_eq!(query_value(&url, "response_type").as_deref(), Some("code"));
        assert!(!query_value(&url, "scope").unwrap().is_empty());
        assert!(!query_value(&url, "state").unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_each_login_mints_a_new_state() {
    let stub = MockServer::start().await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (first, _) = login(&server, "google").await;
    let (second, _) = login(&server, "google").await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_mismatched_state_skips_token_exchange() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 0).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (_, state_cookie) = login(&server, "google").await;
    let response = callback(&server, "google", "forged-state", state_cookie).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "invalid login state");

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name(), "example-google-app_oauth_state");
    assert_eq!(cookies[0].max_age(), Some(time::Duration::ZERO));
}

#[tokio::test]
async fn test_missing_state_cookie_is_rejected() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 0).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, _) = login(&server, "google").await;
    let response = server
        .get(&format!("/auth/google/callback?code=auth-code&state={state}"))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "invalid login state");
}

#[tokio::test]
async fn test_state_cookie_of_other_provider_is_rejected() {
    let stub = MockServer::start().await;
    stub_token(&stub, "github", 0).await;
    let server = test_server(&proxy_config(&["google", "github"], &stub));

    let (state, google_cookie) = login(&server, "google").await;
    let forged = Cookie::new(
        "example-github-app_oauth_state",
        google_cookie.value().to_string(),
    );
    let response = callback(&server, "github", &state, forged).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_successful_callback_issues_session() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 1).await;
    stub_user(&stub, "google", google_user()).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let response = callback(&server, "google", &state, state_cookie).await;

    response.assert_status(StatusCode::FOUND);

    let target = response.header(header::LOCATION);
    let target = target.to_str().unwrap();
    assert!(target.starts_with(UPSTREAM));
    assert!(target.contains("name=Ada+%26+Co"));
    assert!(target.contains("email=ada%40example.com"));
    assert!(target.contains("verified_email=true"));
    assert!(target.contains("hd=&"));

    let cookies = set_cookies(&response);
    let sessions: Vec<_> = cookies
        .iter()
        .filter(|c| c.name() == "example-google-app")
        .collect();
    assert_eq!(sessions.len(), 1);
    assert!(cookies
        .iter()
        .any(|c| c.name() == "example-google-app_oauth_state" && c.value().is_empty()));

    let session = response.cookie("example-google-app");
    server
        .get("/auth/google/authenticated")
        .add_cookie(session)
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_replayed_state_is_rejected() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 1).await;
    stub_user(&stub, "google", google_user()).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let first = callback(&server, "google", &state, state_cookie).await;
    first.assert_status(StatusCode::FOUND);

    // The browser now holds the cleared state cookie
    let cleared = first.cookie("example-google-app_oauth_state");
    let replay = callback(&server, "google", &state, cleared).await;

    replay.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookies(&replay)
        .iter()
        .all(|c| c.name() != "example-google-app"));
}

#[tokio::test]
async fn test_github_identity_is_forwarded() {
    let stub = MockServer::start().await;
    stub_token(&stub, "github", 1).await;
    stub_user(
        &stub,
        "github",
        json!({
            "id": 583_231,
            "login": "octocat",
            "name": "The Octocat",
            "email": "octocat@github.com",
            "avatar_url": "https://avatars.githubusercontent.com/u/583231",
            "company": "GitHub",
            "location": "San Francisco",
            "bio": null,
            "url": "https://api.github.com/users/octocat"
        }),
    )
    .await;
    let server = test_server(&proxy_config(&["github"], &stub));

    let (state, state_cookie) = login(&server, "github").await;
    let response = callback(&server, "github", &state, state_cookie).await;
    response.assert_status(StatusCode::FOUND);

    let target = location(&response);
    assert_eq!(query_value(&target, "id").as_deref(), Some("583231"));
    assert_eq!(
        query_value(&target, "picture").as_deref(),
        Some("https://avatars.githubusercontent.com/u/583231")
    );
    assert_eq!(query_value(&target, "bio").as_deref(), Some(""));
    assert_eq!(query_value(&target, "login"), None);
}

#[tokio::test]
async fn test_facebook_identity_is_forwarded() {
    let stub = MockServer::start().await;
    stub_token(&stub, "facebook", 1).await;
    stub_user(
        &stub,
        "facebook",
        json!({
            "id": "10157",
            "name": "Mark & Co",
            "email": "mark@example.com",
            "birthday": "01/01/1990"
        }),
    )
    .await;
    let server = test_server(&proxy_config(&["facebook"], &stub));

    let (state, state_cookie) = login(&server, "facebook").await;
    let response = callback(&server, "facebook", &state, state_cookie).await;
    response.assert_status(StatusCode::FOUND);

    let target = location(&response);
    assert_eq!(query_value(&target, "id").as_deref(), Some("10157"));
    assert_eq!(query_value(&target, "name").as_deref(), Some("Mark & Co"));
    assert_eq!(
        query_value(&target, "email").as_deref(),
        Some("mark@example.com")
    );
    assert_eq!(query_value(&target, "birthday"), None);

    let session = response.cookie("example-facebook-app");
    server
        .get("/auth/facebook/authenticated")
        .add_cookie(session)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_provider_denial_is_bad_request() {
    let stub = MockServer::start().await;
    stub_token(&stub, "facebook", 0).await;
    let server = test_server(&proxy_config(&["facebook"], &stub));

    let (state, state_cookie) = login(&server, "facebook").await;
    let response = server
        .get(&format!(
            "/auth/facebook/callback?error=access_denied&state={state}"
        ))
        .add_cookie(state_cookie)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "login was denied by the provider");
}

#[tokio::test]
async fn test_missing_code_is_bad_request() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 0).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let response = server
        .get(&format!("/auth/google/callback?state={state}"))
        .add_cookie(state_cookie)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_endpoint_failure() {
    let stub = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&stub)
        .await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let response = callback(&server, "google", &state, state_cookie).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "token exchange failed");
    assert!(set_cookies(&response)
        .iter()
        .all(|c| c.name() != "example-google-app"));
}

#[tokio::test]
async fn test_token_endpoint_deadline() {
    let stub = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late", "token_type": "Bearer"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&stub)
        .await;
    let mut config = proxy_config(&["google"], &stub);
    config.server.outbound_timeout_ms = 200;
    let server = test_server(&config);

    let (state, state_cookie) = login(&server, "google").await;
    let response = callback(&server, "google", &state, state_cookie).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "token exchange failed");
}

#[tokio::test]
async fn test_inbound_request_deadline() {
    let stub = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/google/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late", "token_type": "Bearer"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&stub)
        .await;
    let mut config = proxy_config(&["google"], &stub);
    config.server.request_timeout_ms = 200;
    let server = test_server(&config);

    let (state, state_cookie) = login(&server, "google").await;
    let response = callback(&server, "google", &state, state_cookie).await;

    response.assert_status(StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn test_user_info_without_id() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 1).await;
    stub_user(&stub, "google", json!({"email": "ada@example.com"})).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let response = callback(&server, "google", &state, state_cookie).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "incomplete user information");
}

#[tokio::test]
async fn test_user_info_rejected() {
    let stub = MockServer::start().await;
    stub_token(&stub, "facebook", 1).await;
    Mock::given(method("GET"))
        .and(path("/facebook/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&stub)
        .await;
    let server = test_server(&proxy_config(&["facebook"], &stub));

    let (state, state_cookie) = login(&server, "facebook").await;
    let response = callback(&server, "facebook", &state, state_cookie).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "could not fetch user information");
}

#[tokio::test]
async fn test_logout_post_ends_session() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 1).await;
    stub_user(&stub, "google", google_user()).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let session = callback(&server, "google", &state, state_cookie)
        .await
        .cookie("example-google-app");

    let logout = server
        .post("/auth/google/logout")
        .add_cookie(session)
        .await;
    logout.assert_status(StatusCode::OK);
    assert!(logout.text().is_empty());

    let cleared = logout.cookie("example-google-app");
    assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));

    server
        .get("/auth/google/authenticated")
        .add_cookie(cleared)
        .await
        .assert_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED);
}

#[tokio::test]
async fn test_logout_get_keeps_session() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 1).await;
    stub_user(&stub, "google", google_user()).await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let session = callback(&server, "google", &state, state_cookie)
        .await
        .cookie("example-google-app");

    let logout = server
        .get("/auth/google/logout")
        .add_cookie(session.clone())
        .await;
    logout.assert_status(StatusCode::OK);
    assert!(set_cookies(&logout).is_empty());

    server
        .get("/auth/google/authenticated")
        .add_cookie(session)
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_providers_do_not_share_sessions() {
    let stub = MockServer::start().await;
    stub_token(&stub, "google", 1).await;
    stub_user(&stub, "google", google_user()).await;
    let server = test_server(&proxy_config(&["google", "github"], &stub));

    let (state, state_cookie) = login(&server, "google").await;
    let session = callback(&server, "google", &state, state_cookie)
        .await
        .cookie("example-google-app");

    server
        .get("/auth/github/authenticated")
        .add_cookie(session.clone())
        .await
        .assert_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED);

    let renamed = Cookie::new("example-github-app", session.value().to_string());
    server
        .get("/auth/github/authenticated")
        .add_cookie(renamed)
        .await
        .assert_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED);
}

#[tokio::test]
async fn test_authenticated_without_session() {
    let stub = MockServer::start().await;
    let server = test_server(&proxy_config(&["facebook"], &stub));

    server
        .get("/auth/facebook/authenticated")
        .await
        .assert_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED);

    server
        .get("/auth/facebook/authenticated")
        .add_cookie(Cookie::new("example-facebook-app", "forged"))
        .await
        .assert_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED);
}

#[tokio::test]
async fn test_health_lists_providers() {
    let stub = MockServer::start().await;
    let server = test_server(&proxy_config(&["google", "facebook"], &stub));

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["providers"], json!(["facebook", "google"]));
}

#[tokio::test]
async fn test_unconfigured_provider_is_not_routed() {
    let stub = MockServer::start().await;
    let server = test_server(&proxy_config(&["google"], &stub));

    let response = server.get("/auth/github/login").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_text("not found");
}

#[tokio::test]
async fn test_zero_providers_is_valid() {
    let server = test_server(&ProxyConfig::default());

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "degraded");
}
