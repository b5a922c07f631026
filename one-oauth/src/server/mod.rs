//! HTTP server
//!
//! Builds the application router from a [`Registry`], wraps it in the
//! request trace and timeout layers, and serves until Ctrl-C or SIGTERM.

use axum::{http::StatusCode, Router};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ProxyConfig, ServerSettings};
use crate::registry::Registry;

/// Router for `registry` with tracing and the inbound request deadline
#[must_use]
pub fn app(registry: &Registry, settings: &ServerSettings) -> Router {
    registry
        .router()
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            settings.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Build the registry from `config` and serve on its configured address
///
/// # Errors
///
/// Returns error if the registry cannot be built, the address cannot be
/// bound, or the server fails
pub async fn serve(config: &ProxyConfig) -> anyhow::Result<()> {
    let registry = Registry::from_config(config)?;
    let listener = TcpListener::bind(config.server.address()).await?;
    serve_on(listener, &registry, &config.server).await
}

/// Serve `registry` on an already bound listener
///
/// # Errors
///
/// Returns error if the server fails
pub async fn serve_on(
    listener: TcpListener,
    registry: &Registry,
    settings: &ServerSettings,
) -> anyhow::Result<()> {
    let address = listener.local_addr()?;
    tracing::info!(
        %address,
        providers = ?registry.providers().collect::<Vec<_>>(),
        "one-oauth listening"
    );

    axum::serve(listener, app(registry, settings))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("one-oauth stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
