//! Health check endpoint
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{Router, routing::get};
//! use one_oauth::health::health_check;
//!
//! let providers: Arc<[String]> = Arc::from(vec!["google".to_string()]);
//! let app: Router = Router::new()
//!     .route("/health", get(health_check))
//!     .with_state(providers);
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving logins
    Healthy,
    /// Running without any provider configured
    Degraded,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall status
    pub status: HealthStatus,
    /// Crate version
    pub version: String,
    /// Timestamp of health check (Unix epoch)
    pub timestamp: u64,
    /// Mounted provider names
    pub providers: Vec<String>,
}

impl HealthCheckResponse {
    /// Report for the given providers
    #[must_use]
    pub fn new(providers: &[String]) -> Self {
        Self {
            status: if providers.is_empty() {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            providers: providers.to_vec(),
        }
    }
}

/// `GET /health`
pub async fn health_check(State(providers): State<Arc<[String]>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse::new(&providers))
}
