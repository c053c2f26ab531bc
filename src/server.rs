//! HTTP surface for the webhook daemon
//!
//! # Routes
//!
//! ```text
//! POST <webhook path> ──▶ WebhookLayer ──▶ 200 / 400 (answered by the handler)
//! GET  /health        ──▶ {"status":"healthy"}
//! GET  /status        ──▶ version, uptime, counters
//! GET  /metrics       ──▶ Prometheus text
//! *                   ──▶ 404
//! ```
//!
//! The fallback is registered before the layer is applied so that requests
//! with no route still go through [`WebhookLayer`]. The webhook path itself
//! has no route.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::handler::WebhookHandler;
use crate::metrics::MetricsSnapshot;
use crate::service::WebhookLayer;

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Liveness probe body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" if responding
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// `/status` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Crate version
    pub version: String,
    /// Crate name
    pub name: String,
    /// Webhook path being served
    pub webhook_path: String,
    /// Seconds since the router was built
    pub uptime_seconds: u64,
    /// Request counters
    pub requests: MetricsSnapshot,
}

/// Shared state of the status routes
#[derive(Debug, Clone)]
pub struct AppState {
    handler: WebhookHandler,
    started: Instant,
}

impl AppState {
    /// State for `handler`, starting the uptime clock now
    pub fn new(handler: WebhookHandler) -> Self {
        Self {
            handler,
            started: Instant::now(),
        }
    }

    /// Seconds since construction
    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// `GET /health`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Status check requested");

    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        webhook_path: state.handler.config().path().to_string(),
        uptime_seconds: state.uptime_seconds(),
        requests: state.handler.metrics().snapshot(),
    };

    (StatusCode::OK, Json(response))
}

/// `GET /metrics`
#[instrument(skip_all)]
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        state.handler.metrics().to_prometheus_format(),
    )
}

async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

/// Build the daemon's router with `handler` in front of every route
///
/// ```rust,no_run
/// use gogs_webhook::{server, WebhookConfig, WebhookHandler};
///
/// # async fn run() -> std::io::Result<()> {
/// let handler = WebhookHandler::new(WebhookConfig::new("/webhook", "s3cret"));
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
/// axum::serve(listener, server::router(handler)).await?;
/// # Ok(())
/// # }
/// ```
pub fn router(handler: WebhookHandler) -> Router {
    let state = Arc::new(AppState::new(handler.clone()));

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(WebhookLayer::new(handler))
}
