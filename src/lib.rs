//! Gogs Webhook - Verified Webhook Receiver for Gogs
//!
//! This crate receives webhook deliveries from a Gogs server, checks their
//! HMAC-SHA256 signature against a shared secret, and publishes the decoded
//! events to in-process subscribers.
//!
//! # Features
//!
//! - **Handler**: path/method matching, header checks, signature
//!   verification and JSON decoding, with exactly one response per request
//! - **Subscriptions**: listeners per event name, a `*` wildcard and an
//!   error topic
//! - **Tower Middleware**: [`WebhookLayer`] drops into any axum or hyper stack
//! - **Daemon**: `gogs-webhookd` logs every delivery it receives
//!
//! # Architecture
//!
//! ```text
//! Gogs ──POST──▶ WebhookLayer ──▶ WebhookHandler ──▶ 200 / 400
//!                     │                 │
//!                     ▼                 ▼
//!              inner service    SubscriptionRegistry
//!              (other routes)     │         │
//!                                 ▼         ▼
//!                             "push", *   error
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gogs_webhook::{server, WebhookConfig, WebhookHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WebhookConfig::new("/webhook", "s3cret");
//!     let handler = WebhookHandler::new(config);
//!
//!     handler.on("push", |event| {
//!         println!("{} pushed to {:?}", event.id, event.repository());
//!     });
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, server::router(handler)).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod metrics;
pub mod registry;
pub mod request;
pub mod server;
pub mod service;
pub mod signature;

// Re-exports for convenience
pub use config::{EventFilter, WebhookConfig};
pub use error::{ConfigError, Result, WebhookError};
pub use event::WebhookEvent;
pub use handler::{Next, Outcome, WebhookHandler, WebhookResponse};
pub use metrics::{MetricsSnapshot, WebhookMetrics};
pub use registry::{Notification, SubscriptionId, SubscriptionRegistry, Topic};
pub use request::RequestInfo;
pub use service::{WebhookLayer, WebhookService};
pub use signature::Signer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
