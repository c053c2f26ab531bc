//! Webhook request handler
//!
//! [`WebhookHandler`] is the one value an application holds: it validates
//! and answers requests, and it owns the subscription registry that
//! delivered events are published to.
//!
//! # Pipeline
//!
//! ```text
//! Request ─▶ path + POST? ──no──▶ pass through (no response written)
//!                │
//!               yes
//!                ▼
//!         delivery headers ──missing / filtered──┐
//!                │                                │
//!                ▼                                │
//!         read whole body ──stream error─────────┤
//!                │                                │
//!                ▼                                │
//!         verify signature ──mismatch────────────┤
//!                │                                │
//!                ▼                                ▼
//!         parse JSON ──invalid──────────────▶ 400 {"error": ...}
//!                │                            error topic + callback
//!                ▼
//!         200 {"ok":true}
//!         publish <event>, then *
//! ```
//!
//! Exactly one response is produced per handled request: the `respond`
//! closure is `FnOnce` and every terminal path calls it once.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::WebhookConfig;
use crate::error::{ConfigError, WebhookError};
use crate::event::WebhookEvent;
use crate::metrics::WebhookMetrics;
use crate::registry::{SubscriptionId, SubscriptionRegistry, Topic};
use crate::request::{DeliveryHeaders, RequestInfo};
use crate::signature::Signer;

/// Response type written by the handler
pub type WebhookResponse = Response<Full<Bytes>>;

/// Fixed success body
pub const SUCCESS_BODY: &str = r#"{"ok":true}"#;

/// Result of running the pipeline, before anything is written or published
#[derive(Debug)]
pub enum Outcome<B> {
    /// Not ours; the untouched request is handed back
    PassThrough(Request<B>),
    /// Verified and decoded
    Accepted(WebhookEvent),
    /// Terminal failure
    Rejected {
        /// Why
        error: WebhookError,
        /// Metadata of the rejected request
        request: RequestInfo,
    },
}

/// What the completion callback of [`WebhookHandler::handle`] receives
#[derive(Debug)]
pub enum Next<B> {
    /// The request did not match; continue with the next handler
    PassThrough(Request<B>),
    /// The request was rejected and a 400 has been written
    Error(WebhookError),
}

struct Inner {
    config: WebhookConfig,
    signer: Signer,
    registry: SubscriptionRegistry,
    metrics: WebhookMetrics,
}

/// Verifying, publishing webhook handler
///
/// Cloning is cheap and every clone shares the same registry and metrics.
///
/// ```rust
/// use gogs_webhook::{WebhookConfig, WebhookHandler};
///
/// let handler = WebhookHandler::new(WebhookConfig::new("/webhook", "s3cret"));
/// handler.on("push", |event| {
///     println!("push to {:?}", event.repository());
/// });
/// handler.on_error(|error, request| {
///     eprintln!("rejected {}: {}", request.path, error);
/// });
/// ```
#[derive(Clone)]
pub struct WebhookHandler {
    inner: Arc<Inner>,
}

impl WebhookHandler {
    /// Create a handler from a validated configuration
    pub fn new(config: WebhookConfig) -> Self {
        if config.secret().is_empty() {
            warn!(path = %config.path(), "Webhook secret is empty");
        }

        let signer = Signer::new(config.secret());
        Self {
            inner: Arc::new(Inner {
                config,
                signer,
                registry: SubscriptionRegistry::new(),
                metrics: WebhookMetrics::new(),
            }),
        }
    }

    /// Create a handler from untyped options, failing on malformed input
    pub fn from_value(options: Value) -> Result<Self, ConfigError> {
        WebhookConfig::from_value(options).map(Self::new)
    }

    /// The handler's configuration
    pub fn config(&self) -> &WebhookConfig {
        &self.inner.config
    }

    /// The subscription registry events are published to
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// Request counters
    pub fn metrics(&self) -> &WebhookMetrics {
        &self.inner.metrics
    }

    /// Lowercase hex HMAC-SHA256 of `data` under the configured secret
    pub fn sign(&self, data: &[u8]) -> String {
        self.inner.signer.sign(data)
    }

    /// Constant-time check of `signature` against `data`
    pub fn verify(&self, signature: &str, data: &[u8]) -> bool {
        self.inner.signer.verify(signature, data)
    }

    /// Listen for one event name (`*` for all)
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&WebhookEvent) + Send + Sync + 'static,
    {
        self.inner.registry.on(event, listener)
    }

    /// Listen for every delivered event
    pub fn on_any<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&WebhookEvent) + Send + Sync + 'static,
    {
        self.inner.registry.on_any(listener)
    }

    /// Listen for rejected requests
    pub fn on_error<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&WebhookError, &RequestInfo) + Send + Sync + 'static,
    {
        self.inner.registry.on_error(listener)
    }

    /// Remove a listener
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    /// Number of listeners on `topic`
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.inner.registry.listener_count(topic)
    }

    /// Whether this handler answers `req` (exact path, query ignored, POST)
    pub fn matches<B>(&self, req: &Request<B>) -> bool {
        req.method() == Method::POST && req.uri().path() == self.inner.config.path()
    }

    /// Run the pipeline without writing or publishing anything.
    ///
    /// The body is only read once the delivery headers have passed.
    pub async fn process<B>(&self, req: Request<B>) -> Outcome<B>
    where
        B: Body,
        B::Error: Display,
    {
        if !self.matches(&req) {
            return Outcome::PassThrough(req);
        }

        let (parts, body) = req.into_parts();
        let request = RequestInfo::new(&parts.method, &parts.uri, &parts.headers);

        match self.authenticate(&request, body).await {
            Ok(event) => Outcome::Accepted(event),
            Err(error) => Outcome::Rejected { error, request },
        }
    }

    async fn authenticate<B>(
        &self,
        request: &RequestInfo,
        body: B,
    ) -> Result<WebhookEvent, WebhookError>
    where
        B: Body,
        B::Error: Display,
    {
        let delivery = DeliveryHeaders::extract(&request.headers, self.inner.config.events())?;

        let body = body
            .collect()
            .await
            .map_err(|e| WebhookError::BodyRead(e.to_string()))?
            .to_bytes();

        if !self.inner.signer.verify(&delivery.signature, &body) {
            return Err(WebhookError::SignatureMismatch);
        }

        let payload: Value = serde_json::from_slice(&body)
            .map_err(|e| WebhookError::PayloadParse(e.to_string()))?;

        Ok(WebhookEvent::new(delivery, payload, request))
    }

    /// Handle one request.
    ///
    /// - not ours: `next(Next::PassThrough(req))`, nothing written
    /// - rejected: 400 written, error published, `next(Next::Error(err))`
    /// - delivered: 200 written, event published, `next` not called
    ///
    /// `respond` is the transport's write capability and is called at most
    /// once.
    pub async fn handle<B, W, N>(&self, req: Request<B>, respond: W, next: N)
    where
        B: Body,
        B::Error: Display,
        W: FnOnce(WebhookResponse),
        N: FnOnce(Next<B>),
    {
        match self.process(req).await {
            Outcome::PassThrough(req) => next(Next::PassThrough(self.pass_through(req))),
            Outcome::Accepted(event) => self.deliver(event, respond),
            Outcome::Rejected { error, request } => {
                self.reject(&error, &request, respond);
                next(Next::Error(error));
            }
        }
    }

    pub(crate) fn pass_through<B>(&self, req: Request<B>) -> Request<B> {
        debug!(method = %req.method(), path = %req.uri().path(), "Passing request through");
        self.inner.metrics.record_pass_through();
        req
    }

    /// Write the success response, then publish
    pub(crate) fn deliver<T>(
        &self,
        event: WebhookEvent,
        respond: impl FnOnce(WebhookResponse) -> T,
    ) -> T {
        info!(
            event = %event.event,
            delivery = %event.id,
            "Webhook delivery verified"
        );
        self.inner.metrics.record_delivery(&event.event);

        let written = respond(success_response());
        self.inner.registry.publish_event(&event);
        written
    }

    /// Write the error response, then publish on the error topic
    pub(crate) fn reject<T>(
        &self,
        error: &WebhookError,
        request: &RequestInfo,
        respond: impl FnOnce(WebhookResponse) -> T,
    ) -> T {
        warn!(
            kind = error.kind(),
            error = %error,
            path = %request.path,
            "Webhook delivery rejected"
        );
        self.inner.metrics.record_rejection(error.kind());

        let written = respond(error_response(error));
        self.inner.registry.publish_error(error, request);
        written
    }
}

impl std::fmt::Debug for WebhookHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookHandler")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

/// `200 {"ok":true}`
pub fn success_response() -> WebhookResponse {
    json_response(StatusCode::OK, Bytes::from_static(SUCCESS_BODY.as_bytes()))
}

/// `400 {"error": "<message>"}`
pub fn error_response(error: &WebhookError) -> WebhookResponse {
    let body = serde_json::json!({ "error": error.to_string() }).to_string();
    json_response(error.status_code(), Bytes::from(body))
}

fn json_response(status: StatusCode, body: Bytes) -> WebhookResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
