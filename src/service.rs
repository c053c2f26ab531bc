//! Tower middleware
//!
//! [`WebhookLayer`] puts a [`WebhookHandler`] in front of any HTTP service.
//! Requests for the webhook path are answered by the handler; everything
//! else reaches the inner service untouched.
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::{http::StatusCode, routing::get, Router};
//! use gogs_webhook::{WebhookConfig, WebhookHandler, WebhookLayer};
//!
//! let handler = WebhookHandler::new(WebhookConfig::new("/webhook", "s3cret"));
//! handler.on("push", |event| println!("{}", event.id));
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .fallback(|| async { StatusCode::NOT_FOUND })
//!     .layer(WebhookLayer::new(handler));
//! ```

use std::fmt::Display;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use http_body_util::{Either, Full};
use tower::{Layer, Service};

use crate::handler::{Outcome, WebhookHandler};

/// Response body of [`WebhookService`]: the handler's own JSON, or the inner
/// service's body
pub type ServiceBody<B> = Either<Full<Bytes>, B>;

/// Layer that applies [`WebhookService`]
#[derive(Debug, Clone)]
pub struct WebhookLayer {
    handler: WebhookHandler,
}

impl WebhookLayer {
    /// Wrap services with `handler`
    pub fn new(handler: WebhookHandler) -> Self {
        Self { handler }
    }
}

impl<S> Layer<S> for WebhookLayer {
    type Service = WebhookService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        WebhookService {
            handler: self.handler.clone(),
            inner,
        }
    }
}

/// Middleware answering webhook deliveries and forwarding the rest
#[derive(Debug, Clone)]
pub struct WebhookService<S> {
    handler: WebhookHandler,
    inner: S,
}

impl<S> WebhookService<S> {
    /// The handler answering deliveries
    pub fn handler(&self) -> &WebhookHandler {
        &self.handler
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for WebhookService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: 'static,
    ReqBody: Body + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: Display,
    ResBody: 'static,
{
    type Response = Response<ServiceBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Keep the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let handler = self.handler.clone();

        Box::pin(async move {
            match handler.process(req).await {
                Outcome::PassThrough(req) => {
                    let req = handler.pass_through(req);
                    let response = inner.call(req).await?;
                    Ok(response.map(Either::Right))
                }
                Outcome::Accepted(event) => {
                    Ok(handler.deliver(event, |response| response.map(Either::Left)))
                }
                Outcome::Rejected { error, request } => {
                    Ok(handler.reject(&error, &request, |response| response.map(Either::Left)))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookConfig;
    use crate::request::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tower::util::BoxCloneService;
    use tower::{service_fn, ServiceExt};

    type Inner = BoxCloneService<Request<Full<Bytes>>, Response<Full<Bytes>>, Infallible>;

    fn stack(inner_calls: Arc<AtomicU32>) -> (WebhookHandler, WebhookService<Inner>) {
        let handler = WebhookHandler::new(WebhookConfig::test_config());
        let inner = service_fn(move |_req: Request<Full<Bytes>>| {
            let calls = Arc::clone(&inner_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"inner"))))
            }
        });
        let service = WebhookLayer::new(handler.clone()).layer(BoxCloneService::new(inner));
        (handler, service)
    }

    #[tokio::test]
    async fn test_unmatched_request_reaches_inner_service() {
        let calls = Arc::new(AtomicU32::new(0));
        let (_, service) = stack(Arc::clone(&calls));

        let req = Request::builder()
            .method(Method::GET)
            .uri("/webhook")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = service.oneshot(req).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"inner");
    }

    #[tokio::test]
    async fn test_delivery_answered_by_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let (handler, service) = stack(Arc::clone(&calls));
        let received = Arc::new(AtomicU32::new(0));
        let r = Arc::clone(&received);
        handler.on("push", move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        let body = r#"{"after":"abc"}"#;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header(SIGNATURE_HEADER, handler.sign(body.as_bytes()))
            .header(EVENT_HEADER, "push")
            .header(DELIVERY_HEADER, "d-42")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        let response = service.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_answered_by_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let (_, service) = stack(Arc::clone(&calls));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        let response = service.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
