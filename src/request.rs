//! Incoming request view and delivery header validation

use http::header::HOST;
use http::{HeaderMap, HeaderName, Method, Uri};

use crate::config::EventFilter;
use crate::error::{Result, WebhookError};

/// HMAC-SHA256 hex digest of the body
pub const SIGNATURE_HEADER: HeaderName = HeaderName::from_static("x-gogs-signature");

/// Event name, e.g. `push`
pub const EVENT_HEADER: HeaderName = HeaderName::from_static("x-gogs-event");

/// Sender-assigned delivery identifier
pub const DELIVERY_HEADER: HeaderName = HeaderName::from_static("x-gogs-delivery");

/// Scheme reported by a TLS-terminating proxy
pub const FORWARDED_PROTO_HEADER: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Owned snapshot of the request metadata
///
/// Handed to error-topic subscribers alongside the error, and used to fill
/// the metadata fields of delivered events.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method
    pub method: Method,
    /// Path component, query stripped
    pub path: String,
    /// Path plus query, as the sender requested it
    pub url: String,
    /// `Host` header, if present
    pub host: Option<String>,
    /// Scheme: absolute-URI scheme, else `X-Forwarded-Proto`
    pub protocol: Option<String>,
    /// All request headers
    pub headers: HeaderMap,
}

impl RequestInfo {
    /// Capture the metadata of a request
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        let protocol = uri.scheme_str().map(str::to_string).or_else(|| {
            header_str(headers, &FORWARDED_PROTO_HEADER)
                .and_then(|value| value.split(',').next())
                .map(|proto| proto.trim().to_ascii_lowercase())
        });

        Self {
            method: method.clone(),
            path: uri.path().to_string(),
            url,
            host: header_str(headers, &HOST).map(str::to_string),
            protocol,
            headers: headers.clone(),
        }
    }

    /// Capture the metadata of a full request
    pub fn from_request<B>(req: &http::Request<B>) -> Self {
        Self::new(req.method(), req.uri(), req.headers())
    }
}

/// The three delivery headers of a request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryHeaders {
    /// Candidate signature from `X-Gogs-Signature`
    pub signature: String,
    /// Event name from `X-Gogs-Event`
    pub event: String,
    /// Delivery id from `X-Gogs-Delivery`
    pub id: String,
}

impl DeliveryHeaders {
    /// Pull the delivery headers out of `headers` and apply the event filter.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// signature, event, delivery id, then event acceptability.
    pub fn extract(headers: &HeaderMap, events: &EventFilter) -> Result<Self> {
        let signature = header_str(headers, &SIGNATURE_HEADER).ok_or(
            WebhookError::MissingHeader {
                header: "X-Gogs-Signature",
            },
        )?;
        let event = header_str(headers, &EVENT_HEADER).ok_or(WebhookError::MissingHeader {
            header: "X-Gogs-Event",
        })?;
        let id = header_str(headers, &DELIVERY_HEADER).ok_or(WebhookError::MissingHeader {
            header: "X-Gogs-Delivery",
        })?;

        if !events.accepts(event) {
            return Err(WebhookError::EventRejected {
                event: event.to_string(),
            });
        }

        Ok(Self {
            signature: signature.to_string(),
            event: event.to_string(),
            id: id.to_string(),
        })
    }
}

/// Header value as text; empty or non-ASCII values count as absent
fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}
