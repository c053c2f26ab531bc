//! Delivered event type

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::{DeliveryHeaders, RequestInfo};

/// An authenticated, decoded webhook delivery
///
/// Built once per successful request and handed to subscribers by
/// reference; the handler keeps nothing after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event name from `X-Gogs-Event`, e.g. `push`
    pub event: String,

    /// Delivery id from `X-Gogs-Delivery`, passed through unmodified
    pub id: String,

    /// Decoded JSON body
    pub payload: Value,

    /// Request scheme, when known
    #[serde(default)]
    pub protocol: Option<String>,

    /// `Host` header of the request
    #[serde(default)]
    pub host: Option<String>,

    /// Path and query the sender posted to
    pub url: String,
}

impl WebhookEvent {
    pub(crate) fn new(delivery: DeliveryHeaders, payload: Value, request: &RequestInfo) -> Self {
        Self {
            event: delivery.event,
            id: delivery.id,
            payload,
            protocol: request.protocol.clone(),
            host: request.host.clone(),
            url: request.url.clone(),
        }
    }

    /// `repository.full_name` from the payload, e.g. `gogs/gogs`
    pub fn repository(&self) -> Option<&str> {
        self.payload
            .pointer("/repository/full_name")
            .and_then(Value::as_str)
    }

    /// `sender.username` from the payload
    pub fn sender(&self) -> Option<&str> {
        self.payload
            .pointer("/sender/username")
            .and_then(Value::as_str)
    }
}
