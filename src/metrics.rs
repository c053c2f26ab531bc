//! Delivery counters for the webhook handler
//!
//! Every handler owns one [`WebhookMetrics`]. Each request that reaches the
//! handler lands in exactly one bucket: passed through, delivered or
//! rejected.
//!
//! # Example
//!
//! ```rust
//! use gogs_webhook::metrics::WebhookMetrics;
//!
//! let metrics = WebhookMetrics::new();
//! metrics.record_delivery("push");
//! metrics.record_rejection("signature_mismatch");
//!
//! let output = metrics.to_prometheus_format();
//! assert!(output.contains("gogs_webhook_deliveries_total{event=\"push\"} 1"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Atomic request counters with per-event and per-error breakdowns
#[derive(Debug, Default)]
pub struct WebhookMetrics {
    /// Requests that did not match the configured path or method
    pub passed_through_total: AtomicU64,
    /// Requests that were verified and published
    pub delivered_total: AtomicU64,
    /// Requests answered with a 400
    pub rejected_total: AtomicU64,

    /// Deliveries broken down by event name
    deliveries_by_event: RwLock<HashMap<String, u64>>,
    /// Rejections broken down by error kind
    rejections_by_kind: RwLock<HashMap<&'static str, u64>>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// All requests seen
    pub requests: u64,
    /// Passed to the next handler
    pub passed_through: u64,
    /// Verified and published
    pub delivered: u64,
    /// Answered with a 400
    pub rejected: u64,
    /// Deliveries per event name
    pub deliveries_by_event: BTreeMap<String, u64>,
    /// Rejections per error kind
    pub rejections_by_kind: BTreeMap<String, u64>,
}

impl WebhookMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request that was not ours
    pub fn record_pass_through(&self) {
        self.passed_through_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a verified delivery
    pub fn record_delivery(&self, event: &str) {
        self.delivered_total.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut breakdown) = self.deliveries_by_event.write() {
            *breakdown.entry(event.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a rejected request
    pub fn record_rejection(&self, kind: &'static str) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut breakdown) = self.rejections_by_kind.write() {
            *breakdown.entry(kind).or_insert(0) += 1;
        }
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let passed_through = self.passed_through_total.load(Ordering::Relaxed);
        let delivered = self.delivered_total.load(Ordering::Relaxed);
        let rejected = self.rejected_total.load(Ordering::Relaxed);

        let deliveries_by_event = self
            .deliveries_by_event
            .read()
            .map(|breakdown| breakdown.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        let rejections_by_kind = self
            .rejections_by_kind
            .read()
            .map(|breakdown| breakdown.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        MetricsSnapshot {
            requests: passed_through + delivered + rejected,
            passed_through,
            delivered,
            rejected,
            deliveries_by_event,
            rejections_by_kind,
        }
    }

    /// Convert metrics to Prometheus text format
    pub fn to_prometheus_format(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        output.push_str(&format!(
            "gogs_webhook_requests_total {}\n",
            snapshot.requests
        ));
        output.push_str(&format!(
            "gogs_webhook_passed_through_total {}\n",
            snapshot.passed_through
        ));
        output.push_str(&format!(
            "gogs_webhook_delivered_total {}\n",
            snapshot.delivered
        ));
        output.push_str(&format!(
            "gogs_webhook_rejected_total {}\n",
            snapshot.rejected
        ));

        for (event, count) in &snapshot.deliveries_by_event {
            output.push_str(&format!(
                "gogs_webhook_deliveries_total{{event=\"{}\"}} {}\n",
                escape_label(event),
                count
            ));
        }
        for (kind, count) in &snapshot.rejections_by_kind {
            output.push_str(&format!(
                "gogs_webhook_rejections_total{{kind=\"{}\"}} {}\n",
                kind, count
            ));
        }

        output
    }
}

/// Escape a label value taken from a request header
fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = WebhookMetrics::new();

        metrics.record_pass_through();
        metrics.record_delivery("push");
        metrics.record_delivery("push");
        metrics.record_delivery("create");
        metrics.record_rejection("missing_header");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 5);
        assert_eq!(snapshot.passed_through, 1);
        assert_eq!(snapshot.delivered, 3);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.deliveries_by_event.get("push"), Some(&2));
        assert_eq!(snapshot.rejections_by_kind.get("missing_header"), Some(&1));
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = WebhookMetrics::new();
        metrics.record_delivery("push");
        metrics.record_rejection("signature_mismatch");

        let output = metrics.to_prometheus_format();
        assert!(output.contains("gogs_webhook_requests_total 2\n"));
        assert!(output.contains("gogs_webhook_delivered_total 1\n"));
        assert!(output.contains("gogs_webhook_rejections_total{kind=\"signature_mismatch\"} 1\n"));
    }

    #[test]
    fn test_label_escaping() {
        assert_eq!(escape_label("a\"b"), "a\\\"b");
        assert_eq!(escape_label("plain"), "plain");
    }
}
