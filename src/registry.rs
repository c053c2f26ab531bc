//! In-process subscription registry
//!
//! Maps a [`Topic`] to the listeners subscribed to it, in subscription
//! order. Publication is synchronous: each listener runs on the caller's
//! task before `publish_*` returns.
//!
//! A delivered event is published to its event-name topic first, then to
//! [`Topic::Any`]. Request failures go to [`Topic::Error`].
//!
//! # Listener panics
//!
//! Listeners are not isolated. A panicking listener unwinds out of the
//! publish call, and the listeners after it do not run for that
//! publication. Catch inside the listener if that matters.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::WILDCARD;
use crate::error::WebhookError;
use crate::event::WebhookEvent;
use crate::request::RequestInfo;

/// Subscription topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Deliveries with exactly this event name
    Event(String),
    /// Every delivered event
    Any,
    /// Request failures
    Error,
}

impl Topic {
    /// Topic for an event name; `*` maps to [`Topic::Any`]
    pub fn event(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == WILDCARD {
            Self::Any
        } else {
            Self::Event(name)
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(name) => f.write_str(name),
            Self::Any => f.write_str(WILDCARD),
            Self::Error => f.write_str("error"),
        }
    }
}

/// What a listener receives
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    /// A verified delivery
    Event(&'a WebhookEvent),
    /// A rejected request
    Error {
        /// Why it was rejected
        error: &'a WebhookError,
        /// The request that was rejected
        request: &'a RequestInfo,
    },
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Notification<'_>) + Send + Sync>;

/// Topic to listener mapping
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    topics: RwLock<HashMap<Topic, Vec<(SubscriptionId, Listener)>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw listener on `topic`
    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> SubscriptionId
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(topic = %topic, "New webhook subscription");

        self.topics
            .write()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Listen for deliveries of one event name (`*` listens for all)
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&WebhookEvent) + Send + Sync + 'static,
    {
        self.subscribe(Topic::event(event), move |notification| {
            if let Notification::Event(event) = notification {
                listener(event);
            }
        })
    }

    /// Listen for every delivery
    pub fn on_any<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&WebhookEvent) + Send + Sync + 'static,
    {
        self.on(WILDCARD, listener)
    }

    /// Listen for rejected requests
    pub fn on_error<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&WebhookError, &RequestInfo) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Error, move |notification| {
            if let Notification::Error { error, request } = notification {
                listener(error, request);
            }
        })
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let mut removed = false;

        topics.retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|(listener_id, _)| *listener_id != id);
            removed |= listeners.len() != before;
            !listeners.is_empty()
        });

        removed
    }

    /// Number of listeners on `topic`
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    /// Publish a delivery: event-name listeners, then wildcard listeners.
    ///
    /// An event literally named `*` resolves to the wildcard topic for the
    /// first pass as well, so wildcard listeners run twice for it.
    ///
    /// Returns how many listeners ran.
    pub fn publish_event(&self, event: &WebhookEvent) -> usize {
        let notification = Notification::Event(event);
        let specific = self.notify(&Topic::event(event.event.as_str()), &notification);
        let wildcard = self.notify(&Topic::Any, &notification);
        specific + wildcard
    }

    /// Publish a rejected request on the error topic.
    ///
    /// Returns how many listeners ran.
    pub fn publish_error(&self, error: &WebhookError, request: &RequestInfo) -> usize {
        self.notify(&Topic::Error, &Notification::Error { error, request })
    }

    fn notify(&self, topic: &Topic, notification: &Notification<'_>) -> usize {
        // Snapshot so listeners may (un)subscribe without deadlocking
        let listeners: Vec<Listener> = match self.topics.read().get(topic) {
            Some(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };

        for listener in &listeners {
            listener(notification);
        }
        listeners.len()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.read();
        let mut counts: Vec<(String, usize)> = topics
            .iter()
            .map(|(topic, listeners)| (topic.to_string(), listeners.len()))
            .collect();
        counts.sort();
        f.debug_struct("SubscriptionRegistry")
            .field("topics", &counts)
            .finish()
    }
}
