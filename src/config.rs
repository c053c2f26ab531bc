//! Handler configuration
//!
//! A [`WebhookConfig`] is built once and never changes afterwards. It can be
//! assembled three ways, all of which end in the same normalized shape:
//!
//! - typed: [`WebhookConfig::new`] plus [`WebhookConfig::with_events`]
//! - untyped: [`WebhookConfig::from_value`] for options arriving as JSON
//! - environment: [`WebhookConfig::from_env`]
//!
//! The event allow-list is normalized into an [`EventFilter`] up front, so
//! the request path only ever branches on "accept all" or "accept this set".
//!
//! # Environment Variables
//!
//! - `GOGS_WEBHOOK_PATH` (required): request path to intercept, e.g. `/webhook`
//! - `GOGS_WEBHOOK_SECRET` (required): shared HMAC secret
//! - `GOGS_WEBHOOK_EVENTS` (optional): comma separated event names, `*` for all

use std::collections::BTreeSet;
use std::env;
use std::fmt;

use serde_json::Value;

use crate::error::ConfigError;

/// Topic/filter entry that stands for every event
pub const WILDCARD: &str = "*";

/// Environment variable holding the intercepted path
pub const ENV_PATH: &str = "GOGS_WEBHOOK_PATH";

/// Environment variable holding the shared secret
pub const ENV_SECRET: &str = "GOGS_WEBHOOK_SECRET";

/// Environment variable holding the event allow-list
pub const ENV_EVENTS: &str = "GOGS_WEBHOOK_EVENTS";

/// Normalized event allow-list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Every event name is accepted
    #[default]
    Any,
    /// Only these event names are accepted (never empty, never holds `*`)
    Only(BTreeSet<String>),
}

impl EventFilter {
    /// Build a filter from a list of names.
    ///
    /// A `*` anywhere in the list widens the filter to [`EventFilter::Any`].
    /// An empty list is rejected.
    pub fn from_names<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();

        if names.contains(WILDCARD) {
            return Ok(Self::Any);
        }
        if names.is_empty() {
            return Err(ConfigError::EmptyEvents);
        }
        Ok(Self::Only(names))
    }

    /// Build a filter from a single name (`*` means all)
    pub fn single(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == WILDCARD {
            Self::Any
        } else {
            Self::Only(BTreeSet::from([name]))
        }
    }

    /// Whether deliveries of `event` pass the filter
    pub fn accepts(&self, event: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(names) => names.contains(event),
        }
    }

    fn from_value(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Null => Ok(Self::Any),
            Value::String(name) => Ok(Self::single(name.as_str())),
            Value::Array(items) => {
                let names = items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_owned)
                            .ok_or(ConfigError::InvalidEvents)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::from_names(names)
            }
            _ => Err(ConfigError::InvalidEvents),
        }
    }

    /// Parse a comma separated list such as `push, create`.
    ///
    /// Names are trimmed and blank entries dropped; blank input means all
    /// events.
    pub fn from_list(raw: &str) -> Result<Self, ConfigError> {
        let names: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            return Ok(Self::Any);
        }
        Self::from_names(names)
    }
}

/// Immutable handler configuration
#[derive(Clone)]
pub struct WebhookConfig {
    path: String,
    secret: String,
    events: EventFilter,
}

impl WebhookConfig {
    /// Create a configuration that accepts every event
    pub fn new(path: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            secret: secret.into(),
            events: EventFilter::Any,
        }
    }

    /// Restrict the accepted events
    pub fn with_events(mut self, events: EventFilter) -> Self {
        self.events = events;
        self
    }

    /// Validate untyped options.
    ///
    /// Accepts an object with a string `path`, a string `secret` and an
    /// optional `events` that is either a name or an array of names.
    ///
    /// ```rust
    /// use gogs_webhook::config::{EventFilter, WebhookConfig};
    /// use serde_json::json;
    ///
    /// let config = WebhookConfig::from_value(json!({
    ///     "path": "/webhook",
    ///     "secret": "hunter2",
    ///     "events": ["push", "issues"],
    /// }))
    /// .unwrap();
    /// assert!(config.events().accepts("push"));
    /// assert!(!config.events().accepts("release"));
    ///
    /// assert!(WebhookConfig::from_value(json!("/webhook")).is_err());
    /// ```
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        // `null` is rejected here rather than failing later on `path`
        let Value::Object(options) = value else {
            return Err(ConfigError::NotAnObject);
        };

        let path = options
            .get("path")
            .and_then(Value::as_str)
            .ok_or(ConfigError::MissingPath)?;
        let secret = options
            .get("secret")
            .and_then(Value::as_str)
            .ok_or(ConfigError::MissingSecret)?;
        let events = match options.get("events") {
            Some(value) => EventFilter::from_value(value)?,
            None => EventFilter::Any,
        };

        Ok(Self::new(path, secret).with_events(events))
    }

    /// Load the configuration from `GOGS_WEBHOOK_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnv` if the path or secret is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = env::var(ENV_PATH).map_err(|_| ConfigError::MissingEnv(ENV_PATH))?;
        let secret = env::var(ENV_SECRET).map_err(|_| ConfigError::MissingEnv(ENV_SECRET))?;
        let events = match env::var(ENV_EVENTS) {
            Ok(raw) => EventFilter::from_list(&raw)?,
            Err(_) => EventFilter::Any,
        };

        Ok(Self::new(path, secret).with_events(events))
    }

    /// Create a test configuration (for testing only)
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self::new("/webhook", "test-secret-for-unit-tests-only")
    }

    /// Path intercepted by the handler
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Shared HMAC secret
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Normalized event allow-list
    pub fn events(&self) -> &EventFilter {
        &self.events
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("path", &self.path)
            .field("secret", &"<redacted>")
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_minimal() {
        let config = WebhookConfig::from_value(json!({
            "path": "/webhook",
            "secret": "s3cret",
        }))
        .unwrap();

        assert_eq!(config.path(), "/webhook");
        assert_eq!(config.secret(), "s3cret");
        assert_eq!(config.events(), &EventFilter::Any);
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        for value in [json!(null), json!("/webhook"), json!(42), json!(["/webhook"])] {
            assert_eq!(
                WebhookConfig::from_value(value).unwrap_err(),
                ConfigError::NotAnObject
            );
        }
    }

    #[test]
    fn test_from_value_rejects_bad_path() {
        let missing = WebhookConfig::from_value(json!({ "secret": "s" }));
        assert_eq!(missing.unwrap_err(), ConfigError::MissingPath);

        let numeric = WebhookConfig::from_value(json!({ "path": 1, "secret": "s" }));
        assert_eq!(numeric.unwrap_err(), ConfigError::MissingPath);
    }

    #[test]
    fn test_from_value_rejects_bad_secret() {
        let missing = WebhookConfig::from_value(json!({ "path": "/" }));
        assert_eq!(missing.unwrap_err(), ConfigError::MissingSecret);

        let object = WebhookConfig::from_value(json!({ "path": "/", "secret": {} }));
        assert_eq!(object.unwrap_err(), ConfigError::MissingSecret);
    }

    #[test]
    fn test_path_checked_before_secret() {
        let err = WebhookConfig::from_value(json!({})).unwrap_err();
        assert_eq!(err, ConfigError::MissingPath);
    }

    #[test]
    fn test_events_normalization() {
        let single = WebhookConfig::from_value(json!({
            "path": "/", "secret": "s", "events": "push"
        }))
        .unwrap();
        assert_eq!(single.events(), &EventFilter::single("push"));

        let wildcard = WebhookConfig::from_value(json!({
            "path": "/", "secret": "s", "events": "*"
        }))
        .unwrap();
        assert_eq!(wildcard.events(), &EventFilter::Any);

        let wildcard_in_list = WebhookConfig::from_value(json!({
            "path": "/", "secret": "s", "events": ["push", "*"]
        }))
        .unwrap();
        assert_eq!(wildcard_in_list.events(), &EventFilter::Any);

        let null = WebhookConfig::from_value(json!({
            "path": "/", "secret": "s", "events": null
        }))
        .unwrap();
        assert_eq!(null.events(), &EventFilter::Any);
    }

    #[test]
    fn test_events_invalid_shapes() {
        let numeric = WebhookConfig::from_value(json!({
            "path": "/", "secret": "s", "events": 7
        }));
        assert_eq!(numeric.unwrap_err(), ConfigError::InvalidEvents);

        let mixed = WebhookConfig::from_value(json!({
            "path": "/", "secret": "s", "events": ["push", 7]
        }));
        assert_eq!(mixed.unwrap_err(), ConfigError::InvalidEvents);

        let empty = WebhookConfig::from_value(json!({
            "path": "/", "secret": "s", "events": []
        }));
        assert_eq!(empty.unwrap_err(), ConfigError::EmptyEvents);
    }

    #[test]
    fn test_filter_accepts() {
        let filter = EventFilter::from_names(["push", "issues"]).unwrap();
        assert!(filter.accepts("push"));
        assert!(filter.accepts("issues"));
        assert!(!filter.accepts("release"));
        assert!(!filter.accepts("*"));
        assert!(EventFilter::Any.accepts("anything"));
    }

    #[test]
    fn test_from_list() {
        assert_eq!(EventFilter::from_list("").unwrap(), EventFilter::Any);
        assert_eq!(EventFilter::from_list(" , ").unwrap(), EventFilter::Any);
        assert_eq!(EventFilter::from_list("*").unwrap(), EventFilter::Any);
        assert_eq!(
            EventFilter::from_list("push, issues").unwrap(),
            EventFilter::from_names(["issues", "push"]).unwrap()
        );
        assert_eq!(
            EventFilter::from_list(" push ,create,").unwrap(),
            EventFilter::from_names(["create", "push"]).unwrap()
        );
    }

    #[test]
    fn test_from_env() {
        env::remove_var(ENV_PATH);
        env::remove_var(ENV_SECRET);
        env::remove_var(ENV_EVENTS);
        assert_eq!(
            WebhookConfig::from_env().unwrap_err(),
            ConfigError::MissingEnv(ENV_PATH)
        );

        env::set_var(ENV_PATH, "/hooks/gogs");
        assert_eq!(
            WebhookConfig::from_env().unwrap_err(),
            ConfigError::MissingEnv(ENV_SECRET)
        );

        env::set_var(ENV_SECRET, "from-env");
        env::set_var(ENV_EVENTS, "push,create");
        let config = WebhookConfig::from_env().unwrap();
        assert_eq!(config.path(), "/hooks/gogs");
        assert!(config.events().accepts("create"));
        assert!(!config.events().accepts("issues"));

        env::remove_var(ENV_PATH);
        env::remove_var(ENV_SECRET);
        env::remove_var(ENV_EVENTS);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = WebhookConfig::test_config();
        let debug = format!("{:?}", config);
        assert!(debug.contains("/webhook"));
        assert!(!debug.contains("test-secret-for-unit-tests-only"));
    }
}
