//! Error types for the Gogs webhook handler
//!
//! Two families, mirroring the two places things can go wrong:
//!
//! - [`ConfigError`] is raised once, while building a handler. It is fatal:
//!   no handler exists until the options are valid.
//! - [`WebhookError`] is produced per request. It never escapes the request
//!   entry point; it becomes a 400 response, an error-topic notification and
//!   a completion callback instead.

use http::StatusCode;
use thiserror::Error;

/// Construction-time option errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Options were not a structured object
    #[error("must provide an options object")]
    NotAnObject,

    /// `path` missing or not a string
    #[error("must provide a 'path' option")]
    MissingPath,

    /// `secret` missing or not a string
    #[error("must provide a 'secret' option")]
    MissingSecret,

    /// `events` was neither a name nor a list of names
    #[error("'events' must be a string or an array of strings")]
    InvalidEvents,

    /// `events` was an explicitly empty list
    #[error("'events' must name at least one event")]
    EmptyEvents,

    /// Required environment variable not set
    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),
}

/// Per-request terminal failures
///
/// The `Display` text is exactly what the sender sees in the
/// `{"error": "..."}` response body. None of the variants carry the secret or
/// the locally computed signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// One of the three delivery headers is absent
    #[error("No {header} found on request")]
    MissingHeader {
        /// Canonical header name, e.g. `X-Gogs-Signature`
        header: &'static str,
    },

    /// The event name is not in the configured allow-list
    #[error("X-Gogs-Event is not acceptable")]
    EventRejected {
        /// The rejected event name
        event: String,
    },

    /// The request body stream failed before it was fully read
    #[error("{0}")]
    BodyRead(String),

    /// The supplied signature does not match the body
    #[error("X-Gogs-Signature does not match blob signature")]
    SignatureMismatch,

    /// The body is not valid JSON
    #[error("{0}")]
    PayloadParse(String),
}

impl WebhookError {
    /// Short machine-readable name, used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader { .. } => "missing_header",
            Self::EventRejected { .. } => "event_rejected",
            Self::BodyRead(_) => "body_read",
            Self::SignatureMismatch => "signature_mismatch",
            Self::PayloadParse(_) => "payload_parse",
        }
    }

    /// HTTP status written for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// Result type alias for per-request operations
pub type Result<T> = std::result::Result<T, WebhookError>;
