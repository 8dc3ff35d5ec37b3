//! # Error Taxonomy
//!
//! Every failure the client can surface is one variant of [`ShodanError`].
//! The variants line up with how callers are expected to react:
//!
//! - validation and authentication problems are never retried,
//! - quota rejections are final for the call that hit them,
//! - [`ShodanError::TransientNetwork`] is the only retryable category, and it is
//!   only retried automatically inside a stream subscription,
//! - [`ShodanError::MalformedRecord`] affects a single record and never aborts a
//!   stream.

use serde_json::Value;
use thiserror::Error;

/// Result alias used across the crate.
pub type ShodanResult<T> = Result<T, ShodanError>;

/// Errors raised while building, executing or decoding Shodan calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShodanError {
    /// A caller-supplied value is out of range or a required field is missing.
    /// Detected before any network call.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter that was rejected.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The API key was rejected by the service.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The service throttled the request.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The account has no query credits left for this call.
    #[error("insufficient query credits: {0}")]
    InsufficientCredits(String),

    /// Connection reset, timeout or a 5xx answer.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// One JSON value could not be decoded into the expected record kind.
    #[error("malformed {kind} record: {reason}")]
    MalformedRecord {
        /// Record kind that was expected.
        kind: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Reconnect attempts for a stream subscription ran out.
    #[error("connection lost after {attempts} reconnect attempts: {last_error}")]
    ConnectionLost {
        /// Reconnect attempts made since the last successful delivery.
        attempts: u32,
        /// The failure that ended the last attempt.
        last_error: String,
    },

    /// The requested resource or stream does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP answer.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Client configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ShodanError {
    /// Shorthand for [`ShodanError::InvalidParameter`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ShodanError::MalformedRecord`].
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether a stream subscription should reconnect after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

/// Maps a non-success HTTP status and its body onto the error taxonomy.
///
/// The service answers errors as `{"error": "..."}`; that message is used when
/// present, otherwise the trimmed body.
pub fn classify_status(status: u16, body: &str) -> ShodanError {
    let message = error_message(body)
        .unwrap_or_else(|| format!("service answered with status {status}"));
    let lowered = message.to_ascii_lowercase();

    if (400..500).contains(&status) && lowered.contains("insufficient") && lowered.contains("credit")
    {
        return ShodanError::InsufficientCredits(message);
    }

    match status {
        400 => ShodanError::invalid("request", message),
        401 | 403 => ShodanError::AuthenticationFailed(message),
        402 => ShodanError::InsufficientCredits(message),
        404 => ShodanError::NotFound(message),
        429 => ShodanError::RateLimitExceeded(message),
        408 | 500..=599 => ShodanError::TransientNetwork(format!("HTTP {status}: {message}")),
        _ => ShodanError::Http { status, message },
    }
}

fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| Some(trimmed.to_owned())),
        _ => Some(trimmed.to_owned()),
    }
}
