use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Top-level error type for the `fmc-api` crate.
///
/// Session expiry (401) and throttling (429) never show up here unless the
/// retry ceiling in [`RetryPolicy`](crate::RetryPolicy) is exceeded; the
/// executor absorbs them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected the credentials (HTTP 401 on the token endpoint).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Login returned something other than 204 / 401, or a 204 without
    /// the token headers.
    #[error("Login failed (HTTP {status}): {body}")]
    LoginFailed { status: u16, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, TLS, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Application ─────────────────────────────────────────────────
    /// Non-expected status from the FMC API.
    ///
    /// `envelope` is populated when the body decoded as an FMC error
    /// envelope; otherwise `body` carries the raw response text.
    #[error("FMC API error (HTTP {status}): {}", describe_api(.envelope.as_ref(), .body))]
    Api {
        status: u16,
        envelope: Option<ErrorDetail>,
        body: String,
    },

    /// The expected status arrived but the body did not decode into the
    /// caller's type.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Recovery ────────────────────────────────────────────────────
    /// Session-expiry or throttling recovery gave up after the configured
    /// number of retries.
    #[error("Giving up after {attempts} retries: {reason}")]
    RetriesExhausted { reason: RetryReason, attempts: u32 },

    /// The caller's cancellation token fired while the request was waiting
    /// or in flight.
    #[error("Request cancelled")]
    Cancelled,

    // ── Configuration ───────────────────────────────────────────────
    /// Invalid client configuration or request descriptor.
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

/// Why the executor kept retrying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The server kept answering 401 after re-login.
    Unauthorized,
    /// The server kept answering 429.
    TooManyRequests,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("repeated authentication failure (HTTP 401)"),
            Self::TooManyRequests => f.write_str("repeated throttling (HTTP 429)"),
        }
    }
}

impl Error {
    /// Returns `true` when the credentials themselves were rejected, either
    /// at login or by a 401 that survived every re-login.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. }
                | Self::RetriesExhausted {
                    reason: RetryReason::Unauthorized,
                    ..
                }
        )
    }

    /// Returns `true` if this is a transient error worth retrying at a
    /// higher level.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RetriesExhausted {
                reason: RetryReason::TooManyRequests,
                ..
            } => true,
            Self::Api { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Returns `true` for a 404 from the API.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::LoginFailed { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// ── Error envelope ──────────────────────────────────────────────────

/// Wire shape of an FMC error body:
/// `{"error": {"category", "severity", "messages": [{"description"}]}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: ErrorDetail,
}

/// The `error` object of an FMC error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub messages: Vec<ErrorMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub description: String,
}

impl ErrorDetail {
    /// Message descriptions joined with `"; "`.
    pub fn descriptions(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.description.as_str())
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Error {
    /// Classify a non-expected response body.
    pub(crate) fn from_api_body(status: u16, body: String) -> Self {
        let envelope = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .map(|e| e.error);
        Self::Api {
            status,
            envelope,
            body,
        }
    }
}

fn describe_api(envelope: Option<&ErrorDetail>, body: &str) -> String {
    match envelope {
        Some(detail) => format!(
            "[{}/{}] {}",
            detail.category,
            detail.severity,
            detail.descriptions()
        ),
        None if body.is_empty() => "(empty body)".into(),
        None => body.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_fields_are_exposed() {
        let body = r#"{"error":{"category":"Fatal","severity":"ERROR","messages":[{"description":"boom"}]}}"#;
        let err = Error::from_api_body(500, body.into());

        let Error::Api {
            status, envelope, ..
        } = &err
        else {
            panic!("expected Api error, got {err:?}");
        };
        assert_eq!(*status, 500);
        let detail = envelope.as_ref().unwrap();
        assert_eq!(detail.category, "Fatal");
        assert_eq!(detail.severity, "ERROR");
        assert_eq!(detail.descriptions(), "boom");

        let text = err.to_string();
        assert!(text.contains("Fatal"), "{text}");
        assert!(text.contains("boom"), "{text}");
    }

    #[test]
    fn malformed_body_falls_back_to_raw_text() {
        let err = Error::from_api_body(500, "oops".into());
        assert!(matches!(err, Error::Api { envelope: None, .. }));
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn json_without_error_key_keeps_raw_body() {
        let err = Error::from_api_body(400, r#"{"message":"nope"}"#.into());
        assert!(matches!(err, Error::Api { envelope: None, .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn multiple_messages_are_joined() {
        let body = r#"{"error":{"category":"FRAMEWORK","severity":"ERROR","messages":[{"description":"a"},{"description":"b"}]}}"#;
        let err = Error::from_api_body(422, body.into());
        assert!(err.to_string().contains("a; b"));
    }

    #[test]
    fn retry_exhaustion_classification() {
        let auth = Error::RetriesExhausted {
            reason: RetryReason::Unauthorized,
            attempts: 3,
        };
        assert!(auth.is_auth_failure());
        assert!(!auth.is_transient());

        let throttled = Error::RetriesExhausted {
            reason: RetryReason::TooManyRequests,
            attempts: 8,
        };
        assert!(throttled.is_transient());
        assert!(throttled.to_string().contains("429"));
    }
}
