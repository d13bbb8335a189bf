//! Error taxonomy for routing decisions.
//!
//! Adapter failures and validation rejections are internal — they drive
//! fallback to the next candidate and never reach the caller raw. Only
//! [`RouteError::Exhausted`] and [`RouteError::DeadlineExceeded`] are
//! caller-visible.

use serde::Serialize;
use thiserror::Error;

/// Classification of an adapter call failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    Timeout,
    Authentication,
    RateLimited,
    Transport,
    MalformedResponse,
}

impl AdapterErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::Transport => "transport",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl std::fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed adapter call. Always advances the candidate cursor; never
/// retried against the same provider within one request.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Timeout, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Authentication, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::RateLimited, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Transport, message)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::MalformedResponse, message)
    }

    /// Map a reqwest error to the adapter taxonomy
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_decode() {
            Self::malformed_response(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }

    /// Map a non-success HTTP status to the adapter taxonomy
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("status {status}: {body}");
        match status.as_u16() {
            401 | 403 => Self::authentication(message),
            429 => Self::rate_limited(message),
            _ => Self::transport(message),
        }
    }
}

/// Why the validator rejected an otherwise successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoCodeSignal,
    ExplicitErrorMarker,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCodeSignal => "no_code_signal",
            Self::ExplicitErrorMarker => "explicit_error_marker",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one candidate attempt, reported back to the caller on
/// terminal failure
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub provider: String,
    pub reason: AttemptReason,
}

impl Attempt {
    pub fn new(provider: impl Into<String>, reason: AttemptReason) -> Self {
        Self {
            provider: provider.into(),
            reason,
        }
    }
}

/// Reason a candidate did not produce the accepted result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptReason {
    /// Breaker denied the call; no network traffic happened
    BreakerOpen,
    Adapter(AdapterErrorKind),
    Rejected(RejectReason),
}

impl AttemptReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BreakerOpen => "breaker_open",
            Self::Adapter(kind) => kind.as_str(),
            Self::Rejected(reason) => reason.as_str(),
        }
    }
}

impl std::fmt::Display for AttemptReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AttemptReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Terminal failure of a routed request
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// Every configured candidate was denied, failed, or was rejected
    #[error("all providers exhausted after {} attempts", attempts.len())]
    Exhausted { attempts: Vec<Attempt> },
    /// The request-level deadline elapsed before exhaustion completed
    #[error("request deadline exceeded after {} attempts", attempts.len())]
    DeadlineExceeded { attempts: Vec<Attempt> },
}

impl RouteError {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::Exhausted { attempts } | Self::DeadlineExceeded { attempts } => attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(AdapterErrorKind::Timeout.as_str(), "timeout");
        assert_eq!(AdapterErrorKind::RateLimited.as_str(), "rate_limited");
        assert_eq!(
            AdapterErrorKind::MalformedResponse.as_str(),
            "malformed_response"
        );
    }

    #[test]
    fn test_from_status_mapping() {
        use reqwest::StatusCode;
        assert_eq!(
            AdapterError::from_status(StatusCode::UNAUTHORIZED, "bad key").kind,
            AdapterErrorKind::Authentication
        );
        assert_eq!(
            AdapterError::from_status(StatusCode::FORBIDDEN, "").kind,
            AdapterErrorKind::Authentication
        );
        assert_eq!(
            AdapterError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down").kind,
            AdapterErrorKind::RateLimited
        );
        assert_eq!(
            AdapterError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "").kind,
            AdapterErrorKind::Transport
        );
    }

    #[test]
    fn test_attempt_reason_serializes_flat() {
        let attempt = Attempt::new("groq", AttemptReason::Adapter(AdapterErrorKind::RateLimited));
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["provider"], "groq");
        assert_eq!(json["reason"], "rate_limited");
    }

    #[test]
    fn test_route_error_display() {
        let err = RouteError::Exhausted {
            attempts: vec![
                Attempt::new("a", AttemptReason::BreakerOpen),
                Attempt::new("b", AttemptReason::Rejected(RejectReason::NoCodeSignal)),
            ],
        };
        assert_eq!(err.to_string(), "all providers exhausted after 2 attempts");
        assert_eq!(err.attempts().len(), 2);
    }
}
