//! Gateway HTTP protocol — JSON bodies between clients and the server

use serde::Serialize;
use switchboard_core::{Attempt, Completion, RouteError};

/// Successful generation response
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReply {
    pub request_id: String,
    #[serde(flatten)]
    pub completion: Completion,
}

/// Body returned with a 5xx when routing fails terminally. Every
/// attempt is enumerated so the caller can see what was tried.
#[derive(Debug, Clone, Serialize)]
pub struct RouteFailure {
    pub request_id: String,
    pub error: &'static str,
    pub message: String,
    pub attempts: Vec<Attempt>,
}

impl RouteFailure {
    pub fn from_route_error(request_id: String, err: RouteError) -> Self {
        let message = err.to_string();
        let (error, attempts) = match err {
            RouteError::Exhausted { attempts } => ("all_providers_exhausted", attempts),
            RouteError::DeadlineExceeded { attempts } => ("deadline_exceeded", attempts),
        };
        Self {
            request_id,
            error,
            message,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{AdapterErrorKind, AttemptReason, RejectReason};

    #[test]
    fn test_route_failure_serializes_attempts() {
        let failure = RouteFailure::from_route_error(
            "req-1".to_string(),
            RouteError::Exhausted {
                attempts: vec![
                    Attempt::new("anthropic", AttemptReason::Adapter(AdapterErrorKind::RateLimited)),
                    Attempt::new("openai", AttemptReason::Rejected(RejectReason::NoCodeSignal)),
                ],
            },
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["error"], "all_providers_exhausted");
        assert_eq!(json["attempts"][0]["provider"], "anthropic");
        assert_eq!(json["attempts"][0]["reason"], "rate_limited");
        assert_eq!(json["attempts"][1]["reason"], "no_code_signal");
    }

    #[test]
    fn test_deadline_failure_variant_name() {
        let failure = RouteFailure::from_route_error(
            "req-2".to_string(),
            RouteError::DeadlineExceeded { attempts: vec![] },
        );
        assert_eq!(failure.error, "deadline_exceeded");
        assert!(failure.message.contains("deadline"));
    }
}
