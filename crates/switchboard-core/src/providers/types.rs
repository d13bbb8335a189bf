//! Adapter trait and the normalized response shape

use crate::error::AdapterError;
use crate::types::{GenerationRequest, TokenUsage};
use async_trait::async_trait;

/// A raw, unvalidated completion as returned by a backend
#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub text: String,
    /// Model the backend reports having used
    pub model: String,
    pub usage: TokenUsage,
}

/// Uniform interface to one configured backend.
///
/// Implementations own their HTTP client and credentials, enforce the
/// configured per-call timeout, and retain no state across calls. A
/// misconfigured endpoint surfaces as a transport error, never a panic.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Configured provider name (e.g. "anthropic", "groq")
    fn name(&self) -> &str;

    /// Default model identifier for this adapter
    fn model(&self) -> &str;

    /// Perform one generation call
    async fn invoke(&self, request: &GenerationRequest) -> Result<RawCompletion, AdapterError>;
}
