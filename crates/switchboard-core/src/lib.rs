//! switchboard-core - Routing engine for multi-provider LLM generation
//!
//! This crate provides:
//! - Provider adapters normalizing Anthropic, OpenAI, and
//!   OpenAI-compatible backends behind one trait
//! - Per-provider circuit breakers with single-probe half-open recovery
//! - Response validation that separates content quality from
//!   provider availability
//! - The router that walks candidates, enforces timeouts and the
//!   request deadline, and reports every attempt on terminal failure
//! - Rolling metrics and health snapshots for the status surface

pub mod breaker;
pub mod error;
pub mod metrics;
pub mod providers;
pub mod router;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use error::{AdapterError, AdapterErrorKind, Attempt, AttemptReason, RejectReason, RouteError};
pub use metrics::{AggregateSnapshot, ProviderHealth, RouterSnapshot};
pub use providers::{
    AnthropicAdapter, OpenAiAdapter, OpenAiCompatAdapter, ProviderAdapter, RawCompletion,
};
pub use router::{Router, RouterConfig};
pub use types::{
    ChatMessage, ChatRole, Completion, GenerationRequest, ProviderDescriptor, TokenUsage,
};
pub use validator::{ResponseValidator, ValidatorConfig, Verdict};
