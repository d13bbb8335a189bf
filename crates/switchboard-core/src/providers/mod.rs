//! Provider adapters — one uniform interface per backend.
//!
//! Each adapter implements [`ProviderAdapter`], normalizes its
//! backend's wire format, and maps transport/auth/rate-limit failures
//! into the closed [`AdapterError`](crate::AdapterError) taxonomy. The
//! router composes adapters; adapters keep no state across calls.

pub mod anthropic;
pub mod openai;
pub mod openai_compat;
pub mod types;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;
pub use openai_compat::OpenAiCompatAdapter;
pub use types::{ProviderAdapter, RawCompletion};
