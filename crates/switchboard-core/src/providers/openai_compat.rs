//! OpenAI-compatible adapter for Groq, Azure-style gateways, local
//! endpoints, and anything else speaking the chat completions wire
//! format under a different base URL.

use async_trait::async_trait;
use std::time::Duration;

use super::openai::OpenAiAdapter;
use super::types::{ProviderAdapter, RawCompletion};
use crate::error::AdapterError;
use crate::types::GenerationRequest;

/// Wraps [`OpenAiAdapter`] with a custom provider name and endpoint
pub struct OpenAiCompatAdapter {
    inner: OpenAiAdapter,
}

impl std::fmt::Debug for OpenAiCompatAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatAdapter")
            .field("inner", &self.inner)
            .finish()
    }
}

impl OpenAiCompatAdapter {
    /// `name` is the configured label (e.g. "groq", "local");
    /// `base_url` the endpoint root (e.g. `https://api.groq.com/openai`)
    pub fn new(
        name: String,
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: OpenAiAdapter::new(name, api_key, model, base_url, max_tokens, timeout),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<RawCompletion, AdapterError> {
        self.inner.invoke(request).await
    }
}
