//! OpenAI chat completions adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{ProviderAdapter, RawCompletion};
use crate::error::AdapterError;
use crate::types::{GenerationRequest, TokenUsage};

/// Adapter for the OpenAI chat completions API
pub struct OpenAiAdapter {
    name: String,
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiAdapter {
    pub fn new(
        name: String,
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            name,
            client,
            api_key,
            base_url,
            model,
            max_tokens,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> serde_json::Value {
        // OpenAI takes system messages inline
        let messages: Vec<OpenAiMessage> = request
            .messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "messages": messages,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        for (key, value) in &request.params {
            body[key.as_str()] = value.clone();
        }

        body
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<RawCompletion, AdapterError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(request);

        debug!(
            "OpenAI request: provider={}, model={}, messages={}",
            self.name,
            self.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdapterError::from_status(status, &error_text));
        }

        let api_response: OpenAiApiResponse =
            response.json().await.map_err(AdapterError::from_reqwest)?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            AdapterError::malformed_response("OpenAI response contained no choices")
        })?;

        let text = choice.message.content.unwrap_or_default();
        if text.is_empty() {
            return Err(AdapterError::malformed_response(
                "OpenAI response contained no message content",
            ));
        }

        let usage = api_response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(RawCompletion {
            text,
            model: api_response.model.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
