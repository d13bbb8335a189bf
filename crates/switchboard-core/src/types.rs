//! Provider-agnostic request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// A single chat message in a generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A generation request as submitted to the router.
///
/// Immutable once handed to [`Router::route`](crate::Router::route): the
/// router never mutates it, only reads it per candidate attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    /// Preferred provider name. Tried first when its breaker allows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Open map of additional generation parameters (top_p, stop, ...)
    /// passed through to the backend as-is.
    #[serde(default, flatten)]
    pub params: BTreeMap<String, Value>,
}

impl GenerationRequest {
    /// Build a request from a single user prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: prompt.into(),
            }],
            provider: None,
            max_tokens: None,
            temperature: None,
            params: BTreeMap::new(),
        }
    }

    /// Concatenated system message content, if any
    pub fn system_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Token usage from a single backend call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Successful outcome of a routed request
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    /// Provider that produced the accepted response
    pub provider: String,
    pub model: String,
    pub text: String,
    pub usage: TokenUsage,
    /// Wall time of the winning adapter call
    #[serde(serialize_with = "serialize_duration_ms", rename = "latency_ms")]
    pub latency: Duration,
    /// True when a non-first candidate served the request
    pub fallback: bool,
}

fn serialize_duration_ms<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_u64(d.as_millis() as u64)
}

/// Identity and selection weight of a configured backend.
///
/// Endpoint and credentials stay in the adapter that was built from
/// configuration; the descriptor carries only what selection needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    /// Higher priority is tried earlier
    #[serde(default)]
    pub priority: i32,
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}
