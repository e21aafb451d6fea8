// src/provider/mod.rs — Model backend layer

pub mod anthropic;
pub mod google;
pub mod human;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::errors::ChipLoopError;

/// Core trait that all model backends implement.
///
/// A backend answers one question: given an ordered conversation, return up to
/// `num_candidates` candidate texts. Everything else (credentials, endpoints,
/// token limits) lives in the implementing type.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError>;
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub num_candidates: u32,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, num_candidates: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            num_candidates: num_candidates.max(1),
            max_tokens: None,
            temperature: None,
        }
    }

    /// All system messages joined, for APIs that take the system prompt out of band.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a specific model within a model family.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    pub family: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(family: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            model: model.into(),
        }
    }

    /// Parse "family/model" format
    pub fn parse(s: &str) -> Option<Self> {
        let (family, model) = s.split_once('/')?;
        if family.is_empty() {
            return None;
        }
        Some(Self {
            family: family.to_string(),
            model: model.to_string(),
        })
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.family, self.model)
    }
}

/// Map a `reqwest` transport error to a provider error.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> ChipLoopError {
    ChipLoopError::Provider {
        provider: provider.into(),
        message: e.to_string(),
        retriable: e.is_timeout() || e.is_connect(),
    }
}

/// Turn a non-success HTTP response into a provider error.
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> ChipLoopError {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);
        return ChipLoopError::RateLimited {
            provider: provider.into(),
            retry_after_ms: retry_after * 1000,
        };
    }
    let body = response.text().await.unwrap_or_default();
    ChipLoopError::Provider {
        provider: provider.into(),
        message: format!("HTTP {}: {}", status, body),
        retriable: status.is_server_error(),
    }
}
