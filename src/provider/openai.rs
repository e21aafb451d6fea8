// src/provider/openai.rs — OpenAI Chat Completions backend

use async_trait::async_trait;

use super::{status_error, transport_error, GenerateRequest, ModelProvider};
use crate::infra::errors::ChipLoopError;

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn build_request_body(&self, request: &GenerateRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        // All candidates come back from one request.
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "n": request.num_candidates,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

/// Pull every choice's text out of a Chat Completions response.
pub(crate) fn parse_choices(resp: &serde_json::Value) -> Vec<String> {
    resp["choices"]
        .as_array()
        .map(|choices| {
            choices
                .iter()
                .map(|c| c["message"]["content"].as_str().unwrap_or("").to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("openai", e))?;

        if !response.status().is_success() {
            return Err(status_error("openai", response).await);
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| ChipLoopError::Provider {
            provider: "openai".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        let texts = parse_choices(&resp);
        tracing::debug!(
            model = %request.model,
            requested = request.num_candidates,
            received = texts.len(),
            "openai candidates received"
        );
        Ok(texts)
    }
}
