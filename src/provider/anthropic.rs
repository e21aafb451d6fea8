// src/provider/anthropic.rs — Anthropic Messages API backend

use async_trait::async_trait;
use futures::future::try_join_all;

use super::{status_error, transport_error, GenerateRequest, ModelProvider, Role};
use crate::infra::errors::ChipLoopError;

pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> &str {
        "https://api.anthropic.com/v1/messages"
    }

    fn build_request_body(&self, request: &GenerateRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });

        if let Some(system) = request.system_prompt() {
            body["system"] = serde_json::json!(system);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }

    async fn complete_once(&self, body: &serde_json::Value) -> Result<String, ChipLoopError> {
        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e))?;

        if !response.status().is_success() {
            return Err(status_error("anthropic", response).await);
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| ChipLoopError::Provider {
            provider: "anthropic".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        Ok(parse_text_blocks(&resp))
    }
}

/// Concatenate the text blocks of a Messages API response.
fn parse_text_blocks(resp: &serde_json::Value) -> String {
    resp["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|c| c["type"] == "text")
                .map(|c| c["text"].as_str().unwrap_or(""))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        // The Messages API has no `n`; fan the candidates out as parallel calls.
        let body = self.build_request_body(&request);
        let calls = (0..request.num_candidates).map(|_| self.complete_once(&body));
        try_join_all(calls).await
    }
}
