// src/provider/ollama.rs — Ollama local inference backend
//
// Covers the open-weight code models (CodeLlama, RTLCoder and friends) that are
// run locally rather than behind a hosted API.

use async_trait::async_trait;

use super::{transport_error, GenerateRequest, ModelProvider};
use crate::infra::errors::ChipLoopError;

pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
            client: reqwest::Client::new(),
        }
    }

    /// Honour `OLLAMA_HOST` when set.
    pub fn from_env() -> Self {
        Self::new(std::env::var("OLLAMA_HOST").ok())
    }

    fn build_request_body(&self, request: &GenerateRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut options = serde_json::json!({});
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            options["temperature"] = serde_json::json!(temp);
        }

        serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "options": options,
        })
    }

    async fn complete_once(&self, body: &serde_json::Value) -> Result<String, ChipLoopError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error("ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ChipLoopError::Provider {
                provider: "ollama".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| ChipLoopError::Provider {
            provider: "ollama".into(),
            message: format!("Invalid Ollama response: {}", e),
            retriable: false,
        })?;

        Ok(resp["message"]["content"].as_str().unwrap_or("").to_string())
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn id(&self) -> &str {
        "ollama"
    }

    fn name(&self) -> &str {
        "Ollama"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        let body = self.build_request_body(&request);
        // A local server runs one generation at a time; issue the samples in order.
        let mut texts = Vec::with_capacity(request.num_candidates as usize);
        for _ in 0..request.num_candidates {
            texts.push(self.complete_once(&body).await?);
        }
        Ok(texts)
    }
}
