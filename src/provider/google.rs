// src/provider/google.rs — Google Generative AI (Gemini) backend

use async_trait::async_trait;

use super::{status_error, transport_error, GenerateRequest, ModelProvider, Role};
use crate::infra::errors::ChipLoopError;

pub struct GoogleProvider {
    api_key: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn base_url(&self) -> &str {
        "https://generativelanguage.googleapis.com/v1beta"
    }

    /// Build the Gemini request body from a GenerateRequest.
    fn build_request_body(&self, request: &GenerateRequest) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = Vec::new();

        for m in &request.messages {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => continue, // system handled via system_instruction
            };

            contents.push(serde_json::json!({
                "role": role,
                "parts": [{ "text": m.content }],
            }));
        }

        let mut body = serde_json::json!({
            "contents": contents,
        });

        if let Some(system) = request.system_prompt() {
            body["system_instruction"] = serde_json::json!({
                "parts": [{ "text": system }],
            });
        }

        let mut gen_config = serde_json::json!({
            "candidateCount": request.num_candidates,
        });
        if let Some(max_tokens) = request.max_tokens {
            gen_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            gen_config["temperature"] = serde_json::json!(temp);
        }
        body["generationConfig"] = gen_config;

        body
    }
}

fn parse_candidates(resp: &serde_json::Value) -> Vec<String> {
    resp["candidates"]
        .as_array()
        .map(|candidates| {
            candidates
                .iter()
                .map(|c| {
                    c["content"]["parts"]
                        .as_array()
                        .map(|parts| {
                            parts
                                .iter()
                                .filter_map(|p| p["text"].as_str())
                                .collect::<Vec<_>>()
                                .join("")
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    fn id(&self) -> &str {
        "google"
    }

    fn name(&self) -> &str {
        "Google"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        let body = self.build_request_body(&request);
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url(),
            request.model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("google", e))?;

        if !response.status().is_success() {
            return Err(status_error("google", response).await);
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| ChipLoopError::Provider {
            provider: "google".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        Ok(parse_candidates(&resp))
    }
}
