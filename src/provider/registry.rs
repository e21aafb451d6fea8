// src/provider/registry.rs — Model family resolution and credential checks

use std::collections::HashMap;
use std::sync::Arc;

use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::human::HumanProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::retry::RetryProvider;
use super::ModelProvider;
use crate::infra::errors::ChipLoopError;

/// Canonical family id for a user-supplied family name (case-insensitive, with aliases).
pub fn canonical_family(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "openai" | "chatgpt" | "gpt" => Some("openai"),
        "anthropic" | "claude" => Some("anthropic"),
        "google" | "gemini" => Some("google"),
        "ollama" | "local" | "codellama" | "rtlcoder" => Some("ollama"),
        "human" | "humaninput" => Some("human"),
        _ => None,
    }
}

fn env_key(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|v| std::env::var(v).ok())
        .find(|k| !k.trim().is_empty())
}

/// Build the backend for a family from the environment.
///
/// Hosted backends are wrapped in [`RetryProvider`] when `retry` is set; a
/// missing API key is reported as [`ChipLoopError::MissingCredentials`].
pub fn create_provider(family: &str, retry: bool) -> Result<Arc<dyn ModelProvider>, ChipLoopError> {
    let canonical =
        canonical_family(family).ok_or_else(|| ChipLoopError::UnknownModelFamily(family.into()))?;

    let missing = |env_var: &str| ChipLoopError::MissingCredentials {
        provider: canonical.into(),
        env_var: env_var.into(),
    };

    let provider: Arc<dyn ModelProvider> = match canonical {
        "openai" => {
            let key = env_key(&["OPENAI_API_KEY"]).ok_or_else(|| missing("OPENAI_API_KEY"))?;
            match std::env::var("OPENAI_BASE_URL") {
                Ok(base) => Arc::new(OpenAIProvider::with_base_url(key, base)),
                Err(_) => Arc::new(OpenAIProvider::new(key)),
            }
        }
        "anthropic" => {
            let key =
                env_key(&["ANTHROPIC_API_KEY"]).ok_or_else(|| missing("ANTHROPIC_API_KEY"))?;
            Arc::new(AnthropicProvider::new(key))
        }
        "google" => {
            let key = env_key(&["GOOGLE_API_KEY", "GEMINI_API_KEY"])
                .ok_or_else(|| missing("GOOGLE_API_KEY"))?;
            Arc::new(GoogleProvider::new(key))
        }
        "ollama" => Arc::new(OllamaProvider::from_env()),
        // Never retried: a person closing the editor is not a transient fault.
        "human" => return Ok(Arc::new(HumanProvider::from_env())),
        other => return Err(ChipLoopError::UnknownModelFamily(other.into())),
    };

    if retry {
        Ok(Arc::new(RetryProvider::new(provider)))
    } else {
        Ok(provider)
    }
}

/// The set of backends a run may call, keyed by canonical family id.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every family up front so credential problems surface before iteration 1.
    pub fn resolve<'a>(
        families: impl IntoIterator<Item = &'a str>,
        retry: bool,
    ) -> Result<Self, ChipLoopError> {
        let mut registry = Self::new();
        for family in families {
            let key = Self::key(family);
            if registry.providers.contains_key(&key) {
                continue;
            }
            let provider = create_provider(family, retry)?;
            tracing::debug!(family, provider = provider.id(), "model backend resolved");
            registry.providers.insert(key, provider);
        }
        Ok(registry)
    }

    /// Register a backend under a family name (used for custom or test backends).
    pub fn with_provider(mut self, family: &str, provider: Arc<dyn ModelProvider>) -> Self {
        self.providers.insert(Self::key(family), provider);
        self
    }

    pub fn get(&self, family: &str) -> Result<Arc<dyn ModelProvider>, ChipLoopError> {
        self.providers
            .get(&Self::key(family))
            .cloned()
            .ok_or_else(|| ChipLoopError::UnknownModelFamily(family.into()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn key(family: &str) -> String {
        canonical_family(family)
            .map(str::to_string)
            .unwrap_or_else(|| family.trim().to_ascii_lowercase())
    }
}
