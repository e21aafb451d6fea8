// src/provider/human.rs — Human-in-the-loop backend
//
// Opens $EDITOR on a scratch file seeded with the latest message. Whatever the
// person saves becomes the single candidate for the iteration.

use async_trait::async_trait;
use std::io::Write;

use super::{GenerateRequest, ModelProvider};
use crate::infra::errors::ChipLoopError;

pub struct HumanProvider {
    editor: String,
}

impl HumanProvider {
    pub fn new(editor: impl Into<String>) -> Self {
        Self {
            editor: editor.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("EDITOR").unwrap_or_else(|_| "nano".into()))
    }

    /// Seed text shown to the person: the latest message, commented out.
    fn seed_text(request: &GenerateRequest) -> String {
        let last = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let mut seed = String::new();
        for line in last.lines() {
            seed.push_str("// ");
            seed.push_str(line);
            seed.push('\n');
        }
        seed
    }
}

#[async_trait]
impl ModelProvider for HumanProvider {
    fn id(&self) -> &str {
        "human"
    }

    fn name(&self) -> &str {
        "Human input"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        let mut file = tempfile::Builder::new()
            .prefix("chiploop-")
            .suffix(".v")
            .tempfile()?;
        file.write_all(Self::seed_text(&request).as_bytes())?;
        file.flush()?;

        let status = tokio::process::Command::new(&self.editor)
            .arg(file.path())
            .status()
            .await
            .map_err(|e| ChipLoopError::Provider {
                provider: "human".into(),
                message: format!("Cannot launch editor '{}': {}", self.editor, e),
                retriable: false,
            })?;

        if !status.success() {
            return Err(ChipLoopError::Provider {
                provider: "human".into(),
                message: format!("Editor '{}' exited with {}", self.editor, status),
                retriable: false,
            });
        }

        let text = tokio::fs::read_to_string(file.path()).await?;
        Ok(vec![text])
    }
}
