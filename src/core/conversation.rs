// src/core/conversation.rs — Conversation log with an optional append-only mirror

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::infra::errors::ChipLoopError;
use crate::provider::{Message, Role};

/// Ordered role-tagged messages sent to the model each iteration.
///
/// Memory is authoritative. Every append is also written to the mirror file as
/// `role: content`; removals are memory-only since the mirror is a transcript.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    mirror: Option<PathBuf>,
    /// Start index of the feedback round added last, so the next round can
    /// replace exactly that pair.
    round_start: Option<usize>,
}

impl Conversation {
    /// Create an empty conversation. An existing mirror file is truncated.
    pub fn new(mirror: Option<PathBuf>) -> Result<Self, ChipLoopError> {
        if let Some(ref path) = mirror {
            truncate(path)?;
        }
        Ok(Self {
            messages: Vec::new(),
            mirror,
            round_start: None,
        })
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> Result<(), ChipLoopError> {
        let message = Message {
            role,
            content: content.into(),
        };
        let line = format!("{}: {}\n", message.role, message.content);
        self.messages.push(message);

        if let Some(ref path) = self.mirror {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// The last `n` messages, or all of them when there are fewer.
    pub fn last_n(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Remove the message at `index`; out-of-range indices are ignored.
    pub fn remove_message(&mut self, index: usize) -> Option<Message> {
        if index < self.messages.len() {
            Some(self.messages.remove(index))
        } else {
            None
        }
    }

    /// Drop every message and truncate the mirror.
    pub fn clear(&mut self) -> Result<(), ChipLoopError> {
        self.messages.clear();
        self.round_start = None;
        if let Some(ref path) = self.mirror {
            truncate(path)?;
        }
        Ok(())
    }

    /// Reset to the seed pair: one system instruction and the design prompt.
    pub fn seed(&mut self, system: &str, prompt: &str) -> Result<(), ChipLoopError> {
        self.clear()?;
        self.add_message(Role::System, system)?;
        self.add_message(Role::User, prompt)
    }

    /// Replace the previous feedback round with a new assistant answer and its feedback.
    ///
    /// Only the pair added by the previous call is removed, so the log holds at
    /// most the seed messages plus one round.
    pub fn replace_round(&mut self, answer: &str, feedback: &str) -> Result<(), ChipLoopError> {
        if let Some(start) = self.round_start.take() {
            let end = (start + 2).min(self.messages.len());
            self.messages.drain(start..end);
        }
        let start = self.messages.len();
        self.add_message(Role::Assistant, answer)?;
        self.add_message(Role::User, feedback)?;
        self.round_start = Some(start);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn mirror(&self) -> Option<&Path> {
        self.mirror.as_deref()
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

fn truncate(path: &Path) -> Result<(), ChipLoopError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)?;
    Ok(())
}
