// src/infra/errors.rs — Error types for chiploop

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChipLoopError {
    // Model backend errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Setup errors (fatal before the first iteration)
    #[error("Provider '{provider}' needs credentials: set {env_var}")]
    MissingCredentials { provider: String, env_var: String },

    #[error("Unknown model family '{0}'")]
    UnknownModelFamily(String),

    #[error("Invalid start_iteration {start} for '{model}': must be 0 to {max_iterations} or a valid negative index")]
    ScheduleStart {
        model: String,
        start: i64,
        max_iterations: u32,
    },

    #[error("Conflicting start_iteration {start} for '{model}': another model already starts there")]
    ScheduleConflict { model: String, start: u32 },

    #[error("No model starts at iteration 0 in the mixed-model schedule")]
    NoInitialModel,

    // Toolchain
    #[error("Toolchain '{tool}' failed: {message}")]
    Toolchain { tool: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChipLoopError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ChipLoopError::Provider {
                retriable: true,
                ..
            } | ChipLoopError::RateLimited { .. }
        )
    }

    /// Errors raised while assembling a run, before any candidate is requested.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            ChipLoopError::MissingCredentials { .. }
                | ChipLoopError::UnknownModelFamily(_)
                | ChipLoopError::ScheduleStart { .. }
                | ChipLoopError::ScheduleConflict { .. }
                | ChipLoopError::NoInitialModel
                | ChipLoopError::Config(_)
        )
    }
}
