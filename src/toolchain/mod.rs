// src/toolchain/mod.rs — External compiler/simulator layer
//
// A toolchain compiles a design together with its testbench inside a working
// directory and, when the compile succeeded, simulates the result. The
// controller never calls `simulate` directly: `run_checked` enforces the
// success-marker gate.

pub mod riviera;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::infra::config::ToolchainConfig;
use crate::infra::errors::ChipLoopError;

#[async_trait]
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &str;

    /// Confirm the backend can run at all. Called once before iteration 1.
    fn check(&self) -> Result<(), ChipLoopError> {
        Ok(())
    }

    /// Reinitialize the compiled-library state in `work_dir`, then compile.
    /// Returns the combined compiler output.
    async fn compile(
        &self,
        work_dir: &Path,
        design: &Path,
        testbench: &Path,
    ) -> Result<String, ChipLoopError>;

    /// Simulate whatever the last `compile` in `work_dir` produced.
    async fn simulate(&self, work_dir: &Path) -> Result<SimulationRun, ChipLoopError>;
}

/// Raw simulator result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationRun {
    /// `None` when the process never produced an exit status (timeout, missing unit).
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl SimulationRun {
    pub fn completed(return_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            return_code: Some(return_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            return_code: None,
            stdout: String::new(),
            stderr: message.into(),
            timed_out: true,
        }
    }

    /// A run that never started, with the reason in `stderr`.
    pub fn not_started(message: impl Into<String>) -> Self {
        Self {
            return_code: None,
            stdout: String::new(),
            stderr: message.into(),
            timed_out: false,
        }
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// What one candidate got out of the toolchain.
#[derive(Debug, Clone, Default)]
pub struct ToolchainOutput {
    pub compile_text: String,
    /// `None` when the compile text lacked the success marker.
    pub simulation: Option<SimulationRun>,
}

/// Compile, and simulate only when the compile output carries `success_marker`.
pub async fn run_checked(
    toolchain: &dyn Toolchain,
    success_marker: &str,
    work_dir: &Path,
    design: &Path,
    testbench: &Path,
) -> Result<ToolchainOutput, ChipLoopError> {
    let compile_text = toolchain.compile(work_dir, design, testbench).await?;
    if !compile_text.contains(success_marker) {
        tracing::debug!(
            toolchain = toolchain.name(),
            marker = success_marker,
            "compile output has no success marker, skipping simulation"
        );
        return Ok(ToolchainOutput {
            compile_text,
            simulation: None,
        });
    }

    let simulation = toolchain.simulate(work_dir).await?;
    Ok(ToolchainOutput {
        compile_text,
        simulation: Some(simulation),
    })
}

/// Build the configured toolchain backend.
pub fn create_toolchain(config: &ToolchainConfig) -> Result<Arc<dyn Toolchain>, ChipLoopError> {
    match config.backend.trim().to_ascii_lowercase().as_str() {
        "riviera" | "riviera-pro" | "rivierapro" => {
            Ok(Arc::new(riviera::RivieraToolchain::new(config)))
        }
        other => Err(ChipLoopError::Config(format!(
            "unknown toolchain backend '{}'",
            other
        ))),
    }
}
