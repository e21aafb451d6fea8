// src/toolchain/riviera.rs — Aldec Riviera-PRO command-line backend
//
// compile:  rm -r <lib>; vlib <lib>; vlog -work <lib> <design> <testbench>
// simulate: vdir <lib> (top unit present?); vsimsa -do simulate.do
//
// Every command runs with the candidate's own directory as cwd, so concurrent
// candidates never share a compiled library.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{SimulationRun, Toolchain};
use crate::infra::config::ToolchainConfig;
use crate::infra::errors::ChipLoopError;
use crate::util::truncate_str;

/// Binaries that must be on `PATH`.
pub const REQUIRED_BINARIES: &[&str] = &["vlib", "vlog", "vdir", "vsimsa"];

const DO_FILE: &str = "simulate.do";

pub struct RivieraToolchain {
    library: String,
    top_module: String,
    timeout: Duration,
}

/// Outcome of one external command.
struct CommandOutcome {
    status: Option<i32>,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

impl CommandOutcome {
    fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

impl RivieraToolchain {
    pub fn new(config: &ToolchainConfig) -> Self {
        Self {
            library: config.work_library.clone(),
            top_module: config.top_module.clone(),
            timeout: config.timeout(),
        }
    }

    /// Fail early when any Riviera-PRO binary is missing from `PATH`.
    pub fn check_installed() -> Result<(), ChipLoopError> {
        for bin in REQUIRED_BINARIES {
            if which::which(bin).is_err() {
                return Err(ChipLoopError::Toolchain {
                    tool: (*bin).into(),
                    message: "not found on PATH (is Riviera-PRO installed?)".into(),
                });
            }
        }
        Ok(())
    }

    /// Script handed to `vsimsa -do`.
    pub fn do_script(&self) -> String {
        format!(
            "vsim -c {}.{}\nrun -all;\nquit;\n",
            self.library, self.top_module
        )
    }

    async fn run(
        &self,
        work_dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutcome, ChipLoopError> {
        tracing::debug!("Running: {} {} in {:?}", program, args.join(" "), work_dir);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(CommandOutcome {
                status: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                timed_out: false,
            }),
            Ok(Err(e)) => Err(ChipLoopError::Toolchain {
                tool: program.into(),
                message: e.to_string(),
            }),
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {}s in {:?}",
                    program,
                    self.timeout.as_secs(),
                    work_dir
                );
                Ok(CommandOutcome {
                    status: None,
                    stdout: String::new(),
                    stderr: format!("{} timed out after {}s", program, self.timeout.as_secs()),
                    timed_out: true,
                })
            }
        }
    }

    fn absolute(path: &Path) -> Result<PathBuf, ChipLoopError> {
        Ok(std::path::absolute(path)?)
    }
}

#[async_trait]
impl Toolchain for RivieraToolchain {
    fn name(&self) -> &str {
        "riviera"
    }

    fn check(&self) -> Result<(), ChipLoopError> {
        Self::check_installed()
    }

    async fn compile(
        &self,
        work_dir: &Path,
        design: &Path,
        testbench: &Path,
    ) -> Result<String, ChipLoopError> {
        let design = Self::absolute(design)?;
        let testbench = Self::absolute(testbench)?;

        // Stale units from an earlier compile must not satisfy this one.
        let library_dir = work_dir.join(&self.library);
        if library_dir.exists() {
            tokio::fs::remove_dir_all(&library_dir).await?;
        }

        let init = self.run(work_dir, "vlib", &[&self.library]).await?;
        if init.timed_out || init.status != Some(0) {
            return Ok(format!("Library initialization failed:\n{}", init.combined()));
        }

        let design_arg = design.to_string_lossy();
        let testbench_arg = testbench.to_string_lossy();
        let compiled = self
            .run(
                work_dir,
                "vlog",
                &["-work", &self.library, &design_arg, &testbench_arg],
            )
            .await?;

        let text = compiled.combined();
        tracing::debug!("vlog output: {}", truncate_str(&text, 500));
        Ok(text)
    }

    async fn simulate(&self, work_dir: &Path) -> Result<SimulationRun, ChipLoopError> {
        let listing = self.run(work_dir, "vdir", &[&self.library]).await?;
        if listing.timed_out {
            return Ok(SimulationRun::timed_out(listing.stderr));
        }
        if !listing.stdout.contains(&self.top_module) {
            return Ok(SimulationRun::not_started(format!(
                "Top module '{}' not found in compiled units.",
                self.top_module
            )));
        }

        tokio::fs::write(work_dir.join(DO_FILE), self.do_script()).await?;
        let sim = self.run(work_dir, "vsimsa", &["-do", DO_FILE]).await?;

        if sim.timed_out {
            return Ok(SimulationRun::timed_out("Simulation timed out."));
        }
        Ok(SimulationRun {
            return_code: sim.status,
            stdout: sim.stdout,
            stderr: sim.stderr,
            timed_out: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain(timeout_seconds: u64) -> RivieraToolchain {
        RivieraToolchain::new(&ToolchainConfig {
            timeout_seconds,
            ..ToolchainConfig::default()
        })
    }

    #[test]
    fn test_do_script() {
        assert_eq!(
            toolchain(300).do_script(),
            "vsim -c work.top_module\nrun -all;\nquit;\n"
        );
    }

    #[test]
    fn test_do_script_custom_top() {
        let tc = RivieraToolchain::new(&ToolchainConfig {
            top_module: "tb".into(),
            work_library: "lib0".into(),
            ..ToolchainConfig::default()
        });
        assert!(tc.do_script().starts_with("vsim -c lib0.tb\n"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_toolchain_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = toolchain(5)
            .run(dir.path(), "chiploop-no-such-binary", &[])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChipLoopError::Toolchain { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut tc = toolchain(5);
        tc.timeout = Duration::from_millis(100);
        let out = tc.run(dir.path(), "sleep", &["5"]).await.unwrap();
        assert!(out.timed_out);
        assert!(out.status.is_none());
        assert!(out.stderr.contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = toolchain(5).run(dir.path(), "ls", &[]).await.unwrap();
        assert_eq!(out.status, Some(0));
        assert!(out.stdout.contains("marker.txt"));
    }
}
