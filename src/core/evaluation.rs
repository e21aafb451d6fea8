// src/core/evaluation.rs — One candidate: extract, write, compile/simulate, analyze, rank
//
// Every failure inside a candidate's evaluation is caught here and folded into
// the candidate (rank + message). Nothing escapes to the iteration loop.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::types::{CandidateResponse, MismatchCount};
use crate::evaluator::analyzer::OutcomeAnalyzer;
use crate::evaluator::ranker::{self, Rank};
use crate::extract::{self, ModuleInterface};
use crate::infra::errors::ChipLoopError;
use crate::provider::ModelRef;
use crate::toolchain::{self, Toolchain};

pub const LOG_FILE: &str = "log.txt";

const NO_MODULE_MESSAGE: &str = "No valid output produced: no recognizable module in the response";

/// Shared, read-only evaluation context for every candidate of a run.
pub struct CandidateEvaluator {
    toolchain: Arc<dyn Toolchain>,
    analyzer: OutcomeAnalyzer,
    testbench: PathBuf,
    design_name: String,
    interface: Option<ModuleInterface>,
}

/// Identity of one candidate within the run.
#[derive(Debug, Clone)]
pub struct CandidateSlot {
    pub iteration: u32,
    pub index: u32,
    pub model: ModelRef,
    pub work_dir: PathBuf,
}

impl CandidateEvaluator {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        analyzer: OutcomeAnalyzer,
        testbench: impl Into<PathBuf>,
        design_name: impl Into<String>,
        interface: Option<ModuleInterface>,
    ) -> Self {
        Self {
            toolchain,
            analyzer,
            testbench: testbench.into(),
            design_name: design_name.into(),
            interface,
        }
    }

    pub fn interface(&self) -> Option<&ModuleInterface> {
        self.interface.as_ref()
    }

    /// File name of the design inside a candidate directory.
    pub fn design_file(&self) -> String {
        format!("{}.sv", self.design_name)
    }

    /// Evaluate one raw response. `best` is the best mismatch count at the
    /// start of the iteration; `transcript` is the conversation the model saw.
    pub async fn evaluate(
        &self,
        slot: &CandidateSlot,
        raw_text: String,
        best: MismatchCount,
        transcript: &str,
    ) -> CandidateResponse {
        let mut candidate =
            CandidateResponse::new(slot.iteration, slot.index, slot.model.clone(), raw_text);

        if let Err(e) = self.try_evaluate(&mut candidate, &slot.work_dir, best).await {
            tracing::warn!(
                iteration = slot.iteration,
                candidate = slot.index,
                "Candidate evaluation failed: {}",
                e
            );
            candidate.rank = Rank::InternalError;
            candidate.message = e.to_string();
        }

        if let Err(e) = write_log(&slot.work_dir, &candidate, transcript).await {
            tracing::warn!("Could not write candidate log in {:?}: {}", slot.work_dir, e);
        }
        candidate
    }

    async fn try_evaluate(
        &self,
        candidate: &mut CandidateResponse,
        work_dir: &Path,
        best: MismatchCount,
    ) -> Result<(), ChipLoopError> {
        let Some(source) = extract::extract(&candidate.raw_text, self.interface.as_ref()) else {
            candidate.rank = Rank::ExtractionFailed;
            candidate.message = NO_MODULE_MESSAGE.into();
            return Ok(());
        };
        candidate.source = source;

        let design = work_dir.join(self.design_file());
        tokio::fs::write(&design, &candidate.source).await?;

        let output = toolchain::run_checked(
            self.toolchain.as_ref(),
            self.analyzer.success_marker(),
            work_dir,
            &design,
            &self.testbench,
        )
        .await?;

        let verdict = self
            .analyzer
            .analyze(&output.compile_text, output.simulation.as_ref());
        candidate.compiled = verdict.compiled;
        candidate.rank = ranker::rank(&verdict, best);
        candidate.message = match output.simulation {
            Some(ref run) => run.combined(),
            None => output.compile_text,
        };
        candidate.verdict = Some(verdict);
        Ok(())
    }
}

/// Audit log for one candidate: what the model saw, what it said, how it scored.
pub fn render_log(candidate: &CandidateResponse, transcript: &str) -> String {
    let mut out = String::with_capacity(transcript.len() + candidate.raw_text.len() + 256);
    out.push_str(transcript);
    let _ = write!(out, "\nassistant: {}\n", candidate.raw_text);
    let _ = writeln!(out, "\n Iteration rank: {}", candidate.rank);
    let _ = writeln!(out, " Model: {}", candidate.model);
    let _ = writeln!(out, " Mismatches: {}", candidate.mismatch_count());

    if let Some(signals) = candidate.per_signal().filter(|s| !s.is_empty()) {
        out.push_str("\nMismatch Analysis:\n");
        for (signal, data) in signals {
            let _ = writeln!(
                out,
                "{}: {} mismatches (first at {})",
                signal, data.count, data.first_mismatch_time
            );
        }
    }
    if !candidate.message.is_empty() {
        out.push_str("\nToolchain output:\n");
        out.push_str(&candidate.message);
        out.push('\n');
    }
    out
}

async fn write_log(
    work_dir: &Path,
    candidate: &CandidateResponse,
    transcript: &str,
) -> std::io::Result<()> {
    tokio::fs::write(work_dir.join(LOG_FILE), render_log(candidate, transcript)).await
}
