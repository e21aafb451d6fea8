// src/core/types.rs — Core domain types

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluator::ranker::Rank;
use crate::provider::ModelRef;

/// Output mismatch count reported by a simulation.
///
/// `Indeterminate` covers every case where no explicit count was produced
/// (compile failure, timeout, missing summary line) and orders after every
/// real count.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MismatchCount {
    Count(u32),
    #[default]
    Indeterminate,
}

impl MismatchCount {
    pub fn is_zero(&self) -> bool {
        matches!(self, MismatchCount::Count(0))
    }

    pub fn count(&self) -> Option<u32> {
        match self {
            MismatchCount::Count(n) => Some(*n),
            MismatchCount::Indeterminate => None,
        }
    }
}

impl fmt::Display for MismatchCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchCount::Count(n) => write!(f, "{}", n),
            MismatchCount::Indeterminate => f.write_str("inf"),
        }
    }
}

/// Per-signal mismatch detail from the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMismatch {
    pub count: u32,
    pub first_mismatch_time: u64,
}

/// Structured reading of one candidate's compile and simulation output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationVerdict {
    pub compiled: bool,
    pub return_code: Option<i32>,
    pub mismatch_count: MismatchCount,
    pub total_samples: Option<u32>,
    pub per_signal: BTreeMap<String, SignalMismatch>,
    /// Hint/summary lines worth repeating back to the model.
    pub highlights: Vec<String>,
    pub timed_out: bool,
}

impl SimulationVerdict {
    pub fn not_compiled() -> Self {
        Self::default()
    }

    pub fn passed(&self) -> bool {
        self.compiled && self.mismatch_count.is_zero()
    }
}

/// One model-proposed implementation for one iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub iteration: u32,
    pub index: u32,
    pub model: ModelRef,
    /// Model text exactly as received.
    pub raw_text: String,
    /// Normalized design; empty when extraction failed.
    pub source: String,
    pub compiled: bool,
    pub rank: Rank,
    pub verdict: Option<SimulationVerdict>,
    /// Compiler/simulator text or the failure reason.
    pub message: String,
}

impl CandidateResponse {
    pub fn new(iteration: u32, index: u32, model: ModelRef, raw_text: impl Into<String>) -> Self {
        Self {
            iteration,
            index,
            model,
            raw_text: raw_text.into(),
            source: String::new(),
            compiled: false,
            rank: Rank::Unranked,
            verdict: None,
            message: String::new(),
        }
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn mismatch_count(&self) -> MismatchCount {
        self.verdict
            .as_ref()
            .map(|v| v.mismatch_count)
            .unwrap_or_default()
    }

    pub fn per_signal(&self) -> Option<&BTreeMap<String, SignalMismatch>> {
        self.verdict.as_ref().map(|v| &v.per_signal)
    }
}

/// Best result seen so far in a run.
///
/// The response is shared with whoever else holds it; it is never copied.
#[derive(Debug, Clone, Default)]
pub struct BestResult {
    pub mismatch_count: MismatchCount,
    pub response: Option<Arc<CandidateResponse>>,
}

impl BestResult {
    /// Replace the held result only on a strictly lower mismatch count.
    pub fn offer(&mut self, candidate: &Arc<CandidateResponse>) -> bool {
        let count = candidate.mismatch_count();
        if count < self.mismatch_count {
            self.mismatch_count = count;
            self.response = Some(Arc::clone(candidate));
            true
        } else {
            false
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.response.as_ref().map(|r| r.source.as_str())
    }

    pub fn per_signal(&self) -> BTreeMap<String, SignalMismatch> {
        self.response
            .as_ref()
            .and_then(|r| r.per_signal().cloned())
            .unwrap_or_default()
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Exhausted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Everything a finished run reports back to its caller.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub run_id: String,
    pub status: RunStatus,
    /// Best-ever response; on exhaustion without any improvement, the last winner.
    pub best: Option<Arc<CandidateResponse>>,
    pub mismatch_count: MismatchCount,
    pub iterations: u32,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn best_source(&self) -> Option<&str> {
        self.best.as_ref().map(|b| b.source.as_str())
    }
}

/// Progress events emitted by the controller during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    IterationStart {
        iteration: u32,
        max_iterations: u32,
        model: String,
    },
    CandidateEvaluated {
        iteration: u32,
        index: u32,
        rank: Rank,
        mismatches: MismatchCount,
    },
    IterationEnd {
        iteration: u32,
        winner_rank: Rank,
        mismatches: MismatchCount,
        best: MismatchCount,
    },
    Complete {
        status: RunStatus,
        iterations: u32,
        best: MismatchCount,
        elapsed_secs: f64,
    },
}
