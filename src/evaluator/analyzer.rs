// src/evaluator/analyzer.rs — Compile/simulation text to a structured verdict
//
// Zero mismatches must be stated explicitly by the simulator. A run that
// compiled but printed no summary line is indeterminate, never a pass.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{MismatchCount, SignalMismatch, SimulationVerdict};
use crate::toolchain::SimulationRun;

/// Success marker used by the current Riviera-PRO flow.
pub const DEFAULT_SUCCESS_MARKER: &str = "0 Errors";

/// Success marker of the reduced legacy flow.
pub const LEGACY_SUCCESS_MARKER: &str = "SUCCESS";

/// First mismatch times below this are reported as initialization problems.
pub const EARLY_MISMATCH_TIME: u64 = 100;

static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Mismatches:\s*(\d+)\s*in\s*(\d+)").expect("summary pattern is valid")
});

static TOTAL_MISMATCHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total mismatched samples is (\d+)").expect("total pattern is valid")
});

static SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Output '(\w+)' has (\d+) mismatches\. First mismatch occurred at time (\d+)")
        .expect("signal pattern is valid")
});

/// Explicit summary found in simulator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MismatchSummary {
    pub mismatches: u32,
    pub samples: Option<u32>,
}

pub struct OutcomeAnalyzer {
    success_marker: String,
}

impl Default for OutcomeAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_MARKER)
    }
}

impl OutcomeAnalyzer {
    pub fn new(success_marker: impl Into<String>) -> Self {
        Self {
            success_marker: success_marker.into(),
        }
    }

    pub fn legacy() -> Self {
        Self::new(LEGACY_SUCCESS_MARKER)
    }

    pub fn success_marker(&self) -> &str {
        &self.success_marker
    }

    pub fn compiled(&self, compile_text: &str) -> bool {
        compile_text.contains(&self.success_marker)
    }

    /// Build a verdict from the compile text and the simulation, if one ran.
    pub fn analyze(&self, compile_text: &str, simulation: Option<&SimulationRun>) -> SimulationVerdict {
        if !self.compiled(compile_text) {
            return SimulationVerdict::not_compiled();
        }

        let mut verdict = SimulationVerdict {
            compiled: true,
            ..SimulationVerdict::default()
        };
        let Some(run) = simulation else {
            return verdict;
        };

        verdict.return_code = run.return_code;
        verdict.timed_out = run.timed_out;
        if run.timed_out {
            return verdict;
        }

        let text = run.combined();
        if let Some(summary) = parse_summary(&text) {
            verdict.mismatch_count = MismatchCount::Count(summary.mismatches);
            verdict.total_samples = summary.samples;
        }
        verdict.per_signal = parse_signals(&text);
        verdict.highlights = highlights(&text);
        verdict
    }
}

/// The simulator's mismatch summary line, if present.
pub fn parse_summary(text: &str) -> Option<MismatchSummary> {
    if let Some(caps) = SUMMARY.captures(text) {
        return Some(MismatchSummary {
            mismatches: caps[1].parse().ok()?,
            samples: caps[2].parse().ok(),
        });
    }
    let caps = TOTAL_MISMATCHED.captures(text)?;
    Some(MismatchSummary {
        mismatches: caps[1].parse().ok()?,
        samples: None,
    })
}

/// Per-signal mismatch lines. A signal reported twice keeps its last report.
pub fn parse_signals(text: &str) -> BTreeMap<String, SignalMismatch> {
    let mut signals = BTreeMap::new();
    for caps in SIGNAL.captures_iter(text) {
        let (Ok(count), Ok(first_mismatch_time)) = (caps[2].parse(), caps[3].parse()) else {
            continue;
        };
        signals.insert(
            caps[1].to_string(),
            SignalMismatch {
                count,
                first_mismatch_time,
            },
        );
    }
    signals
}

/// Lines the testbench prints to point at the problem.
pub fn highlights(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.contains("Hint:") || l.contains("Mismatches:") || l.starts_with("Total"))
        .map(str::to_string)
        .collect()
}
