// src/evaluator/ranker.rs — Candidate ranking and winner selection

use std::cmp::{Ordering, Reverse};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{CandidateResponse, MismatchCount, SimulationVerdict};

/// Outcome tier of one candidate, lowest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    #[default]
    Unranked,
    InternalError,
    ExtractionFailed,
    CompileFailed,
    SimulationIndeterminate,
    Mismatched,
    /// Mismatches remain but fewer than the best so far.
    Improved,
    Passed,
}

impl Rank {
    pub fn is_terminal(&self) -> bool {
        *self == Rank::Passed
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rank::Unranked => "unranked",
            Rank::InternalError => "internal_error",
            Rank::ExtractionFailed => "extraction_failed",
            Rank::CompileFailed => "compile_failed",
            Rank::SimulationIndeterminate => "indeterminate",
            Rank::Mismatched => "mismatched",
            Rank::Improved => "improved",
            Rank::Passed => "passed",
        };
        f.write_str(s)
    }
}

/// Rank a verdict relative to the best mismatch count seen so far.
pub fn rank(verdict: &SimulationVerdict, best: MismatchCount) -> Rank {
    if !verdict.compiled {
        return Rank::CompileFailed;
    }
    match verdict.mismatch_count {
        MismatchCount::Count(0) => Rank::Passed,
        count @ MismatchCount::Count(_) if count < best => Rank::Improved,
        MismatchCount::Count(_) => Rank::Mismatched,
        MismatchCount::Indeterminate => Rank::SimulationIndeterminate,
    }
}

/// Total order used to pick a winner: tier, then fewer mismatches, then the
/// longer normalized source.
///
/// Only the winner may replace the best result, so within a tier the lowest
/// count has to win or a strictly better candidate of this round is lost.
pub fn compare(a: &CandidateResponse, b: &CandidateResponse) -> Ordering {
    let key = |c: &CandidateResponse| (c.rank, Reverse(c.mismatch_count()), c.source_len());
    key(a).cmp(&key(b))
}

/// Index of the winning candidate. On a full tie the earliest candidate wins.
pub fn select_winner(candidates: &[CandidateResponse]) -> Option<usize> {
    let mut winner: Option<usize> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        match winner {
            Some(w) if compare(candidate, &candidates[w]) != Ordering::Greater => {}
            _ => winner = Some(i),
        }
    }
    winner
}
