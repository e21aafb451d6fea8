// src/core/feedback.rs — Next-round user message built from the winning candidate
//
// What the model is told depends on how its winning answer failed:
//   - extraction failed  → ask for a complete module
//   - compile failed     → categorized errors, verbatim compiler text, best design so far
//   - indeterminate      → simulation could not be completed
//   - mismatched         → counts, per-signal timing, improvement against the best so far
//   - internal error     → the error description

use std::collections::BTreeMap;

use super::types::{BestResult, CandidateResponse, MismatchCount, SignalMismatch, SimulationVerdict};
use crate::evaluator::analyzer::EARLY_MISMATCH_TIME;
use crate::evaluator::diagnostics;
use crate::evaluator::ranker::Rank;

/// Build the feedback for `winner`. `best` is the best-result state as it was
/// before this iteration's winner was considered.
pub fn build_feedback(winner: &CandidateResponse, best: &BestResult) -> String {
    match winner.rank {
        Rank::Unranked | Rank::InternalError => internal_error(winner),
        Rank::ExtractionFailed => no_valid_output(),
        Rank::CompileFailed => compile_failure(&winner.message, best),
        Rank::SimulationIndeterminate => indeterminate(winner, best),
        Rank::Mismatched | Rank::Improved | Rank::Passed => match winner.verdict {
            Some(ref verdict) => mismatches(verdict, best),
            None => internal_error(winner),
        },
    }
}

fn internal_error(winner: &CandidateResponse) -> String {
    let reason = if winner.message.trim().is_empty() {
        "unknown error"
    } else {
        winner.message.trim()
    };
    format!(
        "Your previous answer could not be evaluated: {}\n\
         Please provide the complete module again.",
        reason
    )
}

fn no_valid_output() -> String {
    "No valid output produced: the previous reply contained no recognizable module.\n\
     Reply with the complete module, from `module` to `endmodule`, using the given interface."
        .to_string()
}

fn compile_failure(compile_text: &str, best: &BestResult) -> String {
    let mut out = String::from("Compilation failed. Analysis:\n");
    match diagnostics::describe(&diagnostics::categorize(compile_text)) {
        Some(analysis) => out.push_str(&analysis),
        None => out.push_str("- No known error pattern recognized; read the compiler output below"),
    }
    out.push_str("\n\nOriginal compilation errors:\n");
    out.push_str(compile_text.trim());
    out.push_str("\n\n");
    push_best(&mut out, best);
    out
}

fn indeterminate(winner: &CandidateResponse, best: &BestResult) -> String {
    let timed_out = winner.verdict.as_ref().is_some_and(|v| v.timed_out);
    let mut out = if timed_out {
        String::from("The design compiled but the simulation timed out before completing.\n")
    } else {
        String::from("The design compiled but the simulation could not be completed.\n")
    };
    if !winner.message.trim().is_empty() {
        out.push_str("Simulator output:\n");
        out.push_str(winner.message.trim());
        out.push('\n');
    }
    out.push_str("Check that the top module and its ports match the interface exactly.\n\n");
    push_best(&mut out, best);
    out
}

fn mismatches(verdict: &SimulationVerdict, best: &BestResult) -> String {
    let mut lines: Vec<String> = Vec::new();

    let count = verdict.mismatch_count;
    match verdict.total_samples {
        Some(samples) => lines.push(format!(
            "Detected {} mismatches out of {} samples",
            count, samples
        )),
        None => lines.push(format!("Detected {} mismatches", count)),
    }

    for (signal, data) in verdict.per_signal.iter().filter(|(_, d)| d.count > 0) {
        lines.push(format!(
            "- Signal {}: {} mismatches, first occurred at time {}",
            signal, data.count, data.first_mismatch_time
        ));
    }

    let (early, late) = split_by_time(&verdict.per_signal);
    if !early.is_empty() {
        lines.push(format!(
            "Signals failing early (check initialization): {}",
            early.join(", ")
        ));
    }
    if !late.is_empty() {
        lines.push(format!("Signals failing during operation: {}", late.join(", ")));
    }

    if count < best.mismatch_count {
        lines.push(String::new());
        lines.push(format!(
            "Improvement found: {} -> {} mismatches",
            best.mismatch_count, count
        ));
        let previous = best.per_signal();
        let improved = improved_signals(&verdict.per_signal, &previous);
        if !improved.is_empty() {
            lines.push("Changes in signal behavior:".into());
            lines.extend(improved);
        }
    } else if let MismatchCount::Count(best_count) = best.mismatch_count {
        lines.push(String::new());
        lines.push(format!(
            "No improvement: the best design so far has {} mismatches. Keep what it does right.",
            best_count
        ));
    }

    if !verdict.highlights.is_empty() {
        lines.push(String::new());
        lines.push("Testbench output:".into());
        lines.extend(verdict.highlights.iter().cloned());
    }

    lines.push(String::new());
    lines.push("Fix the remaining mismatches and reply with the complete corrected module.".into());
    lines.join("\n")
}

fn split_by_time(signals: &BTreeMap<String, SignalMismatch>) -> (Vec<&str>, Vec<&str>) {
    let failing = signals.iter().filter(|(_, d)| d.count > 0);
    let (early, late): (Vec<_>, Vec<_>) =
        failing.partition(|(_, d)| d.first_mismatch_time < EARLY_MISMATCH_TIME);
    (
        early.into_iter().map(|(s, _)| s.as_str()).collect(),
        late.into_iter().map(|(s, _)| s.as_str()).collect(),
    )
}

fn improved_signals(
    current: &BTreeMap<String, SignalMismatch>,
    previous: &BTreeMap<String, SignalMismatch>,
) -> Vec<String> {
    current
        .iter()
        .filter_map(|(signal, now)| match previous.get(signal) {
            Some(before) if now.count < before.count => Some(format!(
                "- {} improved: {} -> {} mismatches",
                signal, before.count, now.count
            )),
            None => Some(format!("- {} improved: inf -> {} mismatches", signal, now.count)),
            _ => None,
        })
        .collect()
}

fn push_best(out: &mut String, best: &BestResult) {
    match (best.mismatch_count, best.source()) {
        (MismatchCount::Count(n), Some(source)) => {
            out.push_str(&format!("Previous best approach had {} mismatches.\n", n));
            out.push_str("Best working code so far:\n");
            out.push_str(source);
        }
        _ => out.push_str("No working solution yet."),
    }
}
