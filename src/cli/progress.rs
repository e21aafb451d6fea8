// src/cli/progress.rs — Terminal progress renderer for real-time run feedback

use crate::core::types::ProgressEvent;

/// Build a progress callback that writes formatted output to stderr.
///
/// All progress output goes to stderr so stdout carries only the final design.
/// Returns a closure suitable for `GenerationController::with_progress()`.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", format_event(&event))
}

/// One line of progress text per event.
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::IterationStart {
            iteration,
            max_iterations,
            model,
        } => format!("[iter {}/{}] requesting candidates from {}...", iteration, max_iterations, model),
        ProgressEvent::CandidateEvaluated {
            iteration,
            index,
            rank,
            mismatches,
        } => format!(
            "[iter {}]   candidate {}: {:<17} mismatches={}",
            iteration, index, rank, mismatches
        ),
        ProgressEvent::IterationEnd {
            iteration,
            winner_rank,
            mismatches,
            best,
        } => format!(
            "[iter {}] winner={} mismatches={} best={}",
            iteration, winner_rank, mismatches, best
        ),
        ProgressEvent::Complete {
            status,
            iterations,
            best,
            elapsed_secs,
        } => format!(
            "[done] {} iterations={} best_mismatches={} time={:.2}s",
            status, iterations, best, elapsed_secs
        ),
    }
}
