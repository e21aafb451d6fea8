// src/evaluator/mod.rs — Outcome analysis, compile diagnostics and ranking

pub mod analyzer;
pub mod diagnostics;
pub mod ranker;

pub use analyzer::OutcomeAnalyzer;
pub use ranker::Rank;
