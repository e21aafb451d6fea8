// src/core/controller.rs — Feedback loop controller
//
// Init → Iterating → {Success, Exhausted}
//
// Each iteration: pick the scheduled model, request k candidates in one call,
// evaluate them (concurrently unless configured otherwise), pick the winner,
// update the best result, then either stop or replace the previous feedback
// round in the conversation. Run state is threaded through `step` as a value.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;

use super::conversation::Conversation;
use super::evaluation::{CandidateEvaluator, CandidateSlot};
use super::feedback::build_feedback;
use super::scheduler::ModelPlan;
use super::system_prompt::build_system_prompt;
use super::types::*;
use crate::evaluator::ranker::{self, Rank};
use crate::infra::config::RunSettings;
use crate::provider::registry::ProviderRegistry;
use crate::provider::{GenerateRequest, ModelRef};
use crate::util::preview;

/// Loop limits and request shaping.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub num_candidates: u32,
    pub parallel_candidates: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            num_candidates: 1,
            parallel_candidates: true,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl From<&RunSettings> for LoopConfig {
    fn from(settings: &RunSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            num_candidates: settings.num_candidates,
            parallel_candidates: settings.parallel_candidates,
            max_tokens: Some(settings.generation.max_tokens),
            temperature: settings.generation.temperature,
        }
    }
}

/// State carried from one iteration to the next.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Iterations completed so far.
    pub iteration: u32,
    pub best: BestResult,
    pub last_winner: Option<Arc<CandidateResponse>>,
}

/// Outcome of one iteration.
#[derive(Debug)]
pub enum Step {
    Continue(RunState),
    Done(RunStatus, RunState),
}

/// Drives the generate-evaluate-feedback loop for one design.
pub struct GenerationController {
    providers: ProviderRegistry,
    evaluator: CandidateEvaluator,
    models: ModelPlan,
    config: LoopConfig,
    outdir: PathBuf,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl GenerationController {
    pub fn new(
        providers: ProviderRegistry,
        evaluator: CandidateEvaluator,
        models: ModelPlan,
        config: LoopConfig,
        outdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            providers,
            evaluator,
            models,
            config,
            outdir: outdir.into(),
            on_progress: None,
        }
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Run the loop to completion for `prompt`.
    ///
    /// The conversation is reset and seeded here. Errors outside candidate
    /// evaluation (backend failures, directory creation, conversation mirror)
    /// end the run.
    pub async fn run(
        &self,
        prompt: &str,
        conversation: &mut Conversation,
    ) -> anyhow::Result<GenerationResult> {
        anyhow::ensure!(
            self.config.max_iterations > 0,
            "max_iterations must be at least 1"
        );

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        let system = build_system_prompt(self.evaluator.interface());
        conversation.seed(&system, prompt)?;
        tracing::info!(run_id = %run_id, max_iterations = self.config.max_iterations, "Generation run started");

        let mut state = RunState::default();
        let status = loop {
            match self.step(state, conversation).await? {
                Step::Continue(next) => state = next,
                Step::Done(status, last) => {
                    state = last;
                    break status;
                }
            }
        };

        let best = state.best.response.clone().or(state.last_winner.clone());
        let mismatch_count = best
            .as_ref()
            .map(|b| b.mismatch_count())
            .unwrap_or_default();
        let elapsed = start.elapsed();

        self.emit(ProgressEvent::Complete {
            status,
            iterations: state.iteration,
            best: mismatch_count,
            elapsed_secs: elapsed.as_secs_f64(),
        });
        tracing::info!(
            run_id = %run_id,
            %status,
            iterations = state.iteration,
            mismatches = %mismatch_count,
            "Generation run finished in {:.2}s",
            elapsed.as_secs_f64()
        );

        Ok(GenerationResult {
            run_id,
            status,
            best,
            mismatch_count,
            iterations: state.iteration,
            elapsed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run one iteration.
    pub async fn step(
        &self,
        mut state: RunState,
        conversation: &mut Conversation,
    ) -> anyhow::Result<Step> {
        let iteration = state.iteration;
        let model = self
            .models
            .select(iteration)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No model scheduled for iteration {}", iteration))?;

        self.emit(ProgressEvent::IterationStart {
            iteration: iteration + 1,
            max_iterations: self.config.max_iterations,
            model: model.to_string(),
        });
        tracing::info!(iteration = iteration + 1, model = %model, "Iteration start");

        let texts = self.request_candidates(&model, conversation).await?;
        let candidates = self
            .evaluate_all(iteration, &model, texts, state.best.mismatch_count, conversation)
            .await?;

        for c in &candidates {
            self.emit(ProgressEvent::CandidateEvaluated {
                iteration: iteration + 1,
                index: c.index,
                rank: c.rank,
                mismatches: c.mismatch_count(),
            });
        }

        // Every candidate is in; this is the selection barrier.
        let winner_idx = ranker::select_winner(&candidates)
            .ok_or_else(|| anyhow::anyhow!("Iteration {} produced no candidates", iteration))?;
        let winner = match candidates.into_iter().nth(winner_idx) {
            Some(w) => Arc::new(w),
            None => anyhow::bail!("Winner index {} out of range", winner_idx),
        };

        let previous_best = state.best.clone();
        if state.best.offer(&winner) {
            tracing::info!(
                iteration = iteration + 1,
                "New best: {} mismatches",
                state.best.mismatch_count
            );
        }
        state.last_winner = Some(Arc::clone(&winner));
        state.iteration += 1;

        self.emit(ProgressEvent::IterationEnd {
            iteration: iteration + 1,
            winner_rank: winner.rank,
            mismatches: winner.mismatch_count(),
            best: state.best.mismatch_count,
        });

        if winner.rank == Rank::Passed {
            return Ok(Step::Done(RunStatus::Success, state));
        }

        let feedback = build_feedback(&winner, &previous_best);
        let answer = if winner.source.is_empty() {
            winner.raw_text.as_str()
        } else {
            winner.source.as_str()
        };
        conversation.replace_round(answer, &feedback)?;
        tracing::debug!(
            "Feedback for iteration {}: {}",
            iteration + 1,
            preview(&feedback, 300)
        );

        if state.iteration >= self.config.max_iterations {
            return Ok(Step::Done(RunStatus::Exhausted, state));
        }
        Ok(Step::Continue(state))
    }

    async fn request_candidates(
        &self,
        model: &ModelRef,
        conversation: &Conversation,
    ) -> anyhow::Result<Vec<String>> {
        let provider = self.providers.get(&model.family)?;
        let mut request = GenerateRequest::new(
            model.model.clone(),
            conversation.messages().to_vec(),
            self.config.num_candidates,
        );
        request.max_tokens = self.config.max_tokens;
        request.temperature = self.config.temperature;

        let texts = provider.generate(request).await?;
        if (texts.len() as u32) < self.config.num_candidates {
            tracing::warn!(
                "{} returned {} of {} requested candidates",
                provider.name(),
                texts.len(),
                self.config.num_candidates
            );
        }
        Ok(texts)
    }

    async fn evaluate_all(
        &self,
        iteration: u32,
        model: &ModelRef,
        texts: Vec<String>,
        best: MismatchCount,
        conversation: &Conversation,
    ) -> anyhow::Result<Vec<CandidateResponse>> {
        let iter_dir = self.outdir.join(format!("iter{}", iteration));

        if texts.is_empty() {
            tokio::fs::create_dir_all(&iter_dir).await?;
            let mut c = CandidateResponse::new(iteration, 0, model.clone(), "");
            c.rank = Rank::InternalError;
            c.message = "Model backend returned no candidates".into();
            return Ok(vec![c]);
        }

        let mut slots = Vec::with_capacity(texts.len());
        for index in 0..texts.len() as u32 {
            let work_dir = iter_dir.join(format!("response{}", index));
            tokio::fs::create_dir_all(&work_dir).await?;
            slots.push(CandidateSlot {
                iteration,
                index,
                model: model.clone(),
                work_dir,
            });
        }

        let transcript = conversation.to_string();
        let evaluations = slots
            .iter()
            .zip(texts)
            .map(|(slot, text)| self.evaluator.evaluate(slot, text, best, &transcript));

        let candidates = if self.config.parallel_candidates {
            join_all(evaluations).await
        } else {
            let mut out = Vec::with_capacity(slots.len());
            for evaluation in evaluations {
                out.push(evaluation.await);
            }
            out
        };
        Ok(candidates)
    }
}
