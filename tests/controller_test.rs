// tests/controller_test.rs — Integration test: feedback loop with scripted backend and toolchain

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chiploop::cli::run;
use chiploop::core::controller::{GenerationController, LoopConfig};
use chiploop::core::conversation::Conversation;
use chiploop::core::evaluation::{CandidateEvaluator, LOG_FILE};
use chiploop::core::report;
use chiploop::core::scheduler::{ModelPlan, ModelSchedule, ScheduleEntry};
use chiploop::core::types::{MismatchCount, ProgressEvent, RunStatus};
use chiploop::evaluator::{OutcomeAnalyzer, Rank};
use chiploop::extract::ModuleInterface;
use chiploop::infra::config::{Config, Overrides};
use chiploop::infra::errors::ChipLoopError;
use chiploop::provider::registry::ProviderRegistry;
use chiploop::provider::{GenerateRequest, ModelProvider, ModelRef, Role};
use chiploop::toolchain::{SimulationRun, Toolchain};

const PROMPT: &str = "Implement the module below.\n\
module top_module(input a, input b, output out);\n";

const DESIGN_NAME: &str = "top";

/// A backend that replays a fixed script of replies, one entry per call.
/// Once the script runs out the last entry repeats.
struct ScriptedProvider {
    script: Vec<Vec<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Vec<String>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted Provider"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        let mut requests = self.requests.lock().unwrap();
        let call = requests.len();
        requests.push(request);
        let reply = self
            .script
            .get(call)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_default();
        Ok(reply)
    }
}

struct FailingProvider;

#[async_trait]
impl ModelProvider for FailingProvider {
    fn id(&self) -> &str {
        "failing"
    }

    fn name(&self) -> &str {
        "Failing Provider"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<Vec<String>, ChipLoopError> {
        Err(ChipLoopError::Provider {
            provider: "failing".into(),
            message: "service unavailable".into(),
            retriable: false,
        })
    }
}

/// A toolchain that reads the written design back: `SYNTAX_ERROR` fails the
/// compile, and a `// expect N` line sets the simulated mismatch count.
/// Without that line the simulator prints no summary.
struct ScriptedToolchain;

impl ScriptedToolchain {
    fn expected_mismatches(design: &str) -> Option<u32> {
        design
            .lines()
            .find_map(|l| l.split("// expect ").nth(1))
            .and_then(|n| n.trim().parse().ok())
    }
}

#[async_trait]
impl Toolchain for ScriptedToolchain {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn compile(
        &self,
        _work_dir: &Path,
        design: &Path,
        _testbench: &Path,
    ) -> Result<String, ChipLoopError> {
        let text = std::fs::read_to_string(design)?;
        if text.contains("SYNTAX_ERROR") {
            Ok("Error: top.sv (4): Syntax error near 'SYNTAX_ERROR'.\nCompile failure 1 Errors 0 Warnings".into())
        } else {
            Ok("Compile success 0 Errors 0 Warnings".into())
        }
    }

    async fn simulate(&self, work_dir: &Path) -> Result<SimulationRun, ChipLoopError> {
        let text = std::fs::read_to_string(work_dir.join(format!("{}.sv", DESIGN_NAME)))?;
        let stdout = match Self::expected_mismatches(&text) {
            Some(n) => format!("Hint: Total mismatched samples is {}\nMismatches: {} in 100 samples", n, n),
            None => "Simulation finished without a summary".to_string(),
        };
        Ok(SimulationRun::completed(0, stdout, ""))
    }
}

fn design(expect: u32) -> String {
    format!(
        "```verilog\nmodule top_module(input a, input b, output out);\n  // expect {}\n  assign out = a & b;\nendmodule\n```",
        expect
    )
}

fn evaluator() -> CandidateEvaluator {
    CandidateEvaluator::new(
        Arc::new(ScriptedToolchain),
        OutcomeAnalyzer::default(),
        "tb.sv",
        DESIGN_NAME,
        ModuleInterface::from_prompt(PROMPT),
    )
}

fn static_plan() -> ModelPlan {
    ModelPlan::Static(ModelRef::new("mock", "mock-model"))
}

fn loop_config(max_iterations: u32, num_candidates: u32) -> LoopConfig {
    LoopConfig {
        max_iterations,
        num_candidates,
        ..LoopConfig::default()
    }
}

fn controller(
    provider: Arc<ScriptedProvider>,
    config: LoopConfig,
    outdir: &Path,
) -> GenerationController {
    let providers = ProviderRegistry::new().with_provider("mock", provider);
    GenerationController::new(providers, evaluator(), static_plan(), config, outdir)
}

// ─── Terminal states ────────────────────────────────────────

#[tokio::test]
async fn test_success_on_first_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec![design(0)]]);
    let ctrl = controller(provider.clone(), loop_config(3, 1), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert!(result.success());
    assert_eq!(result.iterations, 1);
    assert_eq!(result.mismatch_count, MismatchCount::Count(0));
    assert_eq!(provider.requests().len(), 1);

    let source = result.best_source().unwrap();
    assert!(source.starts_with("`timescale 1ns / 1ps\n"));
    assert!(source.contains("module top_module(input a, input b, output out);"));
    assert!(!source.contains("```"));

    // No feedback round after a pass.
    assert_eq!(conversation.len(), 2);
}

#[tokio::test]
async fn test_exhausted_after_budget() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec![design(2)]]);
    let ctrl = controller(provider.clone(), loop_config(3, 1), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();

    assert_eq!(result.status, RunStatus::Exhausted);
    assert!(!result.success());
    assert_eq!(result.iterations, 3);
    assert_eq!(result.mismatch_count, MismatchCount::Count(2));
    assert_eq!(provider.requests().len(), 3);

    // Equal counts never replace the best, so the first answer is kept.
    let best = result.best.unwrap();
    assert_eq!(best.iteration, 0);
    assert_eq!(best.rank, Rank::Improved);
}

// ─── Conversation shape ─────────────────────────────────────

#[tokio::test]
async fn test_conversation_keeps_one_feedback_round() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec![design(2)]]);
    let ctrl = controller(provider.clone(), loop_config(4, 1), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    ctrl.run(PROMPT, &mut conversation).await.unwrap();
    assert_eq!(conversation.len(), 4);

    let requests = provider.requests();
    assert_eq!(requests[0].messages.len(), 2);
    for request in &requests[1..] {
        assert_eq!(request.messages.len(), 4);
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(request.messages[1].content, PROMPT);
        assert!(request.messages[3]
            .content
            .contains("Detected 2 mismatches out of 100 samples"));
    }
}

#[tokio::test]
async fn test_feedback_reports_improvement() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        vec![design(5)],
        vec![design(1)],
        vec![design(0)],
    ]);
    let ctrl = controller(provider.clone(), loop_config(5, 1), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.iterations, 3);

    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[2].messages[2].content.contains("// expect 1"));
    assert!(requests[2].messages[3]
        .content
        .contains("Improvement found: 5 -> 1 mismatches"));
}

#[tokio::test]
async fn test_extraction_failure_feeds_back_raw_reply() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec!["I cannot do that.".to_string()]]);
    let ctrl = controller(provider.clone(), loop_config(2, 1), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();

    assert_eq!(result.status, RunStatus::Exhausted);
    assert_eq!(result.mismatch_count, MismatchCount::Indeterminate);
    assert_eq!(result.best.unwrap().rank, Rank::ExtractionFailed);

    let requests = provider.requests();
    assert_eq!(requests[1].messages[2].content, "I cannot do that.");
    assert!(requests[1].messages[3]
        .content
        .contains("No valid output produced"));
}

#[tokio::test]
async fn test_fragment_reply_is_wrapped_in_prompt_interface() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec![
        "assign out = a & b;\n// expect 0".to_string(),
    ]]);
    let ctrl = controller(provider, loop_config(2, 1), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    let source = result.best_source().unwrap();
    assert!(source.contains("module top_module(\ninput a, input b, output out\n);"));
    assert!(source.contains("assign out = a & b;"));
    assert!(source.trim_end().ends_with("endmodule"));
}

// ─── Candidates ─────────────────────────────────────────────

#[tokio::test]
async fn test_best_candidate_wins_the_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec![
        design(4),
        design(0).replace("assign", "SYNTAX_ERROR assign"),
        design(1),
    ]]);
    let ctrl = controller(provider.clone(), loop_config(1, 3), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();

    assert_eq!(result.status, RunStatus::Exhausted);
    assert_eq!(result.mismatch_count, MismatchCount::Count(1));
    let best = result.best.unwrap();
    assert_eq!(best.index, 2);
    assert_eq!(provider.requests()[0].num_candidates, 3);

    for index in 0..3 {
        let work_dir = dir.path().join("iter0").join(format!("response{}", index));
        assert!(work_dir.join("top.sv").is_file());
        assert!(work_dir.join(LOG_FILE).is_file());
    }
}

#[tokio::test]
async fn test_sequential_matches_parallel() {
    let script = vec![vec![design(3), design(2)]];

    let dir = tempfile::tempdir().unwrap();
    let parallel = controller(
        ScriptedProvider::new(script.clone()),
        loop_config(1, 2),
        &dir.path().join("parallel"),
    );
    let mut config = loop_config(1, 2);
    config.parallel_candidates = false;
    let sequential = controller(
        ScriptedProvider::new(script),
        config,
        &dir.path().join("sequential"),
    );

    let mut c1 = Conversation::new(None).unwrap();
    let mut c2 = Conversation::new(None).unwrap();
    let a = parallel.run(PROMPT, &mut c1).await.unwrap();
    let b = sequential.run(PROMPT, &mut c2).await.unwrap();

    assert_eq!(a.mismatch_count, b.mismatch_count);
    assert_eq!(a.best.unwrap().index, b.best.unwrap().index);
}

#[tokio::test]
async fn test_candidate_log_records_rank_and_model() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec![design(2)]]);
    let ctrl = controller(provider, loop_config(1, 1), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    ctrl.run(PROMPT, &mut conversation).await.unwrap();

    let log = std::fs::read_to_string(dir.path().join("iter0/response0").join(LOG_FILE)).unwrap();
    assert!(log.starts_with("system: "));
    assert!(log.contains("\nassistant: ```verilog"));
    assert!(log.contains(" Iteration rank: improved"));
    assert!(log.contains(" Model: mock/mock-model"));
    assert!(log.contains(" Mismatches: 2"));
}

#[tokio::test]
async fn test_empty_reply_is_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![vec![]]);
    let ctrl = controller(provider, loop_config(1, 2), dir.path());

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();

    assert_eq!(result.status, RunStatus::Exhausted);
    assert_eq!(result.best.unwrap().rank, Rank::InternalError);
    assert!(dir.path().join("iter0").is_dir());
}

// ─── Models and errors ──────────────────────────────────────

#[tokio::test]
async fn test_mixed_schedule_switches_models() {
    let dir = tempfile::tempdir().unwrap();
    let small = ScriptedProvider::new(vec![vec![design(2)]]);
    let large = ScriptedProvider::new(vec![vec![design(2)]]);
    let providers = ProviderRegistry::new()
        .with_provider("alpha", small.clone())
        .with_provider("beta", large.clone());
    let schedule = ModelSchedule::from_entries(vec![
        ScheduleEntry {
            name: "small".into(),
            model: ModelRef::new("alpha", "alpha-mini"),
            start_iteration: 0,
        },
        ScheduleEntry {
            name: "large".into(),
            model: ModelRef::new("beta", "beta-max"),
            start_iteration: 2,
        },
    ]);
    let ctrl = GenerationController::new(
        providers,
        evaluator(),
        ModelPlan::Mixed(schedule),
        loop_config(3, 1),
        dir.path(),
    );

    let mut conversation = Conversation::new(None).unwrap();
    let result = ctrl.run(PROMPT, &mut conversation).await.unwrap();
    assert_eq!(result.iterations, 3);

    let small_requests = small.requests();
    let large_requests = large.requests();
    assert_eq!(small_requests.len(), 2);
    assert_eq!(large_requests.len(), 1);
    assert!(small_requests.iter().all(|r| r.model == "alpha-mini"));
    assert_eq!(large_requests[0].model, "beta-max");
}

#[tokio::test]
async fn test_backend_error_ends_run() {
    let dir = tempfile::tempdir().unwrap();
    let providers = ProviderRegistry::new().with_provider("mock", Arc::new(FailingProvider));
    let ctrl = GenerationController::new(
        providers,
        evaluator(),
        static_plan(),
        loop_config(3, 1),
        dir.path(),
    );

    let mut conversation = Conversation::new(None).unwrap();
    let err = ctrl.run(PROMPT, &mut conversation).await.unwrap_err();
    assert!(err.to_string().contains("service unavailable"));
}

#[tokio::test]
async fn test_progress_events_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let ctrl = controller(
        ScriptedProvider::new(vec![vec![design(0)]]),
        loop_config(2, 1),
        dir.path(),
    )
    .with_progress(move |e| sink.lock().unwrap().push(e));

    let mut conversation = Conversation::new(None).unwrap();
    ctrl.run(PROMPT, &mut conversation).await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], ProgressEvent::IterationStart { iteration: 1, .. }));
    assert!(matches!(
        events[1],
        ProgressEvent::CandidateEvaluated {
            rank: Rank::Passed,
            ..
        }
    ));
    assert!(matches!(events[2], ProgressEvent::IterationEnd { .. }));
    assert!(matches!(
        events[3],
        ProgressEvent::Complete {
            status: RunStatus::Success,
            iterations: 1,
            ..
        }
    ));
}

// ─── End to end through the run command ─────────────────────

fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let prompt = dir.join("prompt.v");
    let testbench = dir.join("tb.sv");
    std::fs::write(&prompt, PROMPT).unwrap();
    std::fs::write(&testbench, "module tb; endmodule\n").unwrap();
    (prompt, testbench)
}

fn overrides(dir: &Path, prompt: PathBuf, testbench: PathBuf) -> Overrides {
    Overrides {
        prompt: Some(prompt),
        name: Some(DESIGN_NAME.into()),
        testbench: Some(testbench),
        iterations: Some(3),
        model_family: Some("mock".into()),
        model_id: Some("mock-model".into()),
        outdir: Some(dir.join("out")),
        log: Some("conversation.log".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_run_writes_design_summary_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let (prompt, testbench) = write_inputs(dir.path());
    let settings = Config::default()
        .resolve(&overrides(dir.path(), prompt, testbench))
        .unwrap();

    let provider = ScriptedProvider::new(vec![vec![design(3)], vec![design(0)]]);
    let providers = ProviderRegistry::new().with_provider("mock", provider);
    let result = run::execute(&settings, providers, Arc::new(ScriptedToolchain), true)
        .await
        .unwrap();
    assert!(result.success());

    let outdir = dir.path().join("out");
    let summary = report::read_summary(&outdir).unwrap();
    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.max_iterations, 3);
    assert_eq!(summary.best_mismatches, Some(0));
    assert_eq!(summary.best_iteration, Some(2));
    assert_eq!(summary.best_model.as_deref(), Some("mock/mock-model"));

    let design_file = summary.design_file.unwrap();
    assert_eq!(design_file, outdir.join("top.sv"));
    assert_eq!(
        std::fs::read_to_string(design_file).unwrap(),
        result.best_source().unwrap()
    );

    let log = std::fs::read_to_string(outdir.join("conversation.log")).unwrap();
    assert!(log.starts_with("system: "));
    assert!(log.contains("assistant: "));
    assert!(log.contains("user: Detected 3 mismatches out of 100 samples"));
}

#[tokio::test]
async fn test_run_requires_testbench() {
    let dir = tempfile::tempdir().unwrap();
    let (prompt, testbench) = write_inputs(dir.path());
    std::fs::remove_file(&testbench).unwrap();
    let settings = Config::default()
        .resolve(&overrides(dir.path(), prompt, testbench))
        .unwrap();

    let providers = ProviderRegistry::new()
        .with_provider("mock", ScriptedProvider::new(vec![vec![design(0)]]));
    let err = run::execute(&settings, providers, Arc::new(ScriptedToolchain), true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("testbench"));
}
