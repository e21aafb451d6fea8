// src/cli/run.rs — Default command: generate a design for one prompt

use std::sync::Arc;

use anyhow::Context;

use super::progress::terminal_progress;
use crate::core::controller::{GenerationController, LoopConfig};
use crate::core::conversation::Conversation;
use crate::core::evaluation::CandidateEvaluator;
use crate::core::report;
use crate::core::types::GenerationResult;
use crate::evaluator::OutcomeAnalyzer;
use crate::extract::ModuleInterface;
use crate::infra::config::RunSettings;
use crate::provider::registry::ProviderRegistry;
use crate::toolchain::{create_toolchain, Toolchain};

/// Resolve backends and toolchain from `settings`, then run the loop.
///
/// Missing credentials, unknown families and a missing toolchain all fail
/// here, before the first request goes out.
pub async fn run_generation(settings: &RunSettings, quiet: bool) -> anyhow::Result<GenerationResult> {
    let providers =
        ProviderRegistry::resolve(settings.models.families(), settings.generation.retry)?;
    let toolchain = create_toolchain(&settings.toolchain)?;
    toolchain.check()?;
    tracing::debug!(
        backends = providers.len(),
        toolchain = toolchain.name(),
        "run dependencies resolved"
    );

    execute(settings, providers, toolchain, quiet).await
}

/// Run the loop with already-built backends and write the report.
pub async fn execute(
    settings: &RunSettings,
    providers: ProviderRegistry,
    toolchain: Arc<dyn Toolchain>,
    quiet: bool,
) -> anyhow::Result<GenerationResult> {
    let prompt = std::fs::read_to_string(&settings.prompt)
        .with_context(|| format!("reading prompt {}", settings.prompt.display()))?;
    let interface = ModuleInterface::from_prompt(&prompt);
    match interface {
        Some(ref i) => tracing::debug!(module = %i.name, "target interface found in prompt"),
        None => tracing::warn!(
            "No module declaration in {}; headerless replies cannot be wrapped",
            settings.prompt.display()
        ),
    }

    anyhow::ensure!(
        settings.testbench.is_file(),
        "testbench {} not found",
        settings.testbench.display()
    );
    let testbench = std::path::absolute(&settings.testbench)?;

    std::fs::create_dir_all(&settings.outdir)
        .with_context(|| format!("creating output directory {}", settings.outdir.display()))?;

    let analyzer = OutcomeAnalyzer::new(settings.toolchain.success_marker.clone());
    let evaluator = CandidateEvaluator::new(toolchain, analyzer, testbench, &settings.name, interface);

    let mut controller = GenerationController::new(
        providers,
        evaluator,
        settings.models.clone(),
        LoopConfig::from(settings),
        &settings.outdir,
    );
    if !quiet {
        controller = controller.with_progress(terminal_progress());
    }

    let mut conversation = Conversation::new(settings.log_file.clone())?;
    let result = controller.run(&prompt, &mut conversation).await?;

    let summary = report::write_report(
        &settings.outdir,
        &settings.name,
        &result,
        settings.max_iterations,
    )?;
    tracing::info!(
        status = %summary.status,
        design = ?summary.design_file,
        "Report written to {}",
        settings.outdir.display()
    );

    Ok(result)
}
