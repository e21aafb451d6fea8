// src/main.rs — chiploop entry point

use clap::Parser;

use chiploop::cli::{run, Cli};
use chiploop::core::types::GenerationResult;
use chiploop::infra::config::Config;
use chiploop::infra::logger;

/// Exit status when the iteration budget ran out without a passing design.
const EXIT_EXHAUSTED: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(logger::level_for(cli.verbose, cli.quiet));

    match execute(&cli).await {
        Ok(result) => {
            if let Some(source) = result.best_source() {
                print!("{}", source);
            }
            if !cli.quiet {
                print_summary(&result);
            }
            if !result.success() {
                std::process::exit(EXIT_EXHAUSTED);
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn execute(cli: &Cli) -> anyhow::Result<GenerationResult> {
    // Load config (falls back to defaults if no chiploop.toml)
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let settings = config.resolve(&cli.overrides())?;
    tracing::debug!(?settings, "run settings resolved");

    run::run_generation(&settings, cli.quiet).await
}

fn print_summary(result: &GenerationResult) {
    eprintln!();
    eprintln!(
        "{} after {} iteration(s), best mismatches: {}, {:.1}s",
        result.status,
        result.iterations,
        result.mismatch_count,
        result.elapsed.as_secs_f64()
    );
    if let Some(ref best) = result.best {
        eprintln!(
            "best candidate: iteration {} response {} ({})",
            best.iteration + 1,
            best.index,
            best.model
        );
    }
}
