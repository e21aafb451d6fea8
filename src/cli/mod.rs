// src/cli/mod.rs — CLI definition (clap derive)

pub mod progress;
pub mod run;

use std::path::PathBuf;

use clap::Parser;

use crate::infra::config::Overrides;

#[derive(Parser, Debug)]
#[command(
    name = "chiploop",
    about = "Generate a Verilog module with a language model, verified by compile and simulation",
    version
)]
pub struct Cli {
    /// Config file path (TOML, or JSON when the extension is .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Design prompt file (should contain the target module declaration)
    #[arg(short, long)]
    pub prompt: Option<PathBuf>,

    /// Base name for generated design files
    #[arg(short, long)]
    pub name: Option<String>,

    /// Testbench file compiled alongside every candidate
    #[arg(short, long)]
    pub testbench: Option<PathBuf>,

    /// Iteration budget
    #[arg(short, long = "iter")]
    pub iterations: Option<u32>,

    /// Model family (openai, anthropic, google, ollama, human, or an alias)
    #[arg(short = 'f', long)]
    pub model_family: Option<String>,

    /// Model identifier within the family
    #[arg(short = 'm', long)]
    pub model_id: Option<String>,

    /// Candidates requested per iteration
    #[arg(short = 'k', long)]
    pub num_candidates: Option<u32>,

    /// Output directory for per-iteration designs, logs and the summary
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Conversation log file name, created inside the output directory
    #[arg(short, long)]
    pub log: Option<String>,

    /// Evaluate candidates one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Suppress progress output (only emit the final design)
    #[arg(long)]
    pub quiet: bool,

    /// Log iteration milestones
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Values that take precedence over the config file.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            prompt: self.prompt.clone(),
            name: self.name.clone(),
            testbench: self.testbench.clone(),
            iterations: self.iterations,
            model_family: self.model_family.clone(),
            model_id: self.model_id.clone(),
            num_candidates: self.num_candidates,
            outdir: self.outdir.clone(),
            log: self.log.clone(),
            sequential: self.sequential,
        }
    }
}
