// src/infra/config.rs — Configuration loading (TOML, or JSON by extension)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::scheduler::{MixedModelEntry, ModelPlan, ModelSchedule};
use crate::infra::errors::ChipLoopError;
use crate::provider::ModelRef;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "chiploop.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Named schedule entries, only consulted when `general.mixed-models` is set.
    #[serde(default, rename = "mixed-models")]
    pub mixed_models: BTreeMap<String, MixedModelEntry>,

    #[serde(default)]
    pub toolchain: ToolchainConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub prompt: Option<PathBuf>,
    pub name: Option<String>,
    pub testbench: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub log: Option<String>,
    pub iterations: Option<u32>,
    pub num_candidates: Option<u32>,
    pub model_family: Option<String>,
    pub model_id: Option<String>,
    #[serde(default, rename = "mixed-models")]
    pub mixed_models: bool,
    #[serde(default = "default_true")]
    pub parallel_candidates: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            prompt: None,
            name: None,
            testbench: None,
            outdir: None,
            log: None,
            iterations: None,
            num_candidates: None,
            model_family: None,
            model_id: None,
            mixed_models: false,
            parallel_candidates: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Text whose presence in the compiler output means the compile succeeded.
    #[serde(default = "default_success_marker")]
    pub success_marker: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_top_module")]
    pub top_module: String,
    #[serde(default = "default_work_library")]
    pub work_library: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            success_marker: default_success_marker(),
            timeout_seconds: default_timeout_seconds(),
            top_module: default_top_module(),
            work_library: default_work_library(),
        }
    }
}

impl ToolchainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    #[serde(default = "default_true")]
    pub retry: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: None,
            retry: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_backend() -> String {
    "riviera".into()
}

fn default_success_marker() -> String {
    "0 Errors".into()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_top_module() -> String {
    "top_module".into()
}

fn default_work_library() -> String {
    "work".into()
}

fn default_max_tokens() -> u32 {
    4096
}

pub const DEFAULT_ITERATIONS: u32 = 10;
pub const DEFAULT_NUM_CANDIDATES: u32 = 1;

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub prompt: Option<PathBuf>,
    pub name: Option<String>,
    pub testbench: Option<PathBuf>,
    pub iterations: Option<u32>,
    pub model_family: Option<String>,
    pub model_id: Option<String>,
    pub num_candidates: Option<u32>,
    pub outdir: Option<PathBuf>,
    pub log: Option<String>,
    pub sequential: bool,
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub prompt: PathBuf,
    pub name: String,
    pub testbench: PathBuf,
    pub outdir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub max_iterations: u32,
    pub num_candidates: u32,
    pub models: ModelPlan,
    pub parallel_candidates: bool,
    pub toolchain: ToolchainConfig,
    pub generation: GenerationConfig,
}

impl Config {
    /// Load `chiploop.toml` from the working directory, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config: Config = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(config)
    }

    /// Merge command-line overrides and validate into [`RunSettings`].
    pub fn resolve(&self, overrides: &Overrides) -> Result<RunSettings, ChipLoopError> {
        let g = &self.general;

        let prompt = overrides.prompt.clone().or_else(|| g.prompt.clone());
        let name = overrides.name.clone().or_else(|| g.name.clone());
        let testbench = overrides.testbench.clone().or_else(|| g.testbench.clone());
        let outdir = overrides.outdir.clone().or_else(|| g.outdir.clone());
        let log = overrides.log.clone().or_else(|| g.log.clone());
        let family = overrides
            .model_family
            .clone()
            .or_else(|| g.model_family.clone());
        let model_id = overrides.model_id.clone().or_else(|| g.model_id.clone());

        let max_iterations = overrides
            .iterations
            .or(g.iterations)
            .unwrap_or(DEFAULT_ITERATIONS);
        let num_candidates = overrides
            .num_candidates
            .or(g.num_candidates)
            .unwrap_or(DEFAULT_NUM_CANDIDATES);

        if max_iterations == 0 {
            return Err(ChipLoopError::Config("iterations must be at least 1".into()));
        }
        if num_candidates == 0 {
            return Err(ChipLoopError::Config(
                "num_candidates must be at least 1".into(),
            ));
        }

        let mixed = g.mixed_models && !self.mixed_models.is_empty();
        let models = if mixed {
            ModelPlan::Mixed(ModelSchedule::validate(&self.mixed_models, max_iterations)?)
        } else {
            let family = require(family, "model_family")?;
            let model_id = require(model_id, "model_id")?;
            ModelPlan::Static(ModelRef::new(family, model_id))
        };

        let outdir = require(outdir, "outdir")?;
        let log_file = log.filter(|l| !l.trim().is_empty()).map(|l| outdir.join(l));

        Ok(RunSettings {
            prompt: require(prompt, "prompt")?,
            name: require(name, "name")?,
            testbench: require(testbench, "testbench")?,
            outdir,
            log_file,
            max_iterations,
            num_candidates,
            models,
            parallel_candidates: g.parallel_candidates && !overrides.sequential,
            toolchain: self.toolchain.clone(),
            generation: self.generation.clone(),
        })
    }
}

fn require<T>(value: Option<T>, key: &str) -> Result<T, ChipLoopError> {
    value.ok_or_else(|| ChipLoopError::Config(format!("missing required value '{}'", key)))
}
