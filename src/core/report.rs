// src/core/report.rs — Final run artifacts
//
// Writes `<outdir>/<name>.sv` (best design) and `<outdir>/summary.json`.
// summary.json is written atomically (temp file + rename) so a monitor never
// sees a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::types::{GenerationResult, RunStatus};

pub const SUMMARY_FILE: &str = "summary.json";

/// JSON structure written to `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub success: bool,
    pub iterations: u32,
    pub max_iterations: u32,
    /// `None` when no explicit mismatch count was ever produced.
    pub best_mismatches: Option<u32>,
    pub best_iteration: Option<u32>,
    pub best_candidate: Option<u32>,
    pub best_model: Option<String>,
    pub design_file: Option<PathBuf>,
    pub elapsed_secs: f64,
    pub started_at: String,
    pub finished_at: String,
}

impl RunSummary {
    pub fn new(result: &GenerationResult, max_iterations: u32, design_file: Option<PathBuf>) -> Self {
        let best = result.best.as_ref();
        Self {
            run_id: result.run_id.clone(),
            status: result.status,
            success: result.success(),
            iterations: result.iterations,
            max_iterations,
            best_mismatches: result.mismatch_count.count(),
            // Iterations are reported 1-based, matching progress output.
            best_iteration: best.map(|b| b.iteration + 1),
            best_candidate: best.map(|b| b.index),
            best_model: best.map(|b| b.model.to_string()),
            design_file,
            elapsed_secs: result.elapsed.as_secs_f64(),
            started_at: result.started_at.to_rfc3339(),
            finished_at: result.finished_at.to_rfc3339(),
        }
    }
}

/// Write the best design and the run summary under `outdir`.
pub fn write_report(
    outdir: &Path,
    name: &str,
    result: &GenerationResult,
    max_iterations: u32,
) -> anyhow::Result<RunSummary> {
    std::fs::create_dir_all(outdir)?;

    let design_file = match result.best_source().filter(|s| !s.is_empty()) {
        Some(source) => {
            let path = outdir.join(format!("{}.sv", name));
            std::fs::write(&path, source)?;
            Some(path)
        }
        None => None,
    };

    let summary = RunSummary::new(result, max_iterations, design_file);
    write_summary(outdir, &summary)?;
    Ok(summary)
}

fn write_summary(outdir: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    let tmp = outdir.join(".summary.json.tmp");
    let dst = outdir.join(SUMMARY_FILE);

    let mut f = std::fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    f.flush()?;
    f.sync_all()?;
    std::fs::rename(&tmp, &dst)?;
    Ok(())
}

/// Read back a summary (used by tests and external tooling).
pub fn read_summary(outdir: &Path) -> anyhow::Result<RunSummary> {
    let content = std::fs::read_to_string(outdir.join(SUMMARY_FILE))?;
    Ok(serde_json::from_str(&content)?)
}
