// src/core/scheduler.rs — Which model is active on which iteration
//
// Static mode pins one model for the whole run. Mixed mode hands the run from
// model to model at fixed iteration offsets: the entry with the largest
// `start_iteration` not after the current iteration wins.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::infra::errors::ChipLoopError;
use crate::provider::ModelRef;

/// One mixed-mode entry as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixedModelEntry {
    pub start_iteration: i64,
    pub model_family: String,
    pub model_id: String,
}

/// A validated schedule entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub name: String,
    pub model: ModelRef,
    pub start_iteration: u32,
}

/// Validated mixed-model schedule, kept sorted by `start_iteration` descending.
#[derive(Debug, Clone, Default)]
pub struct ModelSchedule {
    entries: Vec<ScheduleEntry>,
}

/// Resolve a possibly negative start offset against the iteration budget.
///
/// Negative values count back from the end: `-1` is the last slot
/// (`max_iterations`), `-(max_iterations + 1)` is iteration 0.
pub fn normalize_start(start: i64, max_iterations: u32) -> i64 {
    if start < 0 {
        start + i64::from(max_iterations) + 1
    } else {
        start
    }
}

impl ModelSchedule {
    /// Normalize and validate raw configuration entries.
    ///
    /// Every resolved start must lie in `[0, max_iterations]`, no two entries may
    /// share a start, and exactly one entry must start at 0.
    pub fn validate(
        raw: &BTreeMap<String, MixedModelEntry>,
        max_iterations: u32,
    ) -> Result<Self, ChipLoopError> {
        let mut seen: HashSet<u32> = HashSet::new();
        let mut entries = Vec::with_capacity(raw.len());

        for (name, info) in raw {
            let resolved = normalize_start(info.start_iteration, max_iterations);
            if !(0..=i64::from(max_iterations)).contains(&resolved) {
                return Err(ChipLoopError::ScheduleStart {
                    model: name.clone(),
                    start: info.start_iteration,
                    max_iterations,
                });
            }
            let start = resolved as u32;
            if !seen.insert(start) {
                return Err(ChipLoopError::ScheduleConflict {
                    model: name.clone(),
                    start,
                });
            }
            entries.push(ScheduleEntry {
                name: name.clone(),
                model: ModelRef::new(&info.model_family, &info.model_id),
                start_iteration: start,
            });
        }

        if !seen.contains(&0) {
            return Err(ChipLoopError::NoInitialModel);
        }

        let schedule = Self::from_entries(entries);
        for entry in schedule.unreachable(max_iterations) {
            tracing::warn!(
                model = %entry.name,
                start = entry.start_iteration,
                max_iterations,
                "schedule entry starts after the last iteration and is never used"
            );
        }
        Ok(schedule)
    }

    /// Entries that start at or after `max_iterations`. Iterations run
    /// `0..max_iterations`, so these are accepted but never selected.
    pub fn unreachable(&self, max_iterations: u32) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.start_iteration >= max_iterations)
            .collect()
    }

    /// Build from already-resolved entries without validation.
    pub fn from_entries(mut entries: Vec<ScheduleEntry>) -> Self {
        entries.sort_by(|a, b| b.start_iteration.cmp(&a.start_iteration));
        Self { entries }
    }

    /// The model active on `iteration` (0-based), or `None` for an empty schedule.
    pub fn select(&self, iteration: u32) -> Option<&ModelRef> {
        self.entries
            .iter()
            .find(|e| e.start_iteration <= iteration)
            .map(|e| &e.model)
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How the controller picks a model each iteration.
#[derive(Debug, Clone)]
pub enum ModelPlan {
    Static(ModelRef),
    Mixed(ModelSchedule),
}

impl ModelPlan {
    pub fn select(&self, iteration: u32) -> Option<&ModelRef> {
        match self {
            ModelPlan::Static(model) => Some(model),
            ModelPlan::Mixed(schedule) => schedule.select(iteration),
        }
    }

    /// Every family the plan can reach, for up-front backend resolution.
    pub fn families(&self) -> Vec<&str> {
        match self {
            ModelPlan::Static(model) => vec![model.family.as_str()],
            ModelPlan::Mixed(schedule) => schedule
                .entries()
                .iter()
                .map(|e| e.model.family.as_str())
                .collect(),
        }
    }
}
