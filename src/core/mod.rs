// src/core/mod.rs — Generation loop engine

pub mod controller;
pub mod conversation;
pub mod evaluation;
pub mod feedback;
pub mod report;
pub mod scheduler;
pub mod system_prompt;
pub mod types;
