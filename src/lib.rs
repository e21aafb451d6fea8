// src/lib.rs — Library root for chiploop

pub mod cli;
pub mod core;
pub mod evaluator;
pub mod extract;
pub mod infra;
pub mod provider;
pub mod toolchain;
pub mod util;
