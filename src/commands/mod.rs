//! Top-level command orchestration: running, listing and completions.
pub mod completions;
pub mod list;
pub mod run;

pub use run::{RunEnv, RunReport};
