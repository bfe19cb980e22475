//! Core tasks: messages, variables, commands, control flow and handlers.
mod control;
mod grep;
mod info;
mod require;
mod run;

pub use control::{ExitRun, FailRun, FlushHandlers, NotifyHandler};
pub use grep::GrepFile;
pub use info::{LookupVariable, PrintDebug, PrintMessage, RenderTemplate};
pub use require::RequireUser;
pub use run::RunCommand;

use super::Task;

/// Module name shared by every core task.
const MODULE: &str = "core";

/// Every core task.
#[must_use]
pub fn all_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(PrintDebug),
        Box::new(PrintMessage),
        Box::new(RenderTemplate),
        Box::new(LookupVariable),
        Box::new(RunCommand),
        Box::new(FailRun),
        Box::new(ExitRun),
        Box::new(NotifyHandler),
        Box::new(FlushHandlers),
        Box::new(GrepFile),
        Box::new(RequireUser),
    ]
}
