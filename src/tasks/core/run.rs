use anyhow::Context as _;

use super::MODULE;
use crate::engine::{Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::tasks::{Task, conclude};

/// `core.run`: run a command in the run's working directory.
///
/// Stdout becomes the result's output; `extra.stderr` and
/// `extra.returncode` carry the rest. Commands are assumed to change the
/// system unless `change = false`.
pub struct RunCommand;

impl Task for RunCommand {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "run"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("command"),
            Param::opaque("shell").default(true),
            Param::opaque("ignore_failures").default(false),
            Param::opaque("change").default(true),
            Param::template("creates").optional(),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        if let Some(creates) = call.opt_str("creates")? {
            if call.ctx().resolve_path(creates).exists() {
                return call.report(Outcome::unchanged());
            }
        }
        conclude(call, execute(call))
    }
}

fn execute(call: &TaskCall<'_>) -> Result<Outcome, PlaybookError> {
    let command = call.str("command")?;
    let ignore_failures = call.bool("ignore_failures")?;
    let change = call.bool("change")?;
    let ctx = call.ctx();
    let cwd = ctx.workdir();

    let result = if call.bool("shell")? {
        ctx.executor().run_shell(command, &cwd)?
    } else {
        let argv = shell_words::split(command)
            .with_context(|| format!("parsing command: {command}"))?;
        ctx.executor().run_argv(&argv, &cwd)?
    };

    let code = result.code.unwrap_or(-1);
    let failed = !result.success;
    let mut outcome = Outcome::from_changed(change)
        .with_failed(failed)
        .ignore_failure(ignore_failures)
        .output(result.stdout.trim_end())
        .extra("stderr", result.stderr)
        .extra("returncode", code);
    if failed && !ignore_failures {
        outcome = outcome.error(PlaybookError::TaskFailure(format!("Exit code {code}")));
    }
    Ok(outcome)
}
