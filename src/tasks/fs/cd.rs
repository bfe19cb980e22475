use anyhow::anyhow;

use super::MODULE;
use crate::engine::{ArgValue, Call, Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::tasks::{Task, conclude};

/// `fs.cd`: change the run's working directory.
///
/// `extra.old_dir` holds the previous directory. Entered as a scope guard,
/// the result changes back to it on exit.
pub struct ChangeDir;

impl Task for ChangeDir {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "cd"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::template("path")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let ctx = call.ctx();
        let path = call.path("path")?;
        if !path.is_dir() {
            return conclude(
                call,
                Err(anyhow!("not a directory: {}", path.display()).into()),
            );
        }

        let old_dir = ctx.workdir().to_string_lossy().into_owned();
        ctx.set_workdir(&path);
        call.report(
            Outcome::unchanged()
                .extra("old_dir", old_dir.clone())
                .on_exit(move |ctx| {
                    ctx.invoke(Call::new("fs.cd").arg("path", ArgValue::raw(old_dir)))
                        .map(drop)
                }),
        )
    }
}
