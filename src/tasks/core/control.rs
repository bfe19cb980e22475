use super::MODULE;
use crate::engine::{Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::tasks::Task;

/// `core.fail`: abort the run with a message.
pub struct FailRun;

impl Task for FailRun {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "fail"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::template("msg")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let msg = call.str("msg")?.to_string();
        call.report(Outcome::failed().error(PlaybookError::TaskFailure(msg)))
    }
}

/// `core.exit`: end the run with an exit code.
///
/// A non-zero code counts as a failure; zero ends the run successfully.
pub struct ExitRun;

impl Task for ExitRun {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "exit"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::opaque("returncode").default(0_i64),
            Param::template("msg").default(""),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let code = i32::try_from(call.int("returncode")?)
            .map_err(|_| call.invalid("returncode", "an exit code"))?;
        let message = call.str("msg")?.to_string();
        call.report(
            Outcome::unchanged()
                .with_failed(code != 0)
                .error(PlaybookError::EarlyExit { code, message }),
        )
    }
}

/// `core.notify`: queue handlers to run at the next flush.
pub struct NotifyHandler;

impl Task for NotifyHandler {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "notify"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::opaque("handler")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        for handler in call.handlers("handler")? {
            call.ctx().handlers().add(handler);
        }
        call.report(Outcome::unchanged())
    }
}

/// `core.flush_handlers`: run queued handlers now.
pub struct FlushHandlers;

impl Task for FlushHandlers {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "flush_handlers"
    }

    fn signature(&self) -> Signature {
        Signature::default()
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        call.ctx().flush_handlers()?;
        call.report(Outcome::unchanged())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::engine::test_helpers::test_context;
    use crate::engine::{Call, Handler, IgnoreFailureGuard};
    use crate::error::PlaybookError;

    #[test]
    fn fail_raises_message() {
        let (ctx, log, _tmp) = test_context();
        let err = ctx
            .invoke(Call::new("core.fail").arg("msg", "Unable to download file"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unable to download file");
        assert_eq!(ctx.counters().failure, 1);
        assert_eq!(
            log.status_lines(),
            vec!["=X core.fail(msg=Unable to download file)"]
        );
    }

    #[test]
    fn fail_inside_ignore_failure_block_continues() {
        let (ctx, log, _tmp) = test_context();
        let _ignore = IgnoreFailureGuard::enter(&ctx);
        let result = ctx
            .invoke(Call::new("core.fail").arg("msg", "stop here"))
            .unwrap();
        assert!(result.failed());
        assert_eq!(ctx.counters().failure, 0);
        assert_eq!(
            log.status_lines(),
            vec!["=! core.fail(msg=stop here) (failure ignored)"]
        );
    }

    #[test]
    fn exit_zero_is_not_a_failure() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx.invoke(Call::new("core.exit")).unwrap_err();
        assert_eq!(err.exit_code(), Some(0));
        assert_eq!(ctx.counters().failure, 0);
        assert_eq!(ctx.counters().total, 1);
    }

    #[test]
    fn exit_nonzero_counts_as_failure() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx
            .invoke(
                Call::new("core.exit")
                    .arg("returncode", 3_i64)
                    .arg("msg", "bye"),
            )
            .unwrap_err();
        assert!(matches!(err, PlaybookError::EarlyExit { code: 3, ref message } if message == "bye"));
        assert_eq!(ctx.counters().failure, 1);
    }

    #[test]
    fn exit_rejects_out_of_range_code() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx
            .invoke(Call::new("core.exit").arg("returncode", i64::MAX))
            .unwrap_err();
        assert!(matches!(err, PlaybookError::InvalidArgument { .. }));
    }

    #[test]
    fn notify_by_name_then_flush() {
        let (ctx, log, _tmp) = test_context();
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::clone(&runs);
        ctx.define_handler(Handler::new("restart", move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        }));

        ctx.invoke(Call::new("core.notify").arg("handler", "restart"))
            .unwrap();
        ctx.invoke(Call::new("core.notify").arg("handler", "restart"))
            .unwrap();
        assert_eq!(ctx.handlers().len(), 1);

        ctx.invoke(Call::new("core.flush_handlers")).unwrap();
        assert_eq!(runs.get(), 1);
        assert!(ctx.handlers().is_empty());
        assert!(
            log.lines()
                .contains(&">> *** Starting handler: restart".to_string())
        );
    }

    #[test]
    fn notify_unknown_handler() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx
            .invoke(Call::new("core.notify").arg("handler", "nope"))
            .unwrap_err();
        assert!(matches!(err, PlaybookError::UnknownHandler(_)));
    }
}
