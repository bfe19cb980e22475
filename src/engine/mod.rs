//! Task execution and template-context engine.
//!
//! A playbook statement becomes a [`Call`]. [`RunContext::invoke`] installs
//! the statement's bindings as the calling scope, binds the arguments to
//! the task's [`Signature`], renders template-eligible text through the
//! [`Renderer`] against the composed [`Scopes`], and runs the task body. The
//! body reports an [`Outcome`]; [`RunContext::report`] prints the status
//! line, updates the counters and raises un-tolerated failures. Changed
//! results can [`notify`](TaskResult::notify) [`Handler`]s, which run once
//! when the queue is flushed.

mod call;
mod context;
mod files;
mod guards;
mod handlers;
mod outcome;
mod scope;
mod signature;
mod template;
mod value;
mod workdir;

pub use call::{Call, CallInfo, TaskCall};
pub use context::{Counters, DEFAULT_FILES_PATH, PlaybookInfo, RunContext, host_globals};
pub use files::find_file;
pub use guards::{CallDepthGuard, IgnoreFailureGuard, ItemScopeGuard};
pub use handlers::{Handler, HandlerQueue};
pub use outcome::{ExitAction, Outcome, ScopeGuard, TaskResult};
pub use scope::{ItemScope, Scopes};
pub use signature::{Param, ParamKind, Signature};
pub use template::Renderer;
pub use value::{ArgValue, Vars};
pub use workdir::{WorkingDir, normalize};

/// Shared fixtures for engine and task unit tests.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use super::{Outcome, Param, RunContext, Signature, Vars};
    use crate::logging::BufferedLog;
    use crate::tasks::{FnTask, TaskRegistry};

    /// A context with the built-in tasks, no host globals, a buffered log
    /// and a fresh temp directory as working directory.
    pub(crate) fn test_context() -> (RunContext, Arc<BufferedLog>, tempfile::TempDir) {
        test_context_with(TaskRegistry::builtin())
    }

    /// Like [`test_context`] with a custom registry.
    pub(crate) fn test_context_with(
        registry: TaskRegistry,
    ) -> (RunContext, Arc<BufferedLog>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let log = Arc::new(BufferedLog::new());
        let ctx = RunContext::new(log.clone())
            .with_globals(Vars::new())
            .with_registry(registry)
            .with_workdir(tmp.path())
            .with_files_path(super::DEFAULT_FILES_PATH);
        (ctx, log, tmp)
    }

    /// Built-in tasks plus `test.*` probes:
    ///
    /// - `test.touch(path)`: reports changed.
    /// - `test.noop(path?)`: reports unchanged.
    /// - `test.fail(ignore=false)`: reports a failure.
    /// - `test.outer(path)`: invokes `test.touch` one call level deeper.
    /// - `test.secret(user, password)`: masks `password`.
    /// - `test._helper()`: internal; reports on behalf of its caller.
    /// - `test.wrapper(path)`: reports through `test._helper`.
    pub(crate) fn probe_registry() -> TaskRegistry {
        let mut registry = TaskRegistry::builtin();
        registry.register(FnTask::new(
            "test",
            "touch",
            Signature::new([Param::template("path")]),
            |call| call.report(Outcome::changed()),
        ));
        registry.register(FnTask::new(
            "test",
            "noop",
            Signature::new([Param::template("path").optional()]),
            |call| call.report(Outcome::unchanged()),
        ));
        registry.register(FnTask::new(
            "test",
            "fail",
            Signature::new([Param::opaque("ignore").default(false)]),
            |call| call.report(Outcome::failed().ignore_failure(call.bool("ignore")?)),
        ));
        registry.register(FnTask::new(
            "test",
            "outer",
            Signature::new([Param::template("path")]),
            |call| {
                let inner = {
                    let _depth = super::CallDepthGuard::enter(call.ctx());
                    call.invoke(super::Call::new("test.touch").arg("path", call.str("path")?))?
                };
                call.report(Outcome::from_changed(inner.changed()))
            },
        ));
        registry.register(FnTask::new(
            "test",
            "secret",
            Signature::new([Param::template("user"), Param::template("password")]),
            |call| call.report(Outcome::changed().secret("password")),
        ));
        registry.register(FnTask::new(
            "test",
            "_helper",
            Signature::default(),
            |call| call.report(Outcome::unchanged().message("via helper")),
        ));
        registry.register(FnTask::new(
            "test",
            "wrapper",
            Signature::new([Param::template("path")]),
            |call| call.invoke(super::Call::new("test._helper")),
        ));
        registry
    }
}
