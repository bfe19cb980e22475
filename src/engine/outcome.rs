//! Task outcomes, reported results, and scope guards.
use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Value, json};

use super::context::RunContext;
use super::handlers::Handler;
use super::value::Vars;
use crate::error::PlaybookError;

/// Action run when a scope-guard result is exited.
pub type ExitAction = Box<dyn FnOnce(&RunContext) -> Result<(), PlaybookError>>;

/// What a task body reports about its invocation.
///
/// Handed to [`RunContext::report`], which prints the status line, updates
/// counters and turns un-tolerated failures into errors.
#[derive(Default)]
pub struct Outcome {
    pub(crate) changed: bool,
    pub(crate) failed: bool,
    pub(crate) ignore_failure: bool,
    pub(crate) message: Option<String>,
    pub(crate) output: Option<String>,
    pub(crate) hide_args: bool,
    pub(crate) secret_args: BTreeSet<String>,
    pub(crate) extra: Vars,
    pub(crate) on_exit: Option<ExitAction>,
    pub(crate) error: Option<PlaybookError>,
}

impl Outcome {
    /// The task changed system state.
    #[must_use]
    pub fn changed() -> Self {
        Self {
            changed: true,
            ..Self::default()
        }
    }

    /// The task succeeded without changing anything.
    #[must_use]
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Changed or unchanged depending on `changed`.
    #[must_use]
    pub fn from_changed(changed: bool) -> Self {
        Self {
            changed,
            ..Self::default()
        }
    }

    /// The task failed.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }

    /// Mark the outcome failed or not.
    #[must_use]
    pub const fn with_failed(mut self, failed: bool) -> Self {
        self.failed = failed;
        self
    }

    /// Tolerate a failure of this invocation.
    #[must_use]
    pub const fn ignore_failure(mut self, ignore: bool) -> Self {
        self.ignore_failure = ignore;
        self
    }

    /// Extra message appended to the status line.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Output printed beneath the status line.
    #[must_use]
    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Print `...` instead of the argument list.
    #[must_use]
    pub const fn hide_args(mut self) -> Self {
        self.hide_args = true;
        self
    }

    /// Mask the named argument in the status line.
    #[must_use]
    pub fn secret(mut self, name: impl Into<String>) -> Self {
        self.secret_args.insert(name.into());
        self
    }

    /// Attach extra data to the result.
    #[must_use]
    pub fn extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Make the result a scope guard running `action` on exit.
    #[must_use]
    pub fn on_exit(
        mut self,
        action: impl FnOnce(&RunContext) -> Result<(), PlaybookError> + 'static,
    ) -> Self {
        self.on_exit = Some(Box::new(action));
        self
    }

    /// Error raised after reporting.
    ///
    /// Raised for an un-tolerated failure, and unconditionally otherwise.
    #[must_use]
    pub fn error(mut self, error: PlaybookError) -> Self {
        self.error = Some(error);
        self
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("changed", &self.changed)
            .field("failed", &self.failed)
            .field("ignore_failure", &self.ignore_failure)
            .field("message", &self.message)
            .field("output", &self.output)
            .field("hide_args", &self.hide_args)
            .field("secret_args", &self.secret_args)
            .field("extra", &self.extra)
            .field("on_exit", &self.on_exit.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// The reported result of one task invocation.
///
/// Its status line, counters and any error were already handled when it was
/// created; afterwards it is read-only apart from entering it once as a
/// scope guard.
pub struct TaskResult {
    pub(crate) task: String,
    pub(crate) changed: bool,
    pub(crate) failed: bool,
    pub(crate) message: Option<String>,
    pub(crate) output: Option<String>,
    pub(crate) extra: Vars,
    pub(crate) on_exit: Option<ExitAction>,
}

impl TaskResult {
    /// Qualified name of the task that produced this result.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Whether state changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.changed
    }

    /// Whether the task failed (only observable when tolerated).
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.failed
    }

    /// Truthiness of the result: not failed.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        !self.failed
    }

    /// Extra status message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Task output.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Extra data attached by the task.
    #[must_use]
    pub const fn extra(&self) -> &Vars {
        &self.extra
    }

    /// Whether the result can still be entered as a scope guard.
    #[must_use]
    pub const fn is_scope_guard(&self) -> bool {
        self.on_exit.is_some()
    }

    /// Queue `handlers` if this result changed state.
    ///
    /// Returns how many were newly queued.
    pub fn notify(&self, ctx: &RunContext, handlers: &[Handler]) -> usize {
        if self.changed {
            self.force_notify(ctx, handlers)
        } else {
            0
        }
    }

    /// Queue `handlers` regardless of the outcome.
    pub fn force_notify(&self, ctx: &RunContext, handlers: &[Handler]) -> usize {
        handlers
            .iter()
            .filter(|h| ctx.handlers().add((*h).clone()))
            .count()
    }

    /// Enter this result as a scope guard.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::NotAScopeGuard`] if the task supplied no exit
    /// action, or it was already entered.
    pub fn enter<'a>(&mut self, ctx: &'a RunContext) -> Result<ScopeGuard<'a>, PlaybookError> {
        let action = self.on_exit.take().ok_or(PlaybookError::NotAScopeGuard)?;
        Ok(ScopeGuard {
            ctx,
            action: Some(action),
        })
    }

    /// Plain data view, used to register results as playbook variables.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "task": self.task,
            "changed": self.changed,
            "failed": self.failed,
            "ok": !self.failed,
            "message": self.message,
            "output": self.output,
            "extra": self.extra,
        })
    }
}

impl fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult")
            .field("task", &self.task)
            .field("changed", &self.changed)
            .field("failed", &self.failed)
            .field("message", &self.message)
            .field("output", &self.output)
            .field("extra", &self.extra)
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

/// Runs a result's exit action exactly once when dropped or closed.
pub struct ScopeGuard<'a> {
    ctx: &'a RunContext,
    action: Option<ExitAction>,
}

impl ScopeGuard<'_> {
    /// Leave the scope now and surface the exit action's error.
    ///
    /// # Errors
    ///
    /// Propagates the exit action's error.
    pub fn close(mut self) -> Result<(), PlaybookError> {
        self.action.take().map_or(Ok(()), |action| action(self.ctx))
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Some(action) = self.action.take()
            && let Err(e) = action(self.ctx)
        {
            self.ctx.log().error(&format!("scope exit failed: {e}"));
        }
    }
}

impl fmt::Debug for ScopeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("pending", &self.action.is_some())
            .finish_non_exhaustive()
    }
}
