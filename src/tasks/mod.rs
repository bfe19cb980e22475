//! Task trait, registry, and the built-in `core` and `fs` task modules.
pub mod core;
pub mod fs;

use std::collections::BTreeMap;
use std::fmt;

use crate::engine::{ArgValue, Outcome, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;

/// A named, invocable task.
///
/// Task bodies receive their bound, rendered arguments through
/// [`TaskCall`], perform their effect, and report exactly one outcome via
/// [`TaskCall::report`].
pub trait Task {
    /// Module the task belongs to, e.g. `fs`.
    fn module(&self) -> &'static str;

    /// Task name within its module, e.g. `mkfile`.
    fn name(&self) -> &'static str;

    /// Declared parameters.
    fn signature(&self) -> Signature;

    /// Execute the task.
    ///
    /// # Errors
    ///
    /// Returns an error when the task fails and the failure is not
    /// tolerated, or when the task requests an early exit.
    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError>;
}

type TaskBody = dyn Fn(&TaskCall<'_>) -> Result<TaskResult, PlaybookError>;

/// A task defined by a closure.
pub struct FnTask {
    module: &'static str,
    name: &'static str,
    signature: Signature,
    body: Box<TaskBody>,
}

impl FnTask {
    /// Create a task from its name, signature and body.
    pub fn new(
        module: &'static str,
        name: &'static str,
        signature: Signature,
        body: impl Fn(&TaskCall<'_>) -> Result<TaskResult, PlaybookError> + 'static,
    ) -> Self {
        Self {
            module,
            name,
            signature,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl Task for FnTask {
    fn module(&self) -> &'static str {
        self.module
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        (self.body)(call)
    }
}

/// A registered task with its signature computed once.
pub struct RegisteredTask {
    task: Box<dyn Task>,
    signature: Signature,
}

impl RegisteredTask {
    /// The task.
    #[must_use]
    pub fn task(&self) -> &dyn Task {
        self.task.as_ref()
    }

    /// Its declared parameters.
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Tasks available to a run, keyed by qualified name (`module.name`).
#[derive(Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, RegisteredTask>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tasks.keys()).finish()
    }
}

impl TaskRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in task.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for task in all_tasks() {
            registry.register_boxed(task);
        }
        registry
    }

    /// Register `task`, replacing any task with the same qualified name.
    pub fn register(&mut self, task: impl Task + 'static) {
        self.register_boxed(Box::new(task));
    }

    /// Register a boxed task.
    pub fn register_boxed(&mut self, task: Box<dyn Task>) {
        let key = format!("{}.{}", task.module(), task.name());
        let signature = task.signature();
        self.tasks.insert(key, RegisteredTask { task, signature });
    }

    /// Look up a task by qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredTask> {
        self.tasks.get(name)
    }

    /// Qualified names of every registered task, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }
}

/// Every built-in task.
#[must_use]
pub fn all_tasks() -> Vec<Box<dyn Task>> {
    let mut tasks = core::all_tasks();
    tasks.extend(fs::all_tasks());
    tasks
}

/// Pass an already-rendered argument to a nested task without rendering it
/// a second time.
pub(crate) fn forward(value: &ArgValue) -> ArgValue {
    match value {
        ArgValue::Text(s) => ArgValue::Raw(s.clone()),
        ArgValue::List(items) => ArgValue::List(items.iter().map(forward).collect()),
        other => other.clone(),
    }
}

/// Report the outcome of a task's own work.
///
/// Operational errors and task failures become a failed outcome carrying the
/// error, so the status line is still printed and ignore-failure applies.
/// Usage errors propagate unreported.
///
/// # Errors
///
/// See [`TaskCall::report`].
pub(crate) fn conclude(
    call: &TaskCall<'_>,
    work: Result<Outcome, PlaybookError>,
) -> Result<TaskResult, PlaybookError> {
    match work {
        Ok(outcome) => call.report(outcome),
        Err(err @ (PlaybookError::Operation(_) | PlaybookError::TaskFailure(_))) => {
            call.report(Outcome::failed().message(err.to_string()).error(err))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::engine::Param;

    #[test]
    fn builtin_task_catalogue() {
        let registry = TaskRegistry::builtin();
        let names = registry.names().collect::<Vec<_>>().join("\n");
        insta::assert_snapshot!(names, @r"
        core.debug
        core.exit
        core.fail
        core.flush_handlers
        core.grep
        core.lookup
        core.notify
        core.print
        core.render
        core.require
        core.run
        fs.builder
        fs.cd
        fs.chmod
        fs.chown
        fs.cp
        fs.exists
        fs.fs
        fs.ln
        fs.mkdir
        fs.mkfile
        fs.mv
        fs.rm
        fs.stat
        ");
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = TaskRegistry::new();
        registry.register(FnTask::new("t", "x", Signature::default(), |call| {
            call.report(Outcome::unchanged())
        }));
        registry.register(FnTask::new(
            "t",
            "x",
            Signature::new([Param::template("path")]),
            |call| call.report(Outcome::changed()),
        ));
        assert_eq!(registry.names().count(), 1);
        assert_eq!(registry.get("t.x").unwrap().signature().params().len(), 1);
    }

    #[test]
    fn get_unknown_is_none() {
        assert!(TaskRegistry::builtin().get("fs.nope").is_none());
        assert!(TaskRegistry::builtin().get("mkfile").is_none());
    }

    #[test]
    fn every_builtin_signature_has_unique_params() {
        for task in all_tasks() {
            let sig = task.signature();
            let mut names: Vec<_> = sig.params().iter().map(Param::name).collect();
            let before = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), before, "{}.{}", task.module(), task.name());
        }
    }
}
