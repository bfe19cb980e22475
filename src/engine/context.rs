//! The run context: scopes, counters, handlers and run metadata for one run.
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use serde_json::Value;

use super::call::{Call, CallInfo, TaskCall};
use super::guards::{CallFrameGuard, CallingScopeGuard};
use super::handlers::{Handler, HandlerQueue};
use super::outcome::{Outcome, TaskResult};
use super::scope::Scopes;
use super::signature::ParamKind;
use super::template::Renderer;
use super::value::Vars;
use super::workdir::WorkingDir;
use crate::error::PlaybookError;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, StatusKind};
use crate::platform::Platform;
use crate::tasks::TaskRegistry;

/// Default search path for task source files; `...` is the playbook
/// directory.
pub const DEFAULT_FILES_PATH: &str = "...:.../files:.";

/// Task name printed when a result is reported outside any task.
const UNKNOWN_TASK: &str = "<unknown>";

/// Run-wide task counters. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Every reported task.
    pub total: usize,
    /// Tasks that changed state.
    pub changed: usize,
    /// Un-tolerated failures.
    pub failure: usize,
}

/// Metadata about the executing playbook.
#[derive(Debug, Clone, Default)]
pub struct PlaybookInfo {
    /// Playbook name.
    pub name: String,
    /// Directory containing the playbook file.
    pub directory: PathBuf,
    /// Playbook description.
    pub description: String,
    /// Playbook files loaded so far, used to filter failure traces.
    pub files_seen: BTreeSet<PathBuf>,
}

/// State for one playbook run.
///
/// Owned by the driver and passed by reference to every task. Single
/// threaded: all mutation goes through `Cell`/`RefCell`, and every
/// stack-like mutation is undone by a guard from
/// [`guards`](super::guards).
pub struct RunContext {
    pub(crate) scopes: RefCell<Scopes>,
    pub(crate) calls: RefCell<Vec<CallInfo>>,
    pub(crate) call_depth: Cell<usize>,
    pub(crate) ignore_failure_depth: Cell<usize>,
    counters: Cell<Counters>,
    handlers: HandlerQueue,
    named_handlers: RefCell<BTreeMap<String, Handler>>,
    playbook: RefCell<PlaybookInfo>,
    renderer: Renderer,
    workdir: WorkingDir,
    registry: TaskRegistry,
    log: Arc<dyn Log>,
    executor: Arc<dyn Executor>,
    files_path: String,
    interrupted: Arc<AtomicBool>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("scopes", &self.scopes)
            .field("call_depth", &self.call_depth)
            .field("ignore_failure_depth", &self.ignore_failure_depth)
            .field("counters", &self.counters)
            .field("handlers", &self.handlers)
            .field("playbook", &self.playbook)
            .field("workdir", &self.workdir)
            .field("registry", &self.registry)
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("files_path", &self.files_path)
            .finish_non_exhaustive()
    }
}

/// Facts about the host: `environ` and `platform`.
#[must_use]
pub fn host_globals() -> Vars {
    let environ: serde_json::Map<String, Value> = std::env::vars()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Vars::from([
        ("environ".to_string(), Value::Object(environ)),
        ("platform".to_string(), Platform::detect().to_value()),
    ])
}

impl RunContext {
    /// Create a context with host globals, the built-in tasks and the
    /// system executor, starting in the process's current directory.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let workdir = WorkingDir::new(cwd);
        Self {
            scopes: RefCell::new(Scopes {
                globals: host_globals(),
                ..Scopes::default()
            }),
            calls: RefCell::new(Vec::new()),
            call_depth: Cell::new(0),
            ignore_failure_depth: Cell::new(0),
            counters: Cell::new(Counters::default()),
            handlers: HandlerQueue::default(),
            named_handlers: RefCell::new(BTreeMap::new()),
            playbook: RefCell::new(PlaybookInfo::default()),
            renderer: Renderer::new(workdir.clone()),
            workdir,
            registry: TaskRegistry::builtin(),
            log,
            executor: Arc::new(SystemExecutor),
            files_path: std::env::var("UP_FILES_PATH")
                .unwrap_or_else(|_| DEFAULT_FILES_PATH.to_string()),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the command executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the task registry.
    #[must_use]
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the host globals.
    #[must_use]
    pub fn with_globals(self, globals: Vars) -> Self {
        self.scopes.borrow_mut().globals = globals;
        self
    }

    /// Start in `dir` instead of the process's current directory.
    #[must_use]
    pub fn with_workdir(self, dir: &Path) -> Self {
        self.workdir.set(dir);
        self
    }

    /// Replace the source file search path.
    #[must_use]
    pub fn with_files_path(mut self, files_path: impl Into<String>) -> Self {
        self.files_path = files_path.into();
        self
    }

    /// Share an interrupt flag set from outside, e.g. by a signal handler.
    #[must_use]
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    /// The run's logger.
    #[must_use]
    pub fn log(&self) -> &dyn Log {
        self.log.as_ref()
    }

    /// The command executor.
    #[must_use]
    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Registered tasks.
    #[must_use]
    pub const fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// The handler queue.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerQueue {
        &self.handlers
    }

    /// Source file search path.
    #[must_use]
    pub fn files_path(&self) -> &str {
        &self.files_path
    }

    // ------------------------------------------------------------------
    // Counters and depths
    // ------------------------------------------------------------------

    /// Current counters.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.counters.get()
    }

    /// Current call depth.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.call_depth.get()
    }

    /// Current ignore-failure nesting depth.
    #[must_use]
    pub fn ignore_failure_depth(&self) -> usize {
        self.ignore_failure_depth.get()
    }

    /// Metadata of the innermost reportable call.
    #[must_use]
    pub fn current_call(&self) -> Option<CallInfo> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|c| !c.is_internal())
            .cloned()
    }

    // ------------------------------------------------------------------
    // Working directory
    // ------------------------------------------------------------------

    /// Current working directory of the run.
    #[must_use]
    pub fn workdir(&self) -> PathBuf {
        self.workdir.get()
    }

    /// Change the run's working directory.
    pub fn set_workdir(&self, dir: &Path) {
        self.workdir.set(dir);
    }

    /// Resolve `path` against the working directory.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.workdir.resolve(Path::new(path))
    }

    // ------------------------------------------------------------------
    // Playbook metadata and scopes
    // ------------------------------------------------------------------

    /// Playbook metadata.
    #[must_use]
    pub fn playbook(&self) -> PlaybookInfo {
        self.playbook.borrow().clone()
    }

    /// Record playbook metadata; its file counts as seen.
    pub fn set_playbook(&self, info: PlaybookInfo) {
        *self.playbook.borrow_mut() = info;
    }

    /// Record a playbook file as loaded.
    pub fn note_file_seen(&self, path: PathBuf) {
        self.playbook.borrow_mut().files_seen.insert(path);
    }

    /// Set the parsed run arguments.
    pub fn set_run_args(&self, args: Vars) {
        self.scopes.borrow_mut().run_args = args;
    }

    /// Define or replace a playbook variable.
    pub fn set_var(&self, name: impl Into<String>, value: Value) {
        self.scopes.borrow_mut().playbook.insert(name.into(), value);
    }

    /// Look up a playbook variable.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<Value> {
        self.scopes.borrow().playbook.get(name).cloned()
    }

    /// Compose every scope, then `extra`, into one environment.
    #[must_use]
    pub fn compose(&self, extra: Option<&Vars>) -> Vars {
        self.scopes.borrow().compose(extra)
    }

    /// Render `template` against the composed environment plus `extra`.
    ///
    /// # Errors
    ///
    /// See [`Renderer::render`].
    pub fn render(&self, template: &str, extra: Option<&Vars>) -> Result<String, PlaybookError> {
        self.renderer.render(template, &self.compose(extra))
    }

    /// Evaluate a condition expression against the composed environment.
    ///
    /// # Errors
    ///
    /// See [`Renderer::eval_condition`].
    pub fn eval_condition(&self, expr: &str, extra: Option<&Vars>) -> Result<bool, PlaybookError> {
        self.renderer.eval_condition(expr, &self.compose(extra))
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Make `handler` available by name.
    pub fn define_handler(&self, handler: Handler) {
        self.named_handlers
            .borrow_mut()
            .insert(handler.name().to_string(), handler);
    }

    /// Look up a named handler.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::UnknownHandler`] if none is defined.
    pub fn handler(&self, name: &str) -> Result<Handler, PlaybookError> {
        self.named_handlers
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| PlaybookError::UnknownHandler(name.to_string()))
    }

    /// Run queued handlers until the queue is empty.
    ///
    /// Handlers may queue more handlers while running. Returns how many ran.
    ///
    /// # Errors
    ///
    /// Stops at the first failing handler and returns its error; handlers
    /// after it stay queued.
    pub fn flush_handlers(&self) -> Result<usize, PlaybookError> {
        if self.handlers.is_empty() {
            return Ok(0);
        }
        let mut ran = 0;
        while let Some(handler) = self.handlers.pop_front() {
            self.log
                .handler(&format!(">> *** Starting handler: {}", handler.name()));
            handler.call(self)?;
            ran += 1;
        }
        self.log.handler(">> *** Done with handlers");
        Ok(ran)
    }

    // ------------------------------------------------------------------
    // Interruption
    // ------------------------------------------------------------------

    /// Flag set asynchronously to stop the run between statements.
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Fail if the run was interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::Interrupted`].
    pub fn check_interrupted(&self) -> Result<(), PlaybookError> {
        if self.interrupted.load(Ordering::SeqCst) {
            Err(PlaybookError::Interrupted)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Invocation and reporting
    // ------------------------------------------------------------------

    /// Invoke a task.
    ///
    /// Installs the call's locals as the calling scope, binds and renders
    /// the arguments, records call metadata and runs the task body. The
    /// calling scope and metadata are cleared on every exit path.
    ///
    /// # Errors
    ///
    /// Binding and template errors, and whatever the task body raises.
    pub fn invoke(&self, call: Call) -> Result<TaskResult, PlaybookError> {
        let (name, args, locals) = call.into_parts();
        let registered = self
            .registry
            .get(&name)
            .ok_or_else(|| PlaybookError::UnknownTask(name.clone()))?;
        let task = registered.task();
        let signature = registered.signature();

        let _scope = CallingScopeGuard::set(self, locals);
        let binding = signature.bind(&name, args)?;

        let env = self.compose(None);
        let mut rendered = IndexMap::with_capacity(binding.values.len());
        for (param, value) in binding.values {
            let eligible = binding.supplied.contains(&param)
                && signature
                    .get(&param)
                    .is_some_and(|p| p.kind() == ParamKind::Template);
            let value = if eligible {
                self.renderer.render_arg(value, &env)?
            } else {
                value
            };
            rendered.insert(param, value);
        }

        let info = CallInfo {
            module: task.module().to_string(),
            name: task.name().to_string(),
            params: signature
                .params()
                .iter()
                .map(|p| (p.name().to_string(), p.kind()))
                .collect(),
            args: rendered.clone(),
        };
        let _frame = CallFrameGuard::push(self, info);
        self.log.debug(&format!("running {name}"));
        task.run(&TaskCall {
            ctx: self,
            task: name,
            args: rendered,
        })
    }

    /// Report a task outcome.
    ///
    /// Prints the status line (and output), updates the counters, then
    /// raises: an un-tolerated failure raises the outcome's error or a
    /// generic [`PlaybookError::TaskFailure`]. A successful outcome carrying
    /// an error raises it unconditionally. A tolerated failure drops its
    /// error unless it is an [`PlaybookError::EarlyExit`].
    ///
    /// # Errors
    ///
    /// As described above.
    pub fn report(&self, outcome: Outcome) -> Result<TaskResult, PlaybookError> {
        let tolerated = outcome.ignore_failure || self.ignore_failure_depth.get() > 0;
        let kind = if outcome.changed {
            StatusKind::Changed
        } else if outcome.failed && tolerated {
            StatusKind::FailureIgnored
        } else if outcome.failed {
            StatusKind::Failed
        } else {
            StatusKind::Unchanged
        };

        let line = self.status_line(kind, &outcome);
        self.log.status(kind, &line);
        if let Some(output) = outcome.output.as_deref().filter(|o| !o.is_empty()) {
            self.log.output(output);
        }

        let mut counters = self.counters.get();
        counters.total += 1;
        if outcome.changed {
            counters.changed += 1;
        }
        if outcome.failed && !tolerated {
            counters.failure += 1;
        }
        self.counters.set(counters);

        let Outcome {
            changed,
            failed,
            message,
            output,
            extra,
            on_exit,
            error,
            ..
        } = outcome;
        if failed && !tolerated {
            return Err(error.unwrap_or_else(|| {
                PlaybookError::TaskFailure("Unspecified failure in task".to_string())
            }));
        }
        if let Some(error) = error {
            if !failed || matches!(error, PlaybookError::EarlyExit { .. }) {
                return Err(error);
            }
        }

        Ok(TaskResult {
            task: self
                .current_call()
                .map_or_else(|| UNKNOWN_TASK.to_string(), |c| c.qualified_name()),
            changed,
            failed,
            message,
            output,
            extra,
            on_exit,
        })
    }

    fn status_line(&self, kind: StatusKind, outcome: &Outcome) -> String {
        let depth = "=".repeat(self.call_depth.get());
        let (name, args) = self.current_call().map_or_else(
            || (UNKNOWN_TASK.to_string(), String::new()),
            |call| {
                let args = if outcome.hide_args {
                    "...".to_string()
                } else {
                    call.format_args(&outcome.secret_args)
                };
                (call.qualified_name(), args)
            },
        );
        let message = outcome
            .message
            .as_deref()
            .map(|m| format!(" ({m})"))
            .unwrap_or_default();
        format!(
            "{depth}{} {name}({args}){message}{}",
            kind.glyph(),
            kind.suffix()
        )
    }
}
