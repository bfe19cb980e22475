//! Structural checks and load-time warnings for playbooks.
use std::collections::BTreeSet;

use super::playbook::{ArgType, Playbook, Step};
use crate::error::ConfigError;
use crate::tasks::TaskRegistry;

/// Argument names clap reserves for itself.
const RESERVED_ARG_NAMES: &[&str] = &["help"];

/// A validation warning detected during playbook loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The playbook file.
    pub source: String,
    /// The step or handler that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Trait for playbook validators.
///
/// Implementations look for problems that would only surface at run time,
/// such as misspelled task names, without rejecting the playbook.
pub trait PlaybookValidator {
    /// Validate the playbook and return any warnings found.
    fn validate(&self, playbook: &Playbook, source: &str) -> Vec<ValidationWarning>;

    /// Return a human-readable name for this validator.
    #[allow(dead_code)] // Part of trait contract; implementors define it
    fn name(&self) -> &'static str;
}

/// Warns about unknown tasks and arguments their signatures do not declare.
#[derive(Debug)]
pub struct TaskValidator<'a> {
    registry: &'a TaskRegistry,
}

impl<'a> TaskValidator<'a> {
    #[must_use]
    pub const fn new(registry: &'a TaskRegistry) -> Self {
        Self { registry }
    }

    fn check_step(&self, step: &Step, location: &str, source: &str, out: &mut Vec<ValidationWarning>) {
        if let Some(task) = &step.task {
            match self.registry.get(task) {
                None => out.push(ValidationWarning::new(
                    source,
                    location,
                    format!("unknown task '{task}'"),
                )),
                Some(registered) => {
                    for name in step.args.keys() {
                        if registered.signature().get(name).is_none() {
                            out.push(ValidationWarning::new(
                                source,
                                location,
                                format!("task '{task}' has no argument '{name}'"),
                            ));
                        }
                    }
                }
            }
        }
        for (i, child) in step.steps.iter().enumerate() {
            self.check_step(child, &format!("{location}.steps[{i}]"), source, out);
        }
    }
}

impl PlaybookValidator for TaskValidator<'_> {
    fn validate(&self, playbook: &Playbook, source: &str) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for_each_root(playbook, |step, location| {
            self.check_step(step, &location, source, &mut warnings);
        });
        warnings
    }

    fn name(&self) -> &'static str {
        "tasks"
    }
}

/// Warns about handlers no statement ever notifies.
#[derive(Debug, Default)]
pub struct HandlerUsageValidator;

impl PlaybookValidator for HandlerUsageValidator {
    fn validate(&self, playbook: &Playbook, source: &str) -> Vec<ValidationWarning> {
        fn collect<'a>(steps: &'a [Step], used: &mut BTreeSet<&'a str>) {
            for step in steps {
                if let Some(notify) = &step.notify {
                    used.extend(notify.names().iter().map(String::as_str));
                }
                // core.notify names its handler as an argument
                if let Some(handler) = step.args.get("handler").and_then(|v| v.as_str()) {
                    used.insert(handler);
                }
                collect(&step.steps, used);
            }
        }

        let mut used = BTreeSet::new();
        collect(&playbook.steps, &mut used);
        for handler in playbook.handlers.values() {
            collect(&handler.steps, &mut used);
        }
        playbook
            .handlers
            .keys()
            .filter(|name| !used.contains(name.as_str()))
            .map(|name| {
                ValidationWarning::new(
                    source,
                    format!("handlers.{name}"),
                    "handler is never notified",
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "handlers"
    }
}

/// Call `f` for every top-level statement list with its location prefix.
fn for_each_root(playbook: &Playbook, mut f: impl FnMut(&Step, String)) {
    for (i, step) in playbook.steps.iter().enumerate() {
        f(step, format!("steps[{i}]"));
    }
    for (name, handler) in &playbook.handlers {
        for (i, step) in handler.steps.iter().enumerate() {
            f(step, format!("handlers.{name}.steps[{i}]"));
        }
    }
}

/// Reject playbooks that are structurally invalid.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidArgument`] for bad argument declarations
/// and [`ConfigError::InvalidStep`] for the first malformed statement.
pub fn check_playbook(playbook: &Playbook) -> Result<(), ConfigError> {
    check_args(playbook)?;
    let mut result = Ok(());
    for_each_root(playbook, |step, location| {
        if result.is_ok() {
            result = check_step(playbook, step, &location);
        }
    });
    result
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_args(playbook: &Playbook) -> Result<(), ConfigError> {
    let invalid = |name: &str, reason: String| ConfigError::InvalidArgument {
        name: name.to_string(),
        reason,
    };
    let mut seen = BTreeSet::new();
    for arg in &playbook.args {
        if !is_identifier(&arg.name) {
            return Err(invalid(&arg.name, "name must be an identifier".to_string()));
        }
        if RESERVED_ARG_NAMES.contains(&arg.name.as_str()) {
            return Err(invalid(&arg.name, "name is reserved".to_string()));
        }
        if !seen.insert(arg.name.as_str()) {
            return Err(invalid(&arg.name, "declared more than once".to_string()));
        }
        if let Some(default) = &arg.default
            && !arg.kind.accepts(default)
        {
            let expected = match arg.kind {
                ArgType::Str | ArgType::Password => "a string",
                ArgType::Int => "an integer",
                ArgType::Bool => "a boolean",
            };
            return Err(invalid(&arg.name, format!("default must be {expected}")));
        }
    }
    Ok(())
}

fn check_step(playbook: &Playbook, step: &Step, location: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidStep {
        location: location.to_string(),
        reason,
    };

    match &step.task {
        Some(task) => {
            let qualified = task
                .split_once('.')
                .is_some_and(|(module, name)| !module.is_empty() && !name.is_empty());
            if !qualified {
                return Err(invalid(format!(
                    "task '{task}' must be a qualified name such as fs.mkfile"
                )));
            }
        }
        None => {
            let needs_task = [
                ("args", !step.args.is_empty()),
                ("positional", !step.positional.is_empty()),
                ("notify", step.notify.is_some()),
                ("register", step.register.is_some()),
            ];
            if let Some((field, _)) = needs_task.iter().find(|(_, set)| *set) {
                return Err(invalid(format!("`{field}` requires `task`")));
            }
            if step.set.is_empty() && step.steps.is_empty() {
                return Err(invalid("step has no task, set or steps".to_string()));
            }
        }
    }

    if let Some(notify) = &step.notify
        && let Some(unknown) = notify
            .names()
            .iter()
            .find(|name| !playbook.handlers.contains_key(name.as_str()))
    {
        return Err(invalid(format!("unknown handler '{unknown}'")));
    }

    if step.register.as_deref().is_some_and(|name| !is_identifier(name)) {
        return Err(invalid("`register` must be an identifier".to_string()));
    }

    for (i, child) in step.steps.iter().enumerate() {
        check_step(playbook, child, &format!("{location}.steps[{i}]"))?;
    }
    Ok(())
}
