//! Task invocations: the caller's request and the body's view of it.
use std::collections::BTreeSet;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde_json::Value;

use super::context::RunContext;
use super::handlers::Handler;
use super::outcome::{Outcome, TaskResult};
use super::signature::ParamKind;
use super::value::{ArgValue, Vars};
use crate::error::PlaybookError;

/// Redaction token for secret arguments.
const SECRET: &str = "***";

/// A request to invoke a task.
///
/// Arguments are keyword-only; [`positional`](Self::positional) exists so
/// callers translating other syntaxes can surface the binding error.
/// `locals` are the bindings of the invoking statement, visible to the
/// task's templates as the calling scope.
#[derive(Debug, Clone)]
pub struct Call {
    task: String,
    args: Vec<(Option<String>, ArgValue)>,
    locals: Vars,
}

impl Call {
    /// Invoke the task registered as `task`, e.g. `fs.mkfile`.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            args: Vec::new(),
            locals: Vars::new(),
        }
    }

    /// Add a keyword argument.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.push((Some(name.into()), value.into()));
        self
    }

    /// Add a positional argument (always rejected at binding).
    #[must_use]
    pub fn positional(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push((None, value.into()));
        self
    }

    /// Bind a calling-scope variable.
    #[must_use]
    pub fn local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    /// Bind several calling-scope variables.
    #[must_use]
    pub fn locals(mut self, vars: Vars) -> Self {
        self.locals.extend(vars);
        self
    }

    /// Name of the task to invoke.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    pub(crate) fn into_parts(self) -> (String, Vec<(Option<String>, ArgValue)>, Vars) {
        (self.task, self.args, self.locals)
    }
}

/// Metadata about an in-progress invocation.
#[derive(Debug, Clone)]
pub struct CallInfo {
    /// Task module, e.g. `fs`.
    pub module: String,
    /// Task name within its module.
    pub name: String,
    /// Declared parameters and their kinds.
    pub params: Vec<(String, ParamKind)>,
    /// Effective arguments after rendering, in declaration order.
    pub args: IndexMap<String, ArgValue>,
}

impl CallInfo {
    /// `module.name`, or just `name` for tasks without a module.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }

    /// Internal helpers are skipped when naming the reporting task.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.name.starts_with('_')
    }

    /// `name=value` pairs, omitting unset values and masking `secrets`.
    #[must_use]
    pub fn format_args(&self, secrets: &BTreeSet<String>) -> String {
        self.args
            .iter()
            .filter(|(_, value)| !value.is_unset())
            .map(|(name, value)| {
                if secrets.contains(name) {
                    format!("{name}={SECRET}")
                } else {
                    format!("{name}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A task body's view of its invocation.
#[derive(Debug)]
pub struct TaskCall<'a> {
    pub(crate) ctx: &'a RunContext,
    pub(crate) task: String,
    pub(crate) args: IndexMap<String, ArgValue>,
}

impl<'a> TaskCall<'a> {
    /// The run context.
    #[must_use]
    pub const fn ctx(&self) -> &'a RunContext {
        self.ctx
    }

    /// Qualified name of the running task.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// The effective value of parameter `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> &ArgValue {
        self.args.get(name).unwrap_or(&ArgValue::Unset)
    }

    /// An [`PlaybookError::InvalidArgument`] for parameter `name`.
    #[must_use]
    pub fn invalid(&self, name: &str, expected: &str) -> PlaybookError {
        PlaybookError::InvalidArgument {
            task: self.task.clone(),
            name: name.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Text argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::InvalidArgument`] for non-text or unset values.
    pub fn str(&self, name: &str) -> Result<&str, PlaybookError> {
        self.opt_str(name)?
            .ok_or_else(|| self.invalid(name, "a string"))
    }

    /// Text argument that may be unset.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::InvalidArgument`] for non-text values.
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, PlaybookError> {
        let value = self.value(name);
        if value.is_unset() {
            return Ok(None);
        }
        value
            .as_str()
            .map(Some)
            .ok_or_else(|| self.invalid(name, "a string"))
    }

    /// Boolean argument; rendered text such as `true` or `no` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::InvalidArgument`] for anything else.
    pub fn bool(&self, name: &str) -> Result<bool, PlaybookError> {
        match self.value(name) {
            ArgValue::Data(Value::Bool(b)) => Ok(*b),
            ArgValue::Data(Value::Number(n)) => Ok(n.as_i64() != Some(0)),
            value => match value.as_str().map(str::to_ascii_lowercase).as_deref() {
                Some("true" | "yes" | "on" | "1") => Ok(true),
                Some("false" | "no" | "off" | "0" | "") => Ok(false),
                _ => Err(self.invalid(name, "a boolean")),
            },
        }
    }

    /// Boolean argument that may be unset.
    ///
    /// # Errors
    ///
    /// Same as [`bool`](Self::bool).
    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, PlaybookError> {
        if self.value(name).is_unset() {
            Ok(None)
        } else {
            self.bool(name).map(Some)
        }
    }

    /// Integer argument that may be unset.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::InvalidArgument`] for non-integers.
    pub fn opt_int(&self, name: &str) -> Result<Option<i64>, PlaybookError> {
        let value = self.value(name);
        if value.is_unset() {
            return Ok(None);
        }
        let parsed = match value {
            ArgValue::Data(Value::Number(n)) => n.as_i64(),
            other => other.as_str().and_then(|s| s.trim().parse().ok()),
        };
        parsed
            .map(Some)
            .ok_or_else(|| self.invalid(name, "an integer"))
    }

    /// Integer argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::InvalidArgument`] for unset or non-integers.
    pub fn int(&self, name: &str) -> Result<i64, PlaybookError> {
        self.opt_int(name)?
            .ok_or_else(|| self.invalid(name, "an integer"))
    }

    /// Path argument resolved against the run's working directory.
    ///
    /// # Errors
    ///
    /// Same as [`str`](Self::str).
    pub fn path(&self, name: &str) -> Result<PathBuf, PlaybookError> {
        Ok(self.ctx.resolve_path(self.str(name)?))
    }

    /// Handlers named by parameter `name`: a handler, a handler name, or a
    /// list of either. Unset means none.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::UnknownHandler`] for undefined names and
    /// [`PlaybookError::InvalidArgument`] for other values.
    pub fn handlers(&self, name: &str) -> Result<Vec<Handler>, PlaybookError> {
        fn collect(
            call: &TaskCall<'_>,
            name: &str,
            value: &ArgValue,
            out: &mut Vec<Handler>,
        ) -> Result<(), PlaybookError> {
            match value {
                ArgValue::Unset | ArgValue::Data(Value::Null) => Ok(()),
                ArgValue::Handler(h) => {
                    out.push(h.clone());
                    Ok(())
                }
                ArgValue::List(items) => items
                    .iter()
                    .try_for_each(|item| collect(call, name, item, out)),
                other => {
                    let handler_name = other
                        .as_str()
                        .ok_or_else(|| call.invalid(name, "a handler or list of handlers"))?;
                    out.push(call.ctx.handler(handler_name)?);
                    Ok(())
                }
            }
        }
        let mut out = Vec::new();
        collect(self, name, self.value(name), &mut out)?;
        Ok(out)
    }

    /// The effective arguments as plain data.
    #[must_use]
    pub fn vars(&self) -> Vars {
        self.args
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }

    /// Invoke another task from inside this one.
    ///
    /// This call's arguments become the nested call's calling scope, under
    /// any locals the nested call binds itself.
    ///
    /// # Errors
    ///
    /// Propagates the nested task's error.
    pub fn invoke(&self, call: Call) -> Result<TaskResult, PlaybookError> {
        let mut call = call;
        for (name, value) in self.vars() {
            call.locals.entry(name).or_insert(value);
        }
        self.ctx.invoke(call)
    }

    /// Report this invocation's outcome.
    ///
    /// # Errors
    ///
    /// See [`RunContext::report`].
    pub fn report(&self, outcome: Outcome) -> Result<TaskResult, PlaybookError> {
        self.ctx.report(outcome)
    }

    /// Finish without a status line. The call is not counted.
    #[must_use]
    pub fn quiet(&self) -> TaskResult {
        TaskResult {
            task: self.task.clone(),
            changed: false,
            failed: false,
            message: None,
            output: None,
            extra: Vars::new(),
            on_exit: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn info(args: &[(&str, ArgValue)]) -> CallInfo {
        CallInfo {
            module: "fs".to_string(),
            name: "mkfile".to_string(),
            params: args
                .iter()
                .map(|(n, _)| ((*n).to_string(), ParamKind::Template))
                .collect(),
            args: args
                .iter()
                .map(|(n, v)| ((*n).to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn format_args_skips_unset_and_masks_secrets() {
        let call = info(&[
            ("path", ArgValue::text("/tmp/x")),
            ("mode", ArgValue::Unset),
            ("password", ArgValue::text("hunter2")),
        ]);
        let secrets = BTreeSet::from(["password".to_string()]);
        assert_eq!(call.format_args(&secrets), "path=/tmp/x, password=***");
    }

    #[test]
    fn qualified_name_and_internal_marker() {
        let mut call = info(&[]);
        assert_eq!(call.qualified_name(), "fs.mkfile");
        assert!(!call.is_internal());
        call.name = "_write".to_string();
        assert!(call.is_internal());
        call.module = String::new();
        assert_eq!(call.qualified_name(), "_write");
    }

    #[test]
    fn call_builder_records_args_and_locals() {
        let call = Call::new("fs.mkdir")
            .arg("path", "/x")
            .positional("oops")
            .local("name", "web1");
        assert_eq!(call.task(), "fs.mkdir");
        let (task, args, locals) = call.into_parts();
        assert_eq!(task, "fs.mkdir");
        assert_eq!(args.len(), 2);
        assert!(args[1].0.is_none());
        assert_eq!(locals["name"], Value::from("web1"));
    }
}
