use serde_json::Value;

use super::MODULE;
use crate::engine::{ArgValue, Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::tasks::Task;

/// Indent every line of `text` by four spaces.
fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pretty-print a value; strings print without quotes.
fn pretty(value: &ArgValue) -> String {
    match value.to_json() {
        Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

/// `core.debug`: print a message and/or pretty-print a value.
pub struct PrintDebug;

impl Task for PrintDebug {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "debug"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("msg").optional(),
            Param::template("var").optional(),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let mut output = String::new();
        if let Some(msg) = call.opt_str("msg")?.filter(|m| !m.is_empty()) {
            output.push_str(msg);
            output.push('\n');
        }
        let var = call.value("var");
        if !var.is_unset() {
            output.push_str(&pretty(var));
            output = indent(&output);
        }
        let output = output.trim_end();

        let mut outcome = Outcome::unchanged().hide_args();
        if !output.is_empty() {
            outcome = outcome.output(output);
        }
        call.report(outcome)
    }
}

/// `core.print`: write a rendered line. Prints no status line and is not
/// counted.
pub struct PrintMessage;

impl Task for PrintMessage {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "print"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::template("msg")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        call.ctx().log().info(call.str("msg")?);
        Ok(call.quiet())
    }
}

/// `core.render`: render a template, result in `extra.value`.
pub struct RenderTemplate;

impl Task for RenderTemplate {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "render"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::template("s")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let rendered = call.str("s")?.to_string();
        call.report(Outcome::unchanged().extra("value", rendered))
    }
}

/// `core.lookup`: fetch a top-level variable, result in `extra.value`.
pub struct LookupVariable;

impl Task for LookupVariable {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "lookup"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::template("var")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let name = call.str("var")?;
        let value = call
            .ctx()
            .compose(None)
            .remove(name)
            .ok_or_else(|| PlaybookError::UndefinedTemplateVariable {
                template: name.to_string(),
                detail: format!("'{name}' is not defined"),
            })?;
        call.report(Outcome::unchanged().extra("value", value))
    }
}
