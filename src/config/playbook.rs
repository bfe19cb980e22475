//! Playbook file schema.
//!
//! ```toml
//! description = "Set up a web server"
//!
//! [vars]
//! site = "example.com"
//!
//! [[args]]
//! name = "user"
//!
//! [[steps]]
//! task = "fs.mkdir"
//! args = { path = "/srv/{{ site }}" }
//! notify = "restart"
//!
//! [handlers.restart]
//! steps = [{ task = "core.run", args = { command = "systemctl restart nginx" } }]
//! ```
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::engine::Vars;

/// A parsed playbook file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Playbook {
    /// Docstring; its first line is shown when listing playbooks.
    #[serde(default)]
    pub description: String,
    /// Initial playbook namespace.
    #[serde(default)]
    pub vars: Vars,
    /// Run-level argument declarations.
    #[serde(default)]
    pub args: Vec<ArgDecl>,
    /// Statements, run in order.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Named handlers.
    #[serde(default)]
    pub handlers: IndexMap<String, HandlerDef>,
}

impl Playbook {
    /// First line of the description.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.description.trim_start().lines().next().unwrap_or_default()
    }
}

/// Type of a run-level argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    /// Free text.
    #[default]
    Str,
    /// Signed integer.
    Int,
    /// `--name` / `--no-name` flag.
    Bool,
    /// Free text, never echoed back in help output.
    Password,
}

impl ArgType {
    /// Whether `value` is acceptable as a default for this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Str | Self::Password => value.is_string(),
            Self::Int => value.is_i64(),
            Self::Bool => value.is_boolean(),
        }
    }
}

/// A run-level argument declaration.
///
/// Arguments without a default are positional; with one, they become
/// `--name` options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgDecl {
    /// Name, exposed to templates as `ARGS.<name>`.
    pub name: String,
    /// Value type.
    #[serde(default, rename = "type")]
    pub kind: ArgType,
    /// Default value.
    pub default: Option<Value>,
    /// Help text.
    #[serde(default)]
    pub description: Option<String>,
}

/// Handler names for `notify`: one or several.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Notify {
    /// A single handler name.
    One(String),
    /// Several handler names.
    Many(Vec<String>),
}

impl Notify {
    /// The handler names in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

/// One playbook statement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Label used in failure traces.
    pub name: Option<String>,
    /// Qualified task name such as `fs.mkfile`.
    pub task: Option<String>,
    /// Keyword arguments.
    #[serde(default)]
    pub args: IndexMap<String, Value>,
    /// Positional arguments; tasks always reject them.
    #[serde(default)]
    pub positional: Vec<Value>,
    /// Calling-scope bindings for this statement.
    #[serde(default)]
    pub vars: Vars,
    /// Condition; the statement is skipped when it is false.
    pub when: Option<String>,
    /// Loop items, each pushed as an item scope.
    pub items: Option<Vec<Value>>,
    /// Tolerate task failures within this statement.
    #[serde(default)]
    pub ignore_failure: bool,
    /// Handlers to queue if the task changed something.
    pub notify: Option<Notify>,
    /// Playbook variable that receives the task result.
    pub register: Option<String>,
    /// Assignments into the playbook namespace; strings are rendered.
    #[serde(default)]
    pub set: IndexMap<String, Value>,
    /// Nested statements.
    #[serde(default)]
    pub steps: Vec<Self>,
}

impl Step {
    /// Label for traces: the step name, else its task, else `block`.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.task.as_deref())
            .unwrap_or("block")
    }
}

/// A named handler: statements run when the handler queue is flushed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerDef {
    /// Statements to run.
    #[serde(default)]
    pub steps: Vec<Step>,
}
